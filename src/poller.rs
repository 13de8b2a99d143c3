use std::{future::Future, time::Duration};

use bytes::Bytes;
use log::*;
use tokio_util::sync::CancellationToken;

use crate::{
    command::{CommandReply, CommandState},
    consts, OscError, OscResult,
};

/// Source of `/osc/commands/status` responses.
pub trait CommandStatus {
    /// Requests the status of the command with the given id and returns the raw response body.
    fn status(&self, id: &str) -> impl Future<Output = OscResult<Bytes>> + Send;
}

impl<T: CommandStatus + Sync> CommandStatus for &T {
    fn status(&self, id: &str) -> impl Future<Output = OscResult<Bytes>> + Send {
        (**self).status(id)
    }
}

/// How a poll session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollEnd {
    /// The final update was passed to the caller.
    Delivered,
    /// The session was cancelled before reaching a terminal state. Nothing final was delivered.
    Cancelled,
}

/// Follows a command through the camera's `status` endpoint until it finishes.
///
/// Status requests are strictly sequential, each one preceded by the poll interval.
/// There is no retry count or overall timeout: a command that stays `inProgress` is polled
/// until the poller is cancelled.
pub struct CommandPoller<S> {
    source: S,
    interval: Duration,
    cancel: CancellationToken,
}

impl<S: CommandStatus> CommandPoller<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            interval: consts::DEFAULT_POLL_INTERVAL,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_cancel_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Resolves the response of an `execute` request into the updates the caller should see.
    ///
    /// * `initial` - The body of the `execute` response, or the error that request failed with.
    /// * `progress_needed` - If true, every `inProgress` response is passed to `on_update` as well.
    /// * `on_update` - Receives the updates. The last call carries the terminal response
    ///   (`done`, `error`, an unknown state, a body without a usable state, or a transport error).
    ///
    /// Cancellation is not reported through `on_update`; it is returned as [`PollEnd::Cancelled`].
    pub async fn resolve(
        &self,
        initial: OscResult<Bytes>,
        progress_needed: bool,
        mut on_update: impl FnMut(OscResult<CommandReply>),
    ) -> PollEnd {
        let mut response = initial;

        loop {
            let reply = match response {
                Ok(body) => CommandReply::from_body(body),
                Err(OscError::Cancelled) => {
                    debug!("Command polling cancelled");
                    return PollEnd::Cancelled;
                }
                Err(e) => {
                    warn!("Command request failed: {e}");
                    on_update(Err(e));
                    return PollEnd::Delivered;
                }
            };

            let Some(id) = reply.pending_id().map(str::to_owned) else {
                if reply.state() == Some(CommandState::InProgress) {
                    warn!("Camera reported a command in progress without an id, unable to poll it");
                }

                on_update(Ok(reply));
                return PollEnd::Delivered;
            };

            if progress_needed {
                on_update(Ok(reply));
            }

            debug!("Command {id} in progress, checking again in {:?}", self.interval);

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    debug!("Command polling cancelled");
                    return PollEnd::Cancelled;
                }
                _ = tokio::time::sleep(self.interval) => {}
            }

            response = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => Err(OscError::Cancelled),
                res = self.source.status(&id) => res,
            };
        }
    }
}
