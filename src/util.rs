use std::{future::Future, path::Path};

use bytes::Bytes;
use log::*;

use crate::{
    cam::OscCam,
    command::{CommandReply, CommandState},
    poller::PollEnd,
    settings::ImageType,
    OscError, OscResult,
};

/// This trait provides convenience functions for the `OscCam` struct.
pub trait CamUtil {
    /// Convenience method for taking a picture and also transferring it.
    ///
    /// * `session_id` - Session of API level 1 cameras, `None` for API level 2.
    /// * `on_progress` - Optional closure called with the completion (`0.0..=1.0`) while the
    ///   camera processes the picture.
    ///   (Rust complains if you just provide `None` as the parameter value, so provide `None::<fn(_)>` as a value)
    ///
    /// Returns the JPG picture as a byte buffer.
    fn take_picture_and_get(
        &self,
        session_id: Option<&str>,
        on_progress: Option<impl FnMut(f64) + Send>,
    ) -> impl Future<Output = OscResult<Bytes>> + Send;

    /// Takes a picture and writes it to `path`. Returns the number of bytes written.
    fn take_picture_and_save(
        &self,
        session_id: Option<&str>,
        path: impl AsRef<Path> + Send,
    ) -> impl Future<Output = OscResult<usize>> + Send;

    /// Downloads a file given its `fileUrl` (an absolute URL) or `fileUri` (API level 1).
    fn download(&self, locator: &str) -> impl Future<Output = OscResult<Bytes>> + Send;
}

impl CamUtil for OscCam {
    async fn take_picture_and_get(
        &self,
        session_id: Option<&str>,
        mut on_progress: Option<impl FnMut(f64) + Send>,
    ) -> OscResult<Bytes> {
        let mut last = None;

        let end = self
            .take_picture_with_progress(session_id, |update| match update {
                Ok(reply) if reply.state() == Some(CommandState::InProgress) => {
                    let completion = reply
                        .result()
                        .and_then(|r| r.progress.as_ref())
                        .map(|p| p.completion);

                    if let (Some(on_progress), Some(completion)) = (on_progress.as_mut(), completion) {
                        on_progress(completion);
                    }

                    last = Some(Ok(reply));
                }
                update => last = Some(update),
            })
            .await;

        let reply = match (end, last) {
            (PollEnd::Delivered, Some(update)) => update?,
            _ => return Err(OscError::Cancelled),
        };

        let results = reply.into_results()?;

        let locator = ["fileUrl", "fileUri"]
            .into_iter()
            .find_map(|field| results.get(field).and_then(|v| v.as_str()))
            .ok_or(OscError::MissingField { field: "fileUrl" })?;

        info!("Picture stored as {locator}");

        self.download(locator).await
    }

    async fn take_picture_and_save(
        &self,
        session_id: Option<&str>,
        path: impl AsRef<Path> + Send,
    ) -> OscResult<usize> {
        let picture = self.take_picture_and_get(session_id, None::<fn(_)>).await?;

        tokio::fs::write(path, &picture).await?;

        Ok(picture.len())
    }

    async fn download(&self, locator: &str) -> OscResult<Bytes> {
        if locator.starts_with("http://") || locator.starts_with("https://") {
            return self.get(locator).await;
        }

        match self.get_image(locator, Some(ImageType::Full)).await? {
            CommandReply::Raw(jpeg) => Ok(jpeg),
            reply => Err(reply
                .into_results()
                .err()
                .unwrap_or(OscError::InvalidFormat)),
        }
    }
}
