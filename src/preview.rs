use std::collections::VecDeque;

use bytes::Bytes;
use futures::{stream::BoxStream, Stream, StreamExt as _};
use log::*;
use tokio_util::sync::CancellationToken;

use crate::{
    buffer::FrameBuffer,
    consts::{self, JPEG_EOI, JPEG_SOI},
    OscError, OscResult,
};

#[derive(Debug, Clone, PartialEq, Eq)]
/// One complete JPEG image taken from the live preview stream.
pub struct LivePreviewFrame {
    /// Position of the frame in the stream, starting at 0.
    pub seq: u64,
    /// The JPEG bytes, from the start-of-image marker through the end-of-image marker (both included).
    pub data: Bytes,
}

/// Splits the live preview byte stream into JPEG frames.
///
/// The camera sends JPEG images back-to-back without any framing, so frames are found by
/// scanning for the start-of-image (`FF D8`) and end-of-image (`FF D9`) markers.
/// Bytes before a start-of-image marker are dropped. The markers are not disambiguated
/// from the image data: a camera emitting `FF D9` inside a frame would split it.
#[derive(Debug)]
pub struct JpegDemuxer {
    buffer: FrameBuffer,
    /// The buffer starts with a start-of-image marker whose frame is not complete yet.
    in_frame: bool,
    /// Offset where the next end-of-image search starts.
    eoi_cursor: usize,
    max_frame_size: Option<usize>,
    next_seq: u64,
}

impl Default for JpegDemuxer {
    fn default() -> Self {
        Self::new()
    }
}

impl JpegDemuxer {
    pub fn new() -> Self {
        Self {
            buffer: FrameBuffer::with_capacity(consts::PREVIEW_BUFFER_CAPACITY),
            in_frame: false,
            eoi_cursor: 0,
            max_frame_size: Some(consts::DEFAULT_MAX_FRAME_SIZE),
            next_seq: 0,
        }
    }

    /// Sets the maximum size of a partial frame. When a frame grows past it without an
    /// end-of-image marker, it is dropped and the demuxer waits for the next start-of-image marker.
    /// `None` disables the limit.
    pub fn with_max_frame_size(mut self, max_frame_size: Option<usize>) -> Self {
        self.max_frame_size = max_frame_size;
        self
    }

    /// Number of bytes waiting for the rest of their frame.
    pub fn pending_len(&self) -> usize {
        self.buffer.len()
    }

    /// Appends a chunk of the stream and calls `on_frame` for every frame it completes, in stream order.
    pub fn push(&mut self, chunk: &[u8], mut on_frame: impl FnMut(LivePreviewFrame)) {
        self.buffer.extend(chunk);

        while let Some(frame) = self.next_frame() {
            on_frame(frame);
        }
    }

    /// Convenience wrapper around `push` collecting the completed frames.
    pub fn push_collect(&mut self, chunk: &[u8]) -> Vec<LivePreviewFrame> {
        let mut frames = Vec::new();
        self.push(chunk, |frame| frames.push(frame));
        frames
    }

    fn next_frame(&mut self) -> Option<LivePreviewFrame> {
        if !self.in_frame {
            let Some(start) = self.buffer.find(JPEG_SOI, 0) else {
                // Only a trailing 0xFF can still become part of a marker.
                let keep = usize::from(self.buffer.last() == Some(JPEG_SOI[0]));
                self.buffer.discard(self.buffer.len() - keep);
                return None;
            };

            if start > 0 {
                debug!("Dropping {start} bytes before the start-of-image marker");
            }

            self.buffer.discard(start);
            self.in_frame = true;
            self.eoi_cursor = JPEG_SOI.len();
        }

        match self.buffer.find(JPEG_EOI, self.eoi_cursor) {
            Some(end) => {
                let data = self.buffer.split_prefix(end + JPEG_EOI.len());

                self.in_frame = false;
                self.eoi_cursor = 0;

                let seq = self.next_seq;
                self.next_seq += 1;

                Some(LivePreviewFrame { seq, data })
            }
            None => {
                // The last byte may be the first half of a split marker, scan it again next time.
                self.eoi_cursor = self.eoi_cursor.max(self.buffer.len().saturating_sub(1));

                if self
                    .max_frame_size
                    .is_some_and(|max| self.buffer.len() > max)
                {
                    warn!(
                        "Dropping a partial live preview frame of {} bytes without an end-of-image marker",
                        self.buffer.len()
                    );

                    self.buffer.clear();
                    self.in_frame = false;
                    self.eoi_cursor = 0;
                }

                None
            }
        }
    }
}

/// How a live preview stream ended.
#[derive(Debug)]
pub enum PreviewEnd {
    /// The camera closed the stream.
    Closed,
    /// The stream was cancelled, either explicitly or by a newer operation on the camera.
    Cancelled,
    /// The connection failed.
    Failed(OscError),
}

/// Receives the events of a live preview stream.
///
/// `on_frame` runs on the stream's delivery path: slow work there slows down reading from the camera.
pub trait PreviewListener {
    fn on_frame(&mut self, frame: LivePreviewFrame);

    /// Called exactly once, when the stream ends.
    fn on_end(&mut self, end: PreviewEnd) {
        let _ = end;
    }
}

impl<F: FnMut(LivePreviewFrame)> PreviewListener for F {
    fn on_frame(&mut self, frame: LivePreviewFrame) {
        self(frame)
    }
}

/// A live preview connection: feeds received chunks through a [`JpegDemuxer`] and
/// reports frames and the end of the stream to a [`PreviewListener`].
pub struct LivePreview<L> {
    demuxer: JpegDemuxer,
    listener: L,
    cancel: CancellationToken,
    ended: bool,
}

impl<L: PreviewListener> LivePreview<L> {
    pub fn new(listener: L) -> Self {
        Self {
            demuxer: JpegDemuxer::new(),
            listener,
            cancel: CancellationToken::new(),
            ended: false,
        }
    }

    pub fn with_demuxer(mut self, demuxer: JpegDemuxer) -> Self {
        self.demuxer = demuxer;
        self
    }

    pub fn with_cancel_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Returns a token which cancels this preview from elsewhere.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Aborts the stream: the listener gets [`PreviewEnd::Cancelled`] and later chunks are ignored.
    pub fn cancel(&mut self) {
        self.cancel.cancel();
        self.on_stream_end(Some(OscError::Cancelled));
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }

    pub fn listener(&self) -> &L {
        &self.listener
    }

    pub fn into_listener(self) -> L {
        self.listener
    }

    /// Handles a chunk of the response body. Ignored once the stream has ended.
    ///
    /// If the cancel token was triggered elsewhere, the stream ends as cancelled instead.
    pub fn on_chunk(&mut self, chunk: &[u8]) {
        if self.cancel.is_cancelled() {
            self.on_stream_end(Some(OscError::Cancelled));
        }

        if self.ended {
            return;
        }

        let listener = &mut self.listener;
        self.demuxer.push(chunk, |frame| listener.on_frame(frame));
    }

    /// Signals that the connection closed, optionally because of an error.
    pub fn on_stream_end(&mut self, error: Option<OscError>) {
        if self.ended {
            return;
        }

        self.ended = true;

        let end = match error {
            None => PreviewEnd::Closed,
            Some(OscError::Cancelled) => PreviewEnd::Cancelled,
            Some(e) => {
                warn!("Live preview stream failed: {e}");
                PreviewEnd::Failed(e)
            }
        };

        info!("Live preview ended ({end:?})");
        self.listener.on_end(end);
    }

    /// Reads `stream` until it ends, fails or the preview is cancelled.
    pub async fn run<S>(&mut self, stream: S)
    where
        S: Stream<Item = OscResult<Bytes>>,
    {
        let mut stream = std::pin::pin!(stream);
        let cancel = self.cancel.clone();

        while !self.ended {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => Some(Err(OscError::Cancelled)),
                next = stream.next() => next,
            };

            match next {
                Some(Ok(chunk)) => self.on_chunk(&chunk),
                Some(Err(e)) => self.on_stream_end(Some(e)),
                None => self.on_stream_end(None),
            }
        }
    }
}

/// A stream of live preview frames. Ends with an `Err` item if the connection fails
/// or is cancelled, and without one when the camera closes it.
pub type FrameStream = BoxStream<'static, OscResult<LivePreviewFrame>>;

struct FrameStreamState<S> {
    body: S,
    demuxer: JpegDemuxer,
    pending: VecDeque<LivePreviewFrame>,
    cancel: CancellationToken,
    done: bool,
}

/// Turns a response body stream into a [`FrameStream`].
pub fn frame_stream<S>(body: S, demuxer: JpegDemuxer, cancel: CancellationToken) -> FrameStream
where
    S: Stream<Item = OscResult<Bytes>> + Send + Unpin + 'static,
{
    let state = FrameStreamState {
        body,
        demuxer,
        pending: VecDeque::new(),
        cancel,
        done: false,
    };

    futures::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(frame) = state.pending.pop_front() {
                return Some((Ok(frame), state));
            }

            if state.done {
                return None;
            }

            let next = tokio::select! {
                biased;
                _ = state.cancel.cancelled() => Some(Err(OscError::Cancelled)),
                next = state.body.next() => next,
            };

            match next {
                Some(Ok(chunk)) => {
                    let pending = &mut state.pending;
                    state.demuxer.push(&chunk, |frame| pending.push_back(frame));
                }
                Some(Err(e)) => {
                    state.done = true;
                    return Some((Err(e), state));
                }
                None => return None,
            }
        }
    })
    .boxed()
}
