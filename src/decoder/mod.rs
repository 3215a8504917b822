//! Segment decoding.
//!
//! A [`SegmentDecoder`] owns at most one decode in flight. The decode runs on
//! a blocking worker thread from the tokio runtime; the render thread polls
//! it with [`SegmentDecoder::is_running`] and never waits on it.
//!
//! The codec itself is a black box behind [`SegmentCodec`].

#[cfg(feature = "jpeg")]
mod jpeg;

#[cfg(feature = "jpeg")]
pub use jpeg::JpegCodec;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::runtime::Handle;
use tokio::sync::oneshot::{self, error::TryRecvError};
use tracing::{trace, warn};

use crate::types::{DecodedImage, Segment, SegmentParameters};
use crate::{Result, WallError};

/// Turns one compressed segment into BGRA pixels.
///
/// Called from worker threads, possibly for several segments at once.
pub trait SegmentCodec: Send + Sync + 'static {
    fn decode(&self, segment: &Segment) -> Result<DecodedImage>;
}

impl<F> SegmentCodec for F
where
    F: Fn(&Segment) -> Result<DecodedImage> + Send + Sync + 'static,
{
    fn decode(&self, segment: &Segment) -> Result<DecodedImage> {
        self(segment)
    }
}

/// Runs decode jobs on the blocking pool of a tokio runtime.
#[derive(Debug, Clone)]
pub struct DecodeExecutor {
    handle: Handle,
}

impl DecodeExecutor {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Use the runtime the caller is running in.
    pub fn current() -> Result<Self> {
        Handle::try_current()
            .map(Self::new)
            .map_err(|_| WallError::Runtime { operation: "Segment decoding".to_string() })
    }

    fn spawn<F>(&self, job: F) -> oneshot::Receiver<Result<DecodedImage>>
    where
        F: FnOnce() -> Result<DecodedImage> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        // The worker owns everything it touches, so dropping the decoder
        // early only discards the result.
        self.handle.spawn_blocking(move || {
            let _ = tx.send(job());
        });
        rx
    }
}

enum DecoderState {
    Idle,
    Running { parameters: SegmentParameters, result: oneshot::Receiver<Result<DecodedImage>> },
    Finished(Result<DecodedImage>),
}

static NEXT_DECODER_ID: AtomicU64 = AtomicU64::new(1);

/// Decodes one segment at a time for a fixed segment index.
pub struct SegmentDecoder {
    id: u64,
    codec: Arc<dyn SegmentCodec>,
    executor: DecodeExecutor,
    state: DecoderState,
    failed: bool,
}

impl SegmentDecoder {
    pub fn new(codec: Arc<dyn SegmentCodec>, executor: DecodeExecutor) -> Self {
        let id = NEXT_DECODER_ID.fetch_add(1, Ordering::Relaxed);
        Self { id, codec, executor, state: DecoderState::Idle, failed: false }
    }

    /// Process-unique serial number of this decoder.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Start decoding `segment` in the background.
    ///
    /// Returns false, without side effects, if a decode is already running.
    pub fn start_decoding(&mut self, segment: &Segment) -> bool {
        if self.is_running() {
            return false;
        }

        let parameters = segment.parameters;
        let codec = Arc::clone(&self.codec);
        let segment = segment.clone();
        trace!(decoder = self.id, x = parameters.x, y = parameters.y, "starting segment decode");

        let result = self.executor.spawn(move || codec.decode(&segment));
        self.state = DecoderState::Running { parameters, result };
        self.failed = false;
        true
    }

    /// Non-blocking poll of the background decode.
    pub fn is_running(&mut self) -> bool {
        let DecoderState::Running { parameters, result } = &mut self.state else {
            return false;
        };

        match result.try_recv() {
            Ok(outcome) => {
                self.state = DecoderState::Finished(outcome);
                false
            }
            Err(TryRecvError::Empty) => true,
            Err(TryRecvError::Closed) => {
                let parameters = *parameters;
                warn!(x = parameters.x, y = parameters.y, "decode worker exited without a result");
                self.state = DecoderState::Finished(Err(WallError::decode_failed(
                    parameters.x,
                    parameters.y,
                    "decode worker terminated",
                )));
                false
            }
        }
    }

    /// Take the outcome of the last finished decode, returning to idle.
    pub fn take_result(&mut self) -> Option<Result<DecodedImage>> {
        if self.is_running() {
            return None;
        }
        match std::mem::replace(&mut self.state, DecoderState::Idle) {
            DecoderState::Finished(outcome) => {
                self.failed = outcome.is_err();
                Some(outcome)
            }
            other => {
                self.state = other;
                None
            }
        }
    }

    /// True if the last decode failed and no new decode was started since.
    pub fn has_failed(&self) -> bool {
        self.failed
    }

    /// Record a failure found after the decode itself succeeded, such as a
    /// decoded image that does not fit its segment.
    pub fn mark_failed(&mut self) {
        self.failed = true;
    }

    /// Forget a previous failure so the index is decoded again.
    pub fn clear_failure(&mut self) {
        self.failed = false;
    }
}

impl std::fmt::Debug for SegmentDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match &self.state {
            DecoderState::Idle => "idle",
            DecoderState::Running { .. } => "running",
            DecoderState::Finished(Ok(_)) => "finished",
            DecoderState::Finished(Err(_)) => "failed",
        };
        f.debug_struct("SegmentDecoder")
            .field("id", &self.id)
            .field("state", &state)
            .field("failed", &self.failed)
            .finish()
    }
}
