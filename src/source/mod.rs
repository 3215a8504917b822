//! Frame sources: where streams and their frames come from.
//!
//! A [`FrameSource`] stands in for the network side. It announces streams,
//! delivers frames and is told when a stream is ready for its next frame.

mod channel;

pub use channel::{ChannelSource, FrameFeeder};

use crate::Result;
use crate::types::{Frame, Size, StreamId};

/// Something that happened on the network side.
#[derive(Debug, Clone)]
pub enum SourceEvent {
    /// A streamer connected and announced its size.
    Opened { stream: StreamId, size: Size },
    /// A complete frame arrived.
    Frame(Frame),
    /// A streamer disconnected.
    Closed { stream: StreamId },
}

impl SourceEvent {
    pub fn stream(&self) -> &StreamId {
        match self {
            SourceEvent::Opened { stream, .. } | SourceEvent::Closed { stream } => stream,
            SourceEvent::Frame(frame) => &frame.stream_id,
        }
    }
}

/// Trait for pixel stream data sources
#[async_trait::async_trait]
pub trait FrameSource: Send + 'static {
    /// Wait for the next event.
    ///
    /// Returns:
    /// - `Ok(Some(event))` - stream opened, frame arrived or stream closed
    /// - `Ok(None)` - source ended (normal termination)
    /// - `Err(e)` - error occurred
    async fn next_event(&mut self) -> Result<Option<SourceEvent>>;

    /// The wall consumed a frame of `stream` and can take the next one.
    async fn request_frame(&mut self, stream: &StreamId) -> Result<()>;
}
