//! Versioned stream frames

use super::{Segment, Size, StreamId};

/// Pixel extent of a stream, derived from its segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameDimensions {
    pub width: u32,
    pub height: u32,
}

impl FrameDimensions {
    /// Union extent of the segment rectangles.
    ///
    /// `width = max(x + width)`, `height = max(y + height)` over all segments.
    pub fn of_segments(segments: &[Segment]) -> Self {
        segments.iter().fold(Self::default(), |dims, segment| Self {
            width: dims.width.max(segment.parameters.right()),
            height: dims.height.max(segment.parameters.bottom()),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn to_size(self) -> Size {
        Size::new(self.width as f64, self.height as f64)
    }
}

/// One versioned update of a pixel stream.
///
/// Segment count and layout may change from one frame to the next.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Stream this frame belongs to
    pub stream_id: StreamId,

    /// Monotonically increasing per stream
    pub version: u64,

    /// Tiles covering the stream extent, in no particular order
    pub segments: Vec<Segment>,
}

impl Frame {
    pub fn new(stream_id: impl Into<StreamId>, version: u64, segments: Vec<Segment>) -> Self {
        Self { stream_id: stream_id.into(), version, segments }
    }

    pub fn dimensions(&self) -> FrameDimensions {
        FrameDimensions::of_segments(&self.segments)
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}
