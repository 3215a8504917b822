//! Core types for pixel stream data.
//!
//! ## Architecture
//!
//! - [`Frame`] is one versioned update of a stream, split into [`Segment`]s
//! - [`Segment`] is one tile with its [`SegmentParameters`] and a shared payload
//! - [`DecodedImage`] holds the BGRA pixels a decoder produced for a segment
//! - [`Rect`], [`Point`] and [`Size`] describe scene (wall) geometry
//! - [`StreamId`] names a stream and orders streams identically on every process
//!
//! ## Usage Example
//!
//! ```rust
//! use pixelwall::types::{Frame, FrameDimensions, Segment};
//!
//! let frame = Frame::new(
//!     "desktop",
//!     1,
//!     vec![
//!         Segment::raw(0, 0, 2, 2, vec![0u8; 16]),
//!         Segment::raw(2, 0, 2, 2, vec![0u8; 16]),
//!     ],
//! );
//!
//! assert_eq!(frame.dimensions(), FrameDimensions { width: 4, height: 2 });
//! ```

mod frame;
mod geometry;
mod segment;
mod stream_id;

pub use frame::{Frame, FrameDimensions};
pub use geometry::{Point, Rect, Size};
pub use segment::{BYTES_PER_PIXEL, DecodedImage, Segment, SegmentParameters, pixel_bytes};
pub use stream_id::StreamId;
