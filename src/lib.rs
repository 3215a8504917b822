//! Cluster-synchronised pixel stream pipeline for tiled display walls.
//!
//! A tiled wall is driven by several processes, each showing a disjoint part
//! of the scene. Pixelwall lets all of them show the *same* frame of a remote
//! pixel stream in the *same* render cycle, while each one only decodes the
//! tiles (segments) that land on its own screens.
//!
//! # Features
//!
//! - **Frame agreement**: a collective [`FrameVersionGate`] decides when a frame may be shown
//! - **Double buffering**: decoding the next frame never touches the one on screen
//! - **Visibility culling**: off-screen segments are never decoded or drawn
//! - **Changing layouts**: segment count and geometry may differ from frame to frame
//!
//! # Architecture
//!
//! ```text
//! FrameSource ──► Driver ──► WallProcess ──► StreamRegistry ──► PixelStreamState
//!                                 │                                 │    │
//!                           FrameVersionGate ◄──────── sync/check ──┘    │
//!                                                  SegmentDecoder / SegmentRenderer
//! ```
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use pixelwall::{
//!     DecodeExecutor, PipelineResources, PixelStreamState, Rect, ScreenRegion,
//!     SingleProcessGate, StreamId,
//!     renderer::MemoryTextureFactory,
//!     types::{DecodedImage, Frame, Segment},
//! };
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> pixelwall::Result<()> {
//!     let codec = Arc::new(|s: &Segment| -> pixelwall::Result<DecodedImage> {
//!         let p = s.parameters;
//!         DecodedImage::new(p.width, p.height, vec![0u8; p.raw_len()?])
//!     });
//!     let resources = PipelineResources::new(
//!         codec,
//!         DecodeExecutor::current()?,
//!         Arc::new(MemoryTextureFactory::new()),
//!     );
//!
//!     let mut stream = PixelStreamState::new(StreamId::from("desktop"), resources);
//!     let mut gate = SingleProcessGate::new();
//!     let screen = ScreenRegion::new(Rect::new(0.0, 0.0, 1920.0, 1080.0));
//!     let window = Rect::new(0.0, 0.0, 800.0, 600.0);
//!
//!     stream.set_new_frame(Frame::new(
//!         "desktop",
//!         1,
//!         vec![Segment::raw(0, 0, 2, 2, vec![0u8; 16])],
//!     ));
//!     stream.pre_render_update(window, &mut gate, &screen);
//!     stream.pre_render_update(window, &mut gate, &screen);
//!
//!     assert_eq!(stream.front_version(), 1);
//!     assert_eq!(stream.render(&screen), 1);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod decoder;
pub mod display;
pub mod driver;
mod error;
pub mod gate;
pub mod pixel_stream;
pub mod registry;
pub mod renderer;
pub mod source;
pub mod sync;
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;
pub mod types;
pub mod wall;

pub use config::{SourceConfig, WallConfig};
pub use decoder::{DecodeExecutor, SegmentCodec, SegmentDecoder};
#[cfg(feature = "jpeg")]
pub use decoder::JpegCodec;
pub use display::{DisplayRegion, ScreenRegion};
pub use driver::{Driver, DriverChannels};
pub use error::*;
pub use gate::{ClusterGate, FrameVersionGate, ReduceOp, SingleProcessGate, ThreadCluster};
pub use pixel_stream::{CycleReport, PipelineResources, PixelStreamState};
pub use registry::{ContentWindow, EventReceiver, RegistryEvent, StreamRegistry, WindowState};
pub use renderer::{RenderOptions, SegmentRenderer, SegmentTexture, TextureFactory};
pub use source::{ChannelSource, FrameFeeder, FrameSource, SourceEvent};
pub use sync::SyncFrame;
pub use types::{Frame, FrameDimensions, Point, Rect, Segment, Size, StreamId};
pub use wall::{CycleSummary, WallProcess};
