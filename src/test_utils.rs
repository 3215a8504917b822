//! Test helpers: synthetic frames, controllable codecs and recording textures
//!
//! Shared by unit tests and the benchmarks.

#![cfg(any(test, feature = "benchmark"))]

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::decoder::{DecodeExecutor, SegmentCodec};
use crate::pixel_stream::PipelineResources;
use crate::renderer::{RenderOptions, SegmentStatistics, SegmentTexture, TextureFactory};
use crate::types::{BYTES_PER_PIXEL, DecodedImage, Frame, Rect, Segment, SegmentParameters};
use crate::{Result, WallError};

/// Upper bound on how long a [`HeldCodec`] blocks a worker thread.
const MAX_HOLD: Duration = Duration::from_secs(10);

/// A `width` x `height` image with every byte set to `value`.
pub fn solid_image(width: u32, height: u32, value: u8) -> Result<DecodedImage> {
    let len = width as usize * height as usize * BYTES_PER_PIXEL;
    DecodedImage::new(width, height, vec![value; len])
}

/// A `cols` x `rows` grid of uncompressed `tile` x `tile` segments.
pub fn raw_grid_frame(id: &str, version: u64, cols: u32, rows: u32, tile: u32) -> Frame {
    let len = tile as usize * tile as usize * BYTES_PER_PIXEL;
    let segments = grid(cols, rows, tile)
        .map(|(index, x, y)| Segment::raw(x, y, tile, tile, vec![index as u8; len]))
        .collect();
    Frame::new(id, version, segments)
}

/// A `cols` x `rows` grid of compressed segments whose one-byte payload is
/// the segment index.
pub fn compressed_grid_frame(id: &str, version: u64, cols: u32, rows: u32, tile: u32) -> Frame {
    let segments = grid(cols, rows, tile)
        .map(|(index, x, y)| Segment::compressed(x, y, tile, tile, vec![index as u8]))
        .collect();
    Frame::new(id, version, segments)
}

fn grid(cols: u32, rows: u32, tile: u32) -> impl Iterator<Item = (u32, u32, u32)> {
    (0..rows).flat_map(move |row| {
        (0..cols).map(move |col| (row * cols + col, col * tile, row * tile))
    })
}

/// Poll `condition` until it holds or `timeout` expires.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    false
}

/// Pipeline resources on the current tokio runtime.
pub fn test_resources(codec: &HeldCodec, textures: &RecordingTextureFactory) -> PipelineResources {
    PipelineResources::new(
        Arc::new(codec.clone()),
        DecodeExecutor::current().expect("tests run inside a tokio runtime"),
        Arc::new(textures.clone()),
    )
}

#[derive(Debug)]
struct HeldCodecState {
    released: AtomicBool,
    decodes: AtomicUsize,
    fail_at_x: AtomicU32,
    decoded: Mutex<Vec<SegmentParameters>>,
}

/// Codec whose decodes block until [`release`](Self::release) is called.
///
/// Decoded images are solid, filled with the first payload byte.
#[derive(Debug, Clone)]
pub struct HeldCodec {
    state: Arc<HeldCodecState>,
}

impl HeldCodec {
    /// A codec holding every decode.
    pub fn new() -> Self {
        Self {
            state: Arc::new(HeldCodecState {
                released: AtomicBool::new(false),
                decodes: AtomicUsize::new(0),
                fail_at_x: AtomicU32::new(u32::MAX),
                decoded: Mutex::new(Vec::new()),
            }),
        }
    }

    /// A codec that decodes immediately.
    pub fn released() -> Self {
        let codec = Self::new();
        codec.release();
        codec
    }

    pub fn release(&self) {
        self.state.released.store(true, Ordering::SeqCst);
    }

    pub fn hold(&self) {
        self.state.released.store(false, Ordering::SeqCst);
    }

    /// Fail every later decode of a segment at column `x`.
    pub fn fail_segments_at(&self, x: u32) {
        self.state.fail_at_x.store(x, Ordering::SeqCst);
    }

    /// Decodes started so far, including held ones.
    pub fn decode_count(&self) -> usize {
        self.state.decodes.load(Ordering::SeqCst)
    }

    /// Parameters of every segment handed to the codec, in call order.
    pub fn decoded(&self) -> Vec<SegmentParameters> {
        self.state.decoded.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl Default for HeldCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl SegmentCodec for HeldCodec {
    fn decode(&self, segment: &Segment) -> Result<DecodedImage> {
        let params = segment.parameters;
        self.state.decodes.fetch_add(1, Ordering::SeqCst);
        self.state.decoded.lock().unwrap_or_else(PoisonError::into_inner).push(params);

        let started = Instant::now();
        while !self.state.released.load(Ordering::SeqCst) && started.elapsed() < MAX_HOLD {
            std::thread::sleep(Duration::from_millis(1));
        }

        if self.state.fail_at_x.load(Ordering::SeqCst) == params.x {
            return Err(WallError::decode_failed(params.x, params.y, "injected failure"));
        }
        solid_image(params.width, params.height, segment.data.first().copied().unwrap_or(0))
    }
}

/// One `draw` call seen by a [`RecordingTexture`].
#[derive(Debug, Clone, PartialEq)]
pub struct DrawRecord {
    pub rect: Rect,
    pub options: RenderOptions,
    pub uploads: u64,
}

#[derive(Debug, Default)]
struct Recording {
    draws: Mutex<Vec<DrawRecord>>,
    uploads: AtomicUsize,
}

/// Texture that records uploads and draws into its factory.
#[derive(Debug)]
pub struct RecordingTexture {
    recording: Arc<Recording>,
}

impl SegmentTexture for RecordingTexture {
    fn upload(&mut self, _image: &DecodedImage) -> Result<()> {
        self.recording.uploads.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn draw(&self, rect: &Rect, options: &RenderOptions, statistics: &SegmentStatistics) {
        self.recording.draws.lock().unwrap_or_else(PoisonError::into_inner).push(DrawRecord {
            rect: *rect,
            options: *options,
            uploads: statistics.uploads(),
        });
    }
}

/// Factory whose textures all report into one shared recording.
#[derive(Debug, Clone, Default)]
pub struct RecordingTextureFactory {
    recording: Arc<Recording>,
}

impl RecordingTextureFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn draws(&self) -> Vec<DrawRecord> {
        self.recording.draws.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn uploads(&self) -> usize {
        self.recording.uploads.load(Ordering::SeqCst)
    }
}

impl TextureFactory for RecordingTextureFactory {
    fn create_texture(&self) -> Box<dyn SegmentTexture> {
        Box::new(RecordingTexture { recording: Arc::clone(&self.recording) })
    }
}
