//! Frame segments (tiles) and decoded pixel data

use std::sync::Arc;

use crate::{Result, WallError};

/// Raw segment pixels are 32-bit BGRA.
pub const BYTES_PER_PIXEL: usize = 4;

/// Position, size and encoding of one tile in stream pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SegmentParameters {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    /// Payload is compressed and has to go through a decoder first.
    pub compressed: bool,
}

impl SegmentParameters {
    pub fn right(&self) -> u32 {
        self.x.saturating_add(self.width)
    }

    pub fn bottom(&self) -> u32 {
        self.y.saturating_add(self.height)
    }

    /// Byte length of the uncompressed pixels for this tile.
    pub fn raw_len(&self) -> Result<usize> {
        pixel_bytes(self.width, self.height)
    }
}

/// Byte length of a `width` x `height` BGRA image, rejecting sizes that
/// overflow `usize`.
pub fn pixel_bytes(width: u32, height: u32) -> Result<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|pixels| pixels.checked_mul(BYTES_PER_PIXEL))
        .ok_or_else(|| WallError::invalid_segment(format!("{width}x{height} image is too large")))
}

/// One rectangular tile of a frame.
///
/// The payload is shared (`Arc`) so moving frames between buffers never
/// copies pixel data.
#[derive(Debug, Clone)]
pub struct Segment {
    pub parameters: SegmentParameters,
    pub data: Arc<[u8]>,
}

impl Segment {
    /// A compressed tile; pixels become available after decoding.
    pub fn compressed(x: u32, y: u32, width: u32, height: u32, data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            parameters: SegmentParameters { x, y, width, height, compressed: true },
            data: data.into(),
        }
    }

    /// An uncompressed tile carrying BGRA pixels.
    pub fn raw(x: u32, y: u32, width: u32, height: u32, data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            parameters: SegmentParameters { x, y, width, height, compressed: false },
            data: data.into(),
        }
    }

    pub fn is_compressed(&self) -> bool {
        self.parameters.compressed
    }

    /// View the payload of an uncompressed segment as an image.
    pub fn raw_image(&self) -> Result<DecodedImage> {
        if self.parameters.compressed {
            return Err(WallError::invalid_segment(format!(
                "segment at ({}, {}) is still compressed",
                self.parameters.x, self.parameters.y
            )));
        }
        DecodedImage::new(self.parameters.width, self.parameters.height, Arc::clone(&self.data))
    }

    /// Replace the compressed payload with decoded pixels.
    pub fn apply_decoded(&mut self, image: DecodedImage) -> Result<()> {
        let params = &self.parameters;
        if image.width != params.width || image.height != params.height {
            return Err(WallError::invalid_segment(format!(
                "decoded {}x{} image for a {}x{} segment at ({}, {})",
                image.width, image.height, params.width, params.height, params.x, params.y
            )));
        }
        self.data = image.pixels;
        self.parameters.compressed = false;
        Ok(())
    }
}

/// Pixels produced by decoding one segment (32-bit BGRA, tightly packed).
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Arc<[u8]>,
}

impl DecodedImage {
    pub fn new(width: u32, height: u32, pixels: impl Into<Arc<[u8]>>) -> Result<Self> {
        let pixels = pixels.into();
        let expected = pixel_bytes(width, height)?;
        if pixels.len() != expected {
            return Err(WallError::invalid_segment(format!(
                "{}x{} image needs {} bytes, got {}",
                width,
                height,
                expected,
                pixels.len()
            )));
        }
        Ok(Self { width, height, pixels })
    }
}
