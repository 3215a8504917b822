//! JPEG segment codec backed by the `image` crate

use image::ImageFormat;

use super::SegmentCodec;
use crate::types::{DecodedImage, Segment};
use crate::{Result, WallError};

/// Decodes JPEG-compressed segments into BGRA pixels.
#[derive(Debug, Default, Clone, Copy)]
pub struct JpegCodec;

impl SegmentCodec for JpegCodec {
    fn decode(&self, segment: &Segment) -> Result<DecodedImage> {
        let params = segment.parameters;
        let decoded = image::load_from_memory_with_format(&segment.data, ImageFormat::Jpeg)
            .map_err(|e| WallError::decode_failed(params.x, params.y, e.to_string()))?;

        let rgba = decoded.to_rgba8();
        let (width, height) = rgba.dimensions();
        let mut pixels = rgba.into_raw();
        for pixel in pixels.chunks_exact_mut(4) {
            pixel.swap(0, 2);
        }

        DecodedImage::new(width, height, pixels)
    }
}
