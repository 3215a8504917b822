//! Per-segment rendering state.
//!
//! GPU upload and draw calls live behind [`SegmentTexture`]; this module only
//! tracks what a segment renderer needs to decide *whether* to upload or draw:
//! its geometry in stream pixel space and a dirty flag for its texture.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::Result;
use crate::types::{DecodedImage, Rect, SegmentParameters};

/// Debug overlays drawn on top of each segment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    pub show_segment_borders: bool,
    pub show_segment_statistics: bool,
}

/// Backend texture for one segment.
pub trait SegmentTexture: Send {
    /// Replace the texture contents.
    fn upload(&mut self, image: &DecodedImage) -> Result<()>;

    /// Draw the texture into `rect`, given in scene (wall) coordinates.
    fn draw(&self, rect: &Rect, options: &RenderOptions, statistics: &SegmentStatistics);
}

/// Creates textures for new segment renderers.
pub trait TextureFactory: Send + Sync {
    fn create_texture(&self) -> Box<dyn SegmentTexture>;
}

const STATISTICS_WINDOW: Duration = Duration::from_secs(1);

/// Upload counters shown by the statistics overlay.
#[derive(Debug, Clone, Default)]
pub struct SegmentStatistics {
    uploads: u64,
    recent: VecDeque<Instant>,
}

impl SegmentStatistics {
    fn record_upload(&mut self, now: Instant) {
        self.uploads += 1;
        self.recent.push_back(now);
        while let Some(oldest) = self.recent.front() {
            if now.duration_since(*oldest) > STATISTICS_WINDOW {
                self.recent.pop_front();
            } else {
                break;
            }
        }
    }

    /// Total texture uploads since the renderer was created.
    pub fn uploads(&self) -> u64 {
        self.uploads
    }

    /// Uploads during the last second.
    pub fn uploads_per_second(&self) -> usize {
        self.recent.len()
    }
}

/// Geometry and texture of one segment index.
pub struct SegmentRenderer {
    texture: Box<dyn SegmentTexture>,
    rect: Rect,
    texture_needs_update: bool,
    has_texture: bool,
    statistics: SegmentStatistics,
}

impl SegmentRenderer {
    pub fn new(texture: Box<dyn SegmentTexture>) -> Self {
        Self {
            texture,
            rect: Rect::default(),
            texture_needs_update: true,
            has_texture: false,
            statistics: SegmentStatistics::default(),
        }
    }

    /// Geometry of the segment in stream pixel space.
    pub fn set_parameters(&mut self, params: &SegmentParameters) {
        self.rect = Rect::new(
            params.x as f64,
            params.y as f64,
            params.width as f64,
            params.height as f64,
        );
    }

    pub fn rect(&self) -> &Rect {
        &self.rect
    }

    pub fn set_texture_needs_update(&mut self) {
        self.texture_needs_update = true;
    }

    pub fn texture_needs_update(&self) -> bool {
        self.texture_needs_update
    }

    pub fn has_texture(&self) -> bool {
        self.has_texture
    }

    pub fn statistics(&self) -> &SegmentStatistics {
        &self.statistics
    }

    /// Upload new pixels. On failure the previous texture stays in place and
    /// the renderer remains dirty.
    pub fn update_texture(&mut self, image: &DecodedImage) -> Result<()> {
        self.texture.upload(image)?;
        self.texture_needs_update = false;
        self.has_texture = true;
        self.statistics.record_upload(Instant::now());
        Ok(())
    }

    /// Draw the last uploaded texture at `scene`, this segment's rect mapped
    /// into the window. Nothing is drawn before the first upload.
    pub fn render(&self, scene: &Rect, options: &RenderOptions) {
        if self.has_texture {
            self.texture.draw(scene, options, &self.statistics);
        }
    }
}

impl std::fmt::Debug for SegmentRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SegmentRenderer")
            .field("rect", &self.rect)
            .field("texture_needs_update", &self.texture_needs_update)
            .field("has_texture", &self.has_texture)
            .finish()
    }
}

/// CPU-side texture: keeps the last uploaded image for headless compositing.
#[derive(Debug, Clone, Default)]
pub struct MemoryTexture {
    image: Arc<Mutex<Option<DecodedImage>>>,
}

impl MemoryTexture {
    /// The last uploaded image, if any.
    pub fn image(&self) -> Option<DecodedImage> {
        self.image.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl SegmentTexture for MemoryTexture {
    fn upload(&mut self, image: &DecodedImage) -> Result<()> {
        *self.image.lock().unwrap_or_else(PoisonError::into_inner) = Some(image.clone());
        Ok(())
    }

    fn draw(&self, _rect: &Rect, _options: &RenderOptions, _statistics: &SegmentStatistics) {}
}

/// Hands out [`MemoryTexture`]s and remembers them for inspection.
#[derive(Debug, Clone, Default)]
pub struct MemoryTextureFactory {
    created: Arc<Mutex<Vec<MemoryTexture>>>,
}

impl MemoryTextureFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every texture created so far, oldest first.
    pub fn textures(&self) -> Vec<MemoryTexture> {
        self.created.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl TextureFactory for MemoryTextureFactory {
    fn create_texture(&self) -> Box<dyn SegmentTexture> {
        let texture = MemoryTexture::default();
        self.created.lock().unwrap_or_else(PoisonError::into_inner).push(texture.clone());
        Box::new(texture)
    }
}
