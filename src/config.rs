//! Wall process configuration loaded from YAML
//!
//! ```yaml
//! wall: { width: 3840, height: 2160 }
//! screen: { x: 0, y: 0, width: 1920, height: 1080 }
//! rendering: { show_segment_borders: false, show_segment_statistics: false }
//! source: { max_errors: 10 }
//! ```
//!
//! Every section is optional and falls back to [`WallConfig::default`].

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::display::ScreenRegion;
use crate::renderer::RenderOptions;
use crate::types::{Rect, Size};
use crate::{Result, WallError};

const DEFAULT_WIDTH: f64 = 1920.0;
const DEFAULT_HEIGHT: f64 = 1080.0;

/// Frame source settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Consecutive source errors tolerated before the driver gives up
    pub max_errors: u32,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self { max_errors: 10 }
    }
}

/// Configuration of one wall process
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WallConfig {
    /// Size of the whole wall (display group) in scene units
    pub wall: Size,
    /// Part of the wall this process shows
    pub screen: Rect,
    pub rendering: RenderOptions,
    pub source: SourceConfig,
}

impl Default for WallConfig {
    fn default() -> Self {
        let size = Size::new(DEFAULT_WIDTH, DEFAULT_HEIGHT);
        Self {
            wall: size,
            screen: Rect::from_size(size),
            rendering: RenderOptions::default(),
            source: SourceConfig::default(),
        }
    }
}

impl WallConfig {
    /// Parse and validate a YAML document.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: WallConfig = serde_yaml_ng::from_str(yaml)?;
        config.validate()?;
        debug!(
            wall_width = config.wall.width,
            wall_height = config.wall.height,
            screen_x = config.screen.x,
            screen_y = config.screen.y,
            "wall configuration loaded"
        );
        Ok(config)
    }

    /// Read and parse a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| WallError::io_error(path.to_path_buf(), e))?;
        Self::from_yaml(&yaml)
    }

    pub fn validate(&self) -> Result<()> {
        if self.wall.is_empty() {
            return Err(WallError::config_error(format!(
                "wall size must be positive, got {}x{}",
                self.wall.width, self.wall.height
            )));
        }
        if self.screen.is_empty() {
            return Err(WallError::config_error(format!(
                "screen size must be positive, got {}x{}",
                self.screen.width, self.screen.height
            )));
        }
        if self.source.max_errors == 0 {
            return Err(WallError::config_error("source.max_errors must be at least 1"));
        }
        Ok(())
    }

    /// The region of the wall this process draws.
    pub fn display_region(&self) -> ScreenRegion {
        ScreenRegion::new(self.screen)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_document_parses() {
        let config = WallConfig::from_yaml(
            r#"
wall: { width: 3840, height: 2160 }
screen: { x: 1920, y: 0, width: 1920, height: 1080 }
rendering: { show_segment_borders: true }
source: { max_errors: 3 }
"#,
        )
        .unwrap();

        assert_eq!(config.wall, Size::new(3840.0, 2160.0));
        assert_eq!(config.screen, Rect::new(1920.0, 0.0, 1920.0, 1080.0));
        assert!(config.rendering.show_segment_borders);
        assert!(!config.rendering.show_segment_statistics);
        assert_eq!(config.source.max_errors, 3);
    }

    #[test]
    fn missing_sections_use_defaults() {
        let config = WallConfig::from_yaml("wall: { width: 1920, height: 1080 }").unwrap();
        assert_eq!(config, WallConfig::default());
        assert_eq!(config.display_region().screens(), &[Rect::new(0.0, 0.0, 1920.0, 1080.0)]);
    }

    #[test]
    fn non_positive_sizes_are_rejected() {
        let err = WallConfig::from_yaml("wall: { width: 0, height: 1080 }").unwrap_err();
        assert!(matches!(err, WallError::Config { .. }));
        assert!(!err.is_retryable());

        let err = WallConfig::from_yaml("screen: { x: 0, y: 0, width: -5, height: 10 }").unwrap_err();
        assert!(matches!(err, WallError::Config { .. }));
    }

    #[test]
    fn malformed_yaml_is_a_config_error() {
        let err = WallConfig::from_yaml("wall: [1, 2").unwrap_err();
        assert!(matches!(err, WallError::Config { source: Some(_), .. }));
    }

    #[test]
    fn load_reports_missing_file_path() {
        let err = WallConfig::load("/nonexistent/wall.yaml").unwrap_err();
        match err {
            WallError::Io { path, .. } => assert_eq!(path, Path::new("/nonexistent/wall.yaml")),
            other => panic!("expected I/O error, got {other:?}"),
        }
    }
}
