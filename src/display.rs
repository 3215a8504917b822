//! What part of the wall this process shows

use crate::types::Rect;

/// Answers whether a scene rectangle lands on this process' physical screens.
pub trait DisplayRegion {
    fn is_region_visible(&self, region: &Rect) -> bool;
}

/// The screens driven by one wall process, in scene coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct ScreenRegion {
    screens: Vec<Rect>,
}

impl ScreenRegion {
    pub fn new(screen: Rect) -> Self {
        Self { screens: vec![screen] }
    }

    pub fn with_screens(screens: Vec<Rect>) -> Self {
        Self { screens }
    }

    pub fn screens(&self) -> &[Rect] {
        &self.screens
    }
}

impl DisplayRegion for ScreenRegion {
    fn is_region_visible(&self, region: &Rect) -> bool {
        self.screens.iter().any(|screen| screen.intersects(region))
    }
}
