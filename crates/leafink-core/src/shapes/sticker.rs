//! Emoji stickers stamped onto the page.

use super::Geometry;
use kurbo::{Point, Rect};
use serde::{Deserialize, Serialize};

/// A single glyph drawn at a fixed size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sticker {
    pub glyph: String,
    pub size: f64,
}

impl Sticker {
    pub fn new(glyph: impl Into<String>, size: f64) -> Self {
        Self {
            glyph: glyph.into(),
            size,
        }
    }
}

impl Geometry for Sticker {
    fn local_bounds(&self) -> Rect {
        Rect::new(0.0, 0.0, self.size, self.size * 1.2)
    }

    fn hit_test_local(&self, point: Point, tolerance: f64) -> bool {
        self.local_bounds().inflate(tolerance, tolerance).contains(point)
    }
}
