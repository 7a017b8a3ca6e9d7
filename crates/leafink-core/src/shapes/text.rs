//! Text blocks.

use super::{Geometry, SerializableColor};
use kurbo::{Point, Rect};
use serde::{Deserialize, Serialize};

/// Minimum hit width so empty text can still be clicked.
const MIN_WIDTH: f64 = 20.0;

/// An editable run of text anchored at its top-left corner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextBlock {
    pub content: String,
    pub font: String,
    pub color: SerializableColor,
    pub size: f64,
    #[serde(default = "default_editable")]
    pub editable: bool,
}

fn default_editable() -> bool {
    true
}

impl TextBlock {
    pub fn new(
        content: impl Into<String>,
        font: impl Into<String>,
        color: SerializableColor,
        size: f64,
    ) -> Self {
        Self {
            content: content.into(),
            font: font.into(),
            color,
            size,
            editable: true,
        }
    }

    /// Approximate width from the longest line.
    fn approximate_width(&self) -> f64 {
        let max_line_len = self
            .content
            .lines()
            .map(|line| line.chars().count())
            .max()
            .unwrap_or(0);
        max_line_len as f64 * self.size * 0.55
    }

    fn approximate_height(&self) -> f64 {
        let mut line_count = self.content.lines().count().max(1);
        if self.content.ends_with('\n') {
            line_count += 1;
        }
        line_count as f64 * self.size * 1.2
    }
}

impl Geometry for TextBlock {
    fn local_bounds(&self) -> Rect {
        Rect::new(
            0.0,
            0.0,
            self.approximate_width().max(MIN_WIDTH),
            self.approximate_height(),
        )
    }

    fn hit_test_local(&self, point: Point, tolerance: f64) -> bool {
        self.local_bounds().inflate(tolerance, tolerance).contains(point)
    }
}
