//! Editor configuration.

use crate::renderer::ExportOptions;
use crate::shapes::SerializableColor;
use kurbo::Size;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Tunables for page sessions. Every field has a default, so a config file
/// only needs the values it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    pub page_width: f64,
    pub page_height: f64,
    /// Snapshots kept per page for undo.
    pub history_capacity: usize,
    /// Delay before a one-shot tool (clear, undo, ...) reverts to select.
    pub one_shot_revert_ms: u64,
    /// Time the update flag stays set after a remote snapshot is applied.
    pub remote_grace_ms: u64,
    /// Time the update flag stays set after an undo restore.
    pub undo_grace_ms: u64,
    #[serde(with = "css_color")]
    pub brush_color: SerializableColor,
    pub brush_width: f64,
    /// Eraser width is `max(eraser_min_width, brush_width * eraser_multiplier)`.
    pub eraser_multiplier: f64,
    pub eraser_min_width: f64,
    pub text_placeholder: String,
    pub text_font: String,
    pub text_size: f64,
    /// Side length of placed circles (diameter) and rectangles.
    pub shape_size: f64,
    pub shape_min_stroke_width: f64,
    pub image_target_width: f64,
    pub sticker_size: f64,
    /// Hit-test slop, in page units.
    pub hit_tolerance: f64,
    /// Top-level collection holding page documents.
    pub collection: String,
    pub export: ExportOptions,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            page_width: 450.0,
            page_height: 650.0,
            history_capacity: 30,
            one_shot_revert_ms: 200,
            remote_grace_ms: 500,
            undo_grace_ms: 100,
            brush_color: SerializableColor::black(),
            brush_width: 3.0,
            eraser_multiplier: 3.0,
            eraser_min_width: 10.0,
            text_placeholder: "Type here...".to_string(),
            text_font: "Inter, serif".to_string(),
            text_size: 24.0,
            shape_size: 80.0,
            shape_min_stroke_width: 2.0,
            image_target_width: 150.0,
            sticker_size: 80.0,
            hit_tolerance: 4.0,
            collection: "books".to_string(),
            export: ExportOptions::default(),
        }
    }
}

impl EditorConfig {
    /// Parse from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn page_size(&self) -> Size {
        Size::new(self.page_width, self.page_height)
    }

    pub fn one_shot_revert(&self) -> Duration {
        Duration::from_millis(self.one_shot_revert_ms)
    }

    pub fn remote_grace(&self) -> Duration {
        Duration::from_millis(self.remote_grace_ms)
    }

    pub fn undo_grace(&self) -> Duration {
        Duration::from_millis(self.undo_grace_ms)
    }

    /// Effective eraser width for a brush width.
    pub fn eraser_width(&self, brush_width: f64) -> f64 {
        (brush_width * self.eraser_multiplier).max(self.eraser_min_width)
    }
}

/// Colors in config files are CSS strings.
mod css_color {
    use crate::shapes::SerializableColor;
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(color: &SerializableColor, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&color.to_css())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<SerializableColor, D::Error> {
        let s = String::deserialize(deserializer)?;
        SerializableColor::from_css(&s).ok_or_else(|| D::Error::custom(format!("invalid color: {s}")))
    }
}
