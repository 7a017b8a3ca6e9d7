//! Boundary to the drawing surface that displays a page.
//!
//! The engine never rasterizes anything itself. Hosts implement
//! [`Renderer`] on top of whatever 2D surface they have.

use crate::scene::SceneModel;
use crate::shapes::ObjectId;
use crate::tools::{DrawingImplement, InteractionMode};
use kurbo::{Point, Size};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Renderer errors.
#[derive(Debug, Error)]
pub enum RendererError {
    #[error("Renderer initialization failed: {0}")]
    InitFailed(String),
    #[error("Bitmap export failed: {0}")]
    ExportFailed(String),
}

/// Result type for renderer operations.
pub type RenderResult<T> = Result<T, RendererError>;

/// Bitmap encoding for exports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Png,
    Jpeg,
    Webp,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Png => "png",
            ExportFormat::Jpeg => "jpg",
            ExportFormat::Webp => "webp",
        }
    }
}

/// Parameters of a bitmap export.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportOptions {
    pub format: ExportFormat,
    /// Output pixels per page unit.
    pub multiplier: f64,
    /// Encoder quality in `0.0..=1.0` (ignored by lossless formats).
    pub quality: f64,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            format: ExportFormat::Png,
            multiplier: 2.0,
            quality: 1.0,
        }
    }
}

/// A drawing surface for one page.
pub trait Renderer {
    /// Prepare the surface. Called once when the page session starts.
    fn initialize(&mut self, size: Size) -> RenderResult<()>;

    /// Switch pointer handling (selection, freehand capture, or neither).
    fn set_interaction(&mut self, mode: InteractionMode);

    /// Configure the implement used for freehand capture.
    fn set_implement(&mut self, implement: &DrawingImplement);

    /// Translate a host pointer position into page-local coordinates.
    fn to_local(&self, point: Point) -> Point {
        point
    }

    /// Front-most object under a page point.
    fn hit_test(&self, scene: &SceneModel, point: Point, tolerance: f64) -> Option<ObjectId> {
        scene.object_at(point, tolerance)
    }

    /// Draw the scene. Returns once the render pass is complete.
    fn render(&mut self, scene: &SceneModel);

    /// Put a text object into edit mode with its content selected.
    fn begin_text_editing(&mut self, id: ObjectId);

    /// Encode the page as a bitmap.
    fn export_bitmap(&mut self, scene: &SceneModel, options: &ExportOptions) -> RenderResult<Vec<u8>>;
}
