//! Tool system for journal pages.

mod controller;

pub use controller::ToolController;

use crate::renderer::ExportOptions;
use crate::shapes::{CompositeMode, DrawableObject, SerializableColor};
use kurbo::Point;
use peniko::Color;
use serde::{Deserialize, Serialize};

/// Tool identifiers, as shown by the toolbar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ToolKind {
    #[default]
    Select,
    Brush,
    Eraser,
    Text,
    Image,
    ShapeCircle,
    ShapeRect,
    Sticker,
    Clear,
    Undo,
    Download,
    Export,
}

impl ToolKind {
    /// Tools that act once and then fall back to select.
    pub fn is_one_shot(&self) -> bool {
        matches!(
            self,
            ToolKind::Sticker | ToolKind::Clear | ToolKind::Undo | ToolKind::Download | ToolKind::Export
        )
    }

    /// Tools that place one object on the next click over empty space.
    pub fn is_placement(&self) -> bool {
        matches!(
            self,
            ToolKind::Text | ToolKind::Image | ToolKind::ShapeCircle | ToolKind::ShapeRect
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ToolKind::Select => "select",
            ToolKind::Brush => "brush",
            ToolKind::Eraser => "eraser",
            ToolKind::Text => "text",
            ToolKind::Image => "image",
            ToolKind::ShapeCircle => "shape-circle",
            ToolKind::ShapeRect => "shape-rect",
            ToolKind::Sticker => "sticker",
            ToolKind::Clear => "clear",
            ToolKind::Undo => "undo",
            ToolKind::Download => "download",
            ToolKind::Export => "export",
        }
    }
}

impl std::fmt::Display for ToolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tool selection command, carrying only the payload its tool needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "tool", rename_all = "kebab-case")]
pub enum Tool {
    Select,
    Brush,
    Eraser,
    Text,
    Image,
    ShapeCircle,
    ShapeRect,
    Sticker { glyph: String },
    Clear,
    Undo,
    Download,
    Export(ExportOptions),
}

impl Tool {
    pub fn kind(&self) -> ToolKind {
        match self {
            Tool::Select => ToolKind::Select,
            Tool::Brush => ToolKind::Brush,
            Tool::Eraser => ToolKind::Eraser,
            Tool::Text => ToolKind::Text,
            Tool::Image => ToolKind::Image,
            Tool::ShapeCircle => ToolKind::ShapeCircle,
            Tool::ShapeRect => ToolKind::ShapeRect,
            Tool::Sticker { .. } => ToolKind::Sticker,
            Tool::Clear => ToolKind::Clear,
            Tool::Undo => ToolKind::Undo,
            Tool::Download => ToolKind::Download,
            Tool::Export(_) => ToolKind::Export,
        }
    }

    pub fn sticker(glyph: impl Into<String>) -> Self {
        Tool::Sticker { glyph: glyph.into() }
    }
}

/// How the renderer should treat pointer input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InteractionMode {
    /// Hit-testing, drag and resize of existing objects.
    #[default]
    Select,
    /// Freehand path capture.
    Draw,
    /// Waiting for a click to place a new object.
    Place,
    /// Pointer input ignored while a one-shot tool is showing.
    Idle,
}

/// Width, color and compositing used for freehand capture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawingImplement {
    pub width: f64,
    pub color: SerializableColor,
    pub composite: CompositeMode,
}

impl DrawingImplement {
    /// The color as a peniko Color.
    pub fn paint(&self) -> Color {
        self.color.into()
    }
}

/// Tool state reported to the renderer and the toolbar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub tool: ToolKind,
    pub mode: InteractionMode,
}

/// Scene-level work requested by the tool controller.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolAction {
    /// Add a finished freehand stroke.
    Draw(DrawableObject),
    /// Add a placed object and make it the active selection.
    Place(DrawableObject),
    /// Add a sticker.
    Stamp(DrawableObject),
    /// Ask the host for an image file, to be placed at this point.
    RequestImage(Point),
    Clear,
    Undo,
    Export(ExportOptions),
}

/// Everything a controller call produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolResponse {
    /// Set when the active tool changed.
    pub transition: Option<Transition>,
    /// Set when the freehand implement changed.
    pub implement: Option<DrawingImplement>,
    pub action: Option<ToolAction>,
}

impl ToolResponse {
    pub fn is_empty(&self) -> bool {
        self.transition.is_none() && self.implement.is_none() && self.action.is_none()
    }
}
