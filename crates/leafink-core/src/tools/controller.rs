//! Tool state machine translating pointer input into scene actions.

use super::{
    DrawingImplement, InteractionMode, Tool, ToolAction, ToolKind, ToolResponse, Transition,
};
use crate::config::EditorConfig;
use crate::shapes::{
    CompositeMode, DrawableKind, DrawableObject, ObjectId, Outline, ShapeKind, SerializableColor,
    Sticker, Stroke, TextBlock, Transform,
};
use kurbo::{Point, Vec2};
use std::time::Instant;

/// Minimum distance between captured freehand points.
const DECIMATE: f64 = 2.0;

/// What the next click on empty canvas creates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placement {
    Text,
    Image,
    Circle,
    Rect,
}

/// The single live tool session. Replaced wholesale on every transition, so
/// a new tool never inherits a previous tool's armed placement or capture.
#[derive(Debug, Clone, PartialEq)]
enum ToolSession {
    Select,
    Freehand {
        composite: CompositeMode,
        capture: Option<Vec<Point>>,
    },
    Placement(Placement),
    /// A one-shot tool is shown until `revert_at`, then select takes over.
    OneShot { revert_at: Instant },
}

/// Manages the current tool and its state for one page.
#[derive(Debug, Clone)]
pub struct ToolController {
    current: ToolKind,
    session: ToolSession,
    brush_color: SerializableColor,
    brush_width: f64,
    config: EditorConfig,
}

impl ToolController {
    pub fn new(config: EditorConfig) -> Self {
        Self {
            current: ToolKind::Select,
            session: ToolSession::Select,
            brush_color: config.brush_color,
            brush_width: config.brush_width,
            config,
        }
    }

    /// Currently selected tool.
    pub fn current(&self) -> ToolKind {
        self.current
    }

    pub fn mode(&self) -> InteractionMode {
        match self.session {
            ToolSession::Select => InteractionMode::Select,
            ToolSession::Freehand { .. } => InteractionMode::Draw,
            ToolSession::Placement(_) => InteractionMode::Place,
            ToolSession::OneShot { .. } => InteractionMode::Idle,
        }
    }

    /// Whether a freehand stroke is being captured.
    pub fn is_capturing(&self) -> bool {
        matches!(self.session, ToolSession::Freehand { capture: Some(_), .. })
    }

    pub fn brush_color(&self) -> SerializableColor {
        self.brush_color
    }

    pub fn brush_width(&self) -> f64 {
        self.brush_width
    }

    /// The implement freehand capture would use right now, if drawing.
    pub fn implement(&self) -> Option<DrawingImplement> {
        match self.session {
            ToolSession::Freehand { composite, .. } => Some(self.implement_for(composite)),
            _ => None,
        }
    }

    fn implement_for(&self, composite: CompositeMode) -> DrawingImplement {
        match composite {
            CompositeMode::SourceOver => DrawingImplement {
                width: self.brush_width,
                color: self.brush_color,
                composite,
            },
            CompositeMode::DestinationOut => DrawingImplement {
                width: self.config.eraser_width(self.brush_width),
                color: SerializableColor::black(),
                composite,
            },
        }
    }

    fn enter(&mut self, kind: ToolKind, session: ToolSession) -> Transition {
        self.current = kind;
        self.session = session;
        log::debug!("Tool changed to {}", kind);
        Transition {
            tool: kind,
            mode: self.mode(),
        }
    }

    /// Select a tool.
    ///
    /// One-shot tools only act when `active` is true (the page is the one on
    /// screen); either way they revert to select once the revert delay has
    /// passed, see [`ToolController::poll`].
    pub fn select(&mut self, tool: Tool, active: bool, now: Instant) -> ToolResponse {
        let kind = tool.kind();
        let mut response = ToolResponse::default();
        let session = match tool {
            Tool::Select => ToolSession::Select,
            Tool::Brush | Tool::Eraser => {
                let composite = if kind == ToolKind::Eraser {
                    CompositeMode::DestinationOut
                } else {
                    CompositeMode::SourceOver
                };
                response.implement = Some(self.implement_for(composite));
                ToolSession::Freehand {
                    composite,
                    capture: None,
                }
            }
            Tool::Text => ToolSession::Placement(Placement::Text),
            Tool::Image => ToolSession::Placement(Placement::Image),
            Tool::ShapeCircle => ToolSession::Placement(Placement::Circle),
            Tool::ShapeRect => ToolSession::Placement(Placement::Rect),
            Tool::Sticker { glyph } => {
                let action = if glyph.trim().is_empty() {
                    log::debug!("Sticker ignored: no glyph");
                    None
                } else {
                    Some(ToolAction::Stamp(self.sticker(glyph)))
                };
                self.one_shot(kind, action, active, now, &mut response)
            }
            Tool::Clear => self.one_shot(kind, Some(ToolAction::Clear), active, now, &mut response),
            Tool::Undo => self.one_shot(kind, Some(ToolAction::Undo), active, now, &mut response),
            Tool::Download => {
                let action = ToolAction::Export(self.config.export);
                self.one_shot(kind, Some(action), active, now, &mut response)
            }
            Tool::Export(options) => {
                let action = ToolAction::Export(options);
                self.one_shot(kind, Some(action), active, now, &mut response)
            }
        };
        response.transition = Some(self.enter(kind, session));
        response
    }

    /// Arm the revert timer, keeping the action only if the page is active.
    fn one_shot(
        &self,
        kind: ToolKind,
        action: Option<ToolAction>,
        active: bool,
        now: Instant,
        response: &mut ToolResponse,
    ) -> ToolSession {
        if active {
            response.action = action;
        } else {
            log::debug!("{} ignored on inactive page", kind);
        }
        ToolSession::OneShot {
            revert_at: now + self.config.one_shot_revert(),
        }
    }

    /// Advance timers. Reverts a one-shot tool to select once due.
    pub fn poll(&mut self, now: Instant) -> ToolResponse {
        match self.session {
            ToolSession::OneShot { revert_at } if now >= revert_at => ToolResponse {
                transition: Some(self.enter(ToolKind::Select, ToolSession::Select)),
                ..Default::default()
            },
            _ => ToolResponse::default(),
        }
    }

    /// Change brush color and width. Applies immediately to the active
    /// implement, including a stroke in progress.
    pub fn set_brush(&mut self, color: SerializableColor, width: f64) -> ToolResponse {
        self.brush_color = color;
        self.brush_width = width;
        ToolResponse {
            implement: self.implement(),
            ..Default::default()
        }
    }

    /// Pointer pressed at a page point.
    ///
    /// `target` is the object under the pointer, if any. Placement tools
    /// ignore clicks on objects and clicks on inactive pages without using
    /// up the placement.
    pub fn pointer_down(&mut self, pos: Point, target: Option<ObjectId>, active: bool) -> ToolResponse {
        match &mut self.session {
            ToolSession::Freehand { capture, .. } => {
                *capture = Some(vec![pos]);
                ToolResponse::default()
            }
            ToolSession::Placement(placement) => {
                let placement = *placement;
                if !active {
                    log::debug!("Placement ignored on inactive page");
                    return ToolResponse::default();
                }
                if target.is_some() {
                    return ToolResponse::default();
                }
                let action = match placement {
                    Placement::Text => ToolAction::Place(self.text_at(pos)),
                    Placement::Circle => ToolAction::Place(self.outline_at(ShapeKind::Circle, pos)),
                    Placement::Rect => ToolAction::Place(self.outline_at(ShapeKind::Rectangle, pos)),
                    Placement::Image => ToolAction::RequestImage(pos),
                };
                ToolResponse {
                    transition: Some(self.enter(ToolKind::Select, ToolSession::Select)),
                    implement: None,
                    action: Some(action),
                }
            }
            ToolSession::Select | ToolSession::OneShot { .. } => ToolResponse::default(),
        }
    }

    /// Pointer moved while pressed.
    pub fn pointer_move(&mut self, pos: Point) {
        if let ToolSession::Freehand {
            capture: Some(points),
            ..
        } = &mut self.session
        {
            push_decimated(points, pos);
        }
    }

    /// Pointer released. Finishes a freehand stroke of at least two points.
    pub fn pointer_up(&mut self, pos: Point) -> ToolResponse {
        let (composite, mut points) = match &mut self.session {
            ToolSession::Freehand { composite, capture } => match capture.take() {
                Some(points) => (*composite, points),
                None => return ToolResponse::default(),
            },
            _ => return ToolResponse::default(),
        };
        push_decimated(&mut points, pos);
        if points.len() < 2 {
            return ToolResponse::default();
        }
        let implement = self.implement_for(composite);
        let (origin, local) = Stroke::normalize(&points);
        let stroke = Stroke::new(local, implement.color, implement.width).with_composite(composite);
        ToolResponse {
            action: Some(ToolAction::Draw(DrawableObject::new(
                Transform::at(origin),
                DrawableKind::Stroke(stroke),
            ))),
            ..Default::default()
        }
    }

    /// Abandon a stroke in progress.
    pub fn cancel(&mut self) {
        if let ToolSession::Freehand { capture, .. } = &mut self.session {
            *capture = None;
        }
    }

    fn text_at(&self, pos: Point) -> DrawableObject {
        let text = TextBlock::new(
            self.config.text_placeholder.clone(),
            self.config.text_font.clone(),
            self.brush_color,
            self.config.text_size,
        );
        DrawableObject::new(Transform::at(pos), DrawableKind::Text(text))
    }

    fn outline_at(&self, kind: ShapeKind, pos: Point) -> DrawableObject {
        let size = self.config.shape_size;
        let half = size / 2.0;
        let outline = Outline::new(kind, size, size).with_stroke(
            self.brush_color,
            self.brush_width.max(self.config.shape_min_stroke_width),
        );
        DrawableObject::new(
            Transform::at(pos - Vec2::new(half, half)),
            DrawableKind::Shape(outline),
        )
    }

    /// Stickers are stamped in the middle of the page.
    fn sticker(&self, glyph: String) -> DrawableObject {
        let size = self.config.sticker_size;
        let origin = Point::new(
            self.config.page_width / 2.0 - size / 2.0,
            self.config.page_height / 2.0 - size / 2.0,
        );
        DrawableObject::new(
            Transform::at(origin),
            DrawableKind::Sticker(Sticker::new(glyph, size)),
        )
    }
}

fn push_decimated(points: &mut Vec<Point>, pos: Point) {
    match points.last() {
        Some(last) if (pos - *last).hypot() < DECIMATE => {}
        _ => points.push(pos),
    }
}
