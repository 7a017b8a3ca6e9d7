//! Drawable objects that make up a journal page.

mod image;
mod outline;
mod sticker;
mod stroke;
mod text;

pub use image::{ImageDecodeError, ImageFormat, ImageRef};
pub use outline::{Outline, ShapeKind};
pub use sticker::Sticker;
pub use stroke::{CompositeMode, Stroke};
pub use text::TextBlock;

use kurbo::{Affine, Point, Rect};
use peniko::Color;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for drawable objects.
pub type ObjectId = Uuid;

/// Serializable color representation (RGBA8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializableColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl SerializableColor {
    pub fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn black() -> Self {
        Self::new(0, 0, 0, 255)
    }

    pub fn white() -> Self {
        Self::new(255, 255, 255, 255)
    }

    pub fn transparent() -> Self {
        Self::new(0, 0, 0, 0)
    }

    /// Parse a CSS color string like "#ff0000", "#f00", "#ff000080",
    /// "rgb(255, 0, 0)", "rgba(0, 0, 0, 0.5)" or "transparent".
    pub fn from_css(s: &str) -> Option<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("transparent") {
            return Some(Self::transparent());
        }
        if let Some(hex) = s.strip_prefix('#') {
            return Self::from_hex(hex);
        }
        let lower = s.to_ascii_lowercase();
        let args = lower
            .strip_prefix("rgba(")
            .or_else(|| lower.strip_prefix("rgb("))?
            .strip_suffix(')')?;
        let parts: Vec<&str> = args.split(',').map(str::trim).collect();
        let channel = |p: &str| p.parse::<u8>().ok();
        match parts.as_slice() {
            [r, g, b] => Some(Self::new(channel(r)?, channel(g)?, channel(b)?, 255)),
            [r, g, b, a] => {
                let alpha = a.parse::<f64>().ok()?.clamp(0.0, 1.0);
                Some(Self::new(
                    channel(r)?,
                    channel(g)?,
                    channel(b)?,
                    (alpha * 255.0).round() as u8,
                ))
            }
            _ => None,
        }
    }

    fn from_hex(hex: &str) -> Option<Self> {
        if !hex.is_ascii() {
            return None;
        }
        let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        let nibble = |i: usize| u8::from_str_radix(&hex[i..i + 1], 16).ok().map(|v| v * 17);
        match hex.len() {
            3 => Some(Self::new(nibble(0)?, nibble(1)?, nibble(2)?, 255)),
            6 => Some(Self::new(byte(0)?, byte(2)?, byte(4)?, 255)),
            8 => Some(Self::new(byte(0)?, byte(2)?, byte(4)?, byte(6)?)),
            _ => None,
        }
    }

    /// Format as "#rrggbb", or "#rrggbbaa" when not fully opaque.
    pub fn to_css(&self) -> String {
        if self.a == 255 {
            format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            format!("#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        }
    }
}

impl From<Color> for SerializableColor {
    fn from(color: Color) -> Self {
        let rgba = color.to_rgba8();
        Self {
            r: rgba.r,
            g: rgba.g,
            b: rgba.b,
            a: rgba.a,
        }
    }
}

impl From<SerializableColor> for Color {
    fn from(color: SerializableColor) -> Self {
        Color::from_rgba8(color.r, color.g, color.b, color.a)
    }
}

fn one() -> f64 {
    1.0
}

/// Placement of an object on the page.
///
/// Object geometry is stored relative to `(left, top)`; scale is applied
/// first, then rotation (degrees, clockwise), then the translation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub left: f64,
    pub top: f64,
    #[serde(default = "one")]
    pub scale_x: f64,
    #[serde(default = "one")]
    pub scale_y: f64,
    #[serde(default)]
    pub angle: f64,
}

impl Default for Transform {
    fn default() -> Self {
        Self::at(Point::ZERO)
    }
}

impl Transform {
    /// An unscaled, unrotated transform with its origin at `point`.
    pub fn at(point: Point) -> Self {
        Self {
            left: point.x,
            top: point.y,
            scale_x: 1.0,
            scale_y: 1.0,
            angle: 0.0,
        }
    }

    /// Set a uniform scale.
    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale_x = scale;
        self.scale_y = scale;
        self
    }

    pub fn origin(&self) -> Point {
        Point::new(self.left, self.top)
    }

    /// Local-to-page affine transform.
    pub fn to_affine(&self) -> Affine {
        Affine::translate((self.left, self.top))
            * Affine::rotate(self.angle.to_radians())
            * Affine::scale_non_uniform(self.scale_x, self.scale_y)
    }
}

/// Interaction flags shared by every object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectFlags {
    /// Can be picked up by the select tool.
    pub selectable: bool,
    /// Receives pointer events (and therefore swallows placement clicks).
    pub evented: bool,
}

impl Default for ObjectFlags {
    fn default() -> Self {
        Self {
            selectable: true,
            evented: true,
        }
    }
}

/// Geometry in object-local coordinates.
pub trait Geometry {
    /// Bounding box in local coordinates.
    fn local_bounds(&self) -> Rect;

    /// Check if a point (in local coordinates) hits this geometry.
    fn hit_test_local(&self, point: Point, tolerance: f64) -> bool;
}

/// Variant payload of a drawable object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DrawableKind {
    Stroke(Stroke),
    Shape(Outline),
    Text(TextBlock),
    Image(ImageRef),
    Sticker(Sticker),
}

impl DrawableKind {
    fn geometry(&self) -> &dyn Geometry {
        match self {
            DrawableKind::Stroke(s) => s,
            DrawableKind::Shape(s) => s,
            DrawableKind::Text(s) => s,
            DrawableKind::Image(s) => s,
            DrawableKind::Sticker(s) => s,
        }
    }

    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            DrawableKind::Stroke(_) => "stroke",
            DrawableKind::Shape(_) => "shape",
            DrawableKind::Text(_) => "text",
            DrawableKind::Image(_) => "image",
            DrawableKind::Sticker(_) => "sticker",
        }
    }
}

/// An object on a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawableObject {
    pub id: ObjectId,
    pub transform: Transform,
    #[serde(default)]
    pub flags: ObjectFlags,
    pub kind: DrawableKind,
}

impl DrawableObject {
    /// Create a new object with a fresh id.
    pub fn new(transform: Transform, kind: DrawableKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            transform,
            flags: ObjectFlags::default(),
            kind,
        }
    }

    /// Replace the interaction flags.
    pub fn with_flags(mut self, flags: ObjectFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// Bounding box in page coordinates.
    pub fn bounds(&self) -> Rect {
        self.transform
            .to_affine()
            .transform_rect_bbox(self.kind.geometry().local_bounds())
    }

    /// Check if a page point hits this object.
    pub fn hit_test(&self, point: Point, tolerance: f64) -> bool {
        let affine = self.transform.to_affine();
        if affine.determinant().abs() < f64::EPSILON {
            return false;
        }
        let scale = self.transform.scale_x.abs().min(self.transform.scale_y.abs());
        let local = affine.inverse() * point;
        self.kind
            .geometry()
            .hit_test_local(local, tolerance / scale.max(f64::EPSILON))
    }

    /// Apply a user edit. Returns true if anything changed.
    ///
    /// Patches with non-finite numbers are ignored: they cannot be
    /// serialized for other clients.
    pub fn apply_patch(&mut self, patch: &ObjectPatch) -> bool {
        if !patch.is_finite() {
            return false;
        }
        let before = self.clone();
        let t = &mut self.transform;
        if let Some(left) = patch.left {
            t.left = left;
        }
        if let Some(top) = patch.top {
            t.top = top;
        }
        if let Some(sx) = patch.scale_x {
            t.scale_x = sx;
        }
        if let Some(sy) = patch.scale_y {
            t.scale_y = sy;
        }
        if let Some(angle) = patch.angle {
            t.angle = angle;
        }
        match &mut self.kind {
            DrawableKind::Stroke(stroke) => {
                if let Some(color) = patch.color {
                    stroke.color = color;
                }
            }
            DrawableKind::Shape(outline) => {
                if let Some(color) = patch.color {
                    outline.stroke_color = color;
                }
            }
            DrawableKind::Text(text) => {
                if let Some(content) = &patch.content {
                    if text.editable {
                        text.content = content.clone();
                    }
                }
                if let Some(color) = patch.color {
                    text.color = color;
                }
            }
            DrawableKind::Sticker(sticker) => {
                if let Some(content) = &patch.content {
                    sticker.glyph = content.clone();
                }
            }
            DrawableKind::Image(_) => {}
        }
        *self != before
    }
}

/// A partial update produced by select-mode manipulation or text editing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale_x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale_y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub angle: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<SerializableColor>,
}

impl ObjectPatch {
    /// Move an object so its origin lands on `point`.
    pub fn moved_to(point: Point) -> Self {
        Self {
            left: Some(point.x),
            top: Some(point.y),
            ..Default::default()
        }
    }

    /// Replace text content.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Whether every numeric field is finite.
    pub fn is_finite(&self) -> bool {
        [self.left, self.top, self.scale_x, self.scale_y, self.angle]
            .into_iter()
            .flatten()
            .all(f64::is_finite)
    }
}

/// Distance from a point to a line segment (a→b).
pub fn point_to_segment_dist(point: Point, a: Point, b: Point) -> f64 {
    let seg = b - a;
    let pv = point - a;
    let len_sq = seg.hypot2();
    if len_sq < f64::EPSILON {
        return pv.hypot();
    }
    let t = (pv.dot(seg) / len_sq).clamp(0.0, 1.0);
    (point - (a + seg * t)).hypot()
}

/// Minimum distance from a point to a polyline (sequence of connected segments).
pub fn point_to_polyline_dist(point: Point, points: &[Point]) -> f64 {
    match points {
        [] => f64::INFINITY,
        [single] => (point - *single).hypot(),
        _ => points
            .windows(2)
            .map(|w| point_to_segment_dist(point, w[0], w[1]))
            .fold(f64::INFINITY, f64::min),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect_object(at: Point) -> DrawableObject {
        DrawableObject::new(
            Transform::at(at),
            DrawableKind::Shape(Outline::new(ShapeKind::Rectangle, 80.0, 80.0)),
        )
    }

    #[test]
    fn test_color_from_css() {
        assert_eq!(
            SerializableColor::from_css("#000000"),
            Some(SerializableColor::black())
        );
        assert_eq!(
            SerializableColor::from_css("#fff"),
            Some(SerializableColor::white())
        );
        assert_eq!(
            SerializableColor::from_css("rgba(0, 0, 0, 1)"),
            Some(SerializableColor::black())
        );
        assert_eq!(
            SerializableColor::from_css("rgb(255, 0, 0)"),
            Some(SerializableColor::new(255, 0, 0, 255))
        );
        assert_eq!(
            SerializableColor::from_css("transparent"),
            Some(SerializableColor::transparent())
        );
        assert_eq!(SerializableColor::from_css("#12"), None);
        assert_eq!(SerializableColor::from_css("blue"), None);
    }

    #[test]
    fn test_color_to_css() {
        assert_eq!(SerializableColor::new(255, 0, 16, 255).to_css(), "#ff0010");
        assert_eq!(SerializableColor::new(0, 0, 0, 128).to_css(), "#00000080");
    }

    #[test]
    fn test_peniko_conversion() {
        let color = SerializableColor::new(10, 20, 30, 255);
        let peniko: Color = color.into();
        assert_eq!(SerializableColor::from(peniko), color);
    }

    #[test]
    fn test_bounds_follow_transform() {
        let obj = rect_object(Point::new(10.0, 20.0));
        let bounds = obj.bounds();
        assert_eq!(bounds, Rect::new(10.0, 20.0, 90.0, 100.0));
    }

    #[test]
    fn test_hit_test_scaled_object() {
        let mut obj = rect_object(Point::new(0.0, 0.0));
        obj.transform = obj.transform.with_scale(2.0);
        // Right edge is at x = 160 once scaled
        assert!(obj.hit_test(Point::new(160.0, 50.0), 2.0));
        assert!(!obj.hit_test(Point::new(100.0, 80.0), 2.0));
    }

    #[test]
    fn test_hit_test_degenerate_scale() {
        let mut obj = rect_object(Point::ZERO);
        obj.transform.scale_x = 0.0;
        assert!(!obj.hit_test(Point::ZERO, 4.0));
    }

    #[test]
    fn test_apply_patch() {
        let mut obj = rect_object(Point::ZERO);
        assert!(obj.apply_patch(&ObjectPatch::moved_to(Point::new(5.0, 6.0))));
        assert_eq!(obj.transform.origin(), Point::new(5.0, 6.0));
        assert!(!obj.apply_patch(&ObjectPatch::moved_to(Point::new(5.0, 6.0))));
    }

    #[test]
    fn test_patch_respects_editable_flag() {
        let mut text = TextBlock::new("fixed", "Inter, serif", SerializableColor::black(), 24.0);
        text.editable = false;
        let mut obj = DrawableObject::new(Transform::default(), DrawableKind::Text(text));
        assert!(!obj.apply_patch(&ObjectPatch::text("changed")));
    }

    #[test]
    fn test_non_finite_patch_is_ignored() {
        let mut obj = rect_object(Point::new(1.0, 2.0));
        let patch = ObjectPatch {
            scale_x: Some(f64::INFINITY),
            ..ObjectPatch::moved_to(Point::new(5.0, 5.0))
        };
        assert!(!patch.is_finite());
        assert!(!obj.apply_patch(&patch));
        assert_eq!(obj.transform.left, 1.0);
        assert!(ObjectPatch::moved_to(Point::new(5.0, 5.0)).is_finite());
    }

    #[test]
    fn test_object_json_shape() {
        let obj = rect_object(Point::new(1.0, 2.0));
        let value = serde_json::to_value(&obj).unwrap();
        assert_eq!(value["kind"]["type"], "shape");
        assert_eq!(value["transform"]["left"], 1.0);
        assert_eq!(value["flags"]["evented"], true);
    }

    #[test]
    fn test_polyline_distance() {
        let points = [Point::new(0.0, 0.0), Point::new(10.0, 0.0)];
        assert!((point_to_polyline_dist(Point::new(5.0, 3.0), &points) - 3.0).abs() < 1e-9);
        assert_eq!(point_to_polyline_dist(Point::ZERO, &[]), f64::INFINITY);
    }
}
