//! Headless software renderer.
//!
//! Rasterizes a page into an RGBA buffer using each object's own hit test,
//! which is enough for previews, exports and tests without a GPU.

use kurbo::{Point, Size, Vec2};
use leafink_core::renderer::{ExportFormat, ExportOptions, RenderResult, Renderer, RendererError};
use leafink_core::scene::SceneModel;
use leafink_core::shapes::{DrawableKind, ObjectId, SerializableColor};
use leafink_core::tools::{DrawingImplement, InteractionMode};
use image::ImageEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::webp::WebPEncoder;
use peniko::Color;

/// Largest frame `rasterize` will allocate (8192 x 8192).
pub const MAX_PIXELS: f64 = 67_108_864.0;

/// Paper color used when the page has no background.
fn paper() -> Color {
    Color::from_rgba8(250, 250, 250, 255)
}

/// An RGBA8 image, row-major, not premultiplied.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl Frame {
    fn filled(width: u32, height: u32, color: SerializableColor) -> Self {
        let pixels = [color.r, color.g, color.b, color.a].repeat(width as usize * height as usize);
        Self { width, height, pixels }
    }

    /// Color of one pixel.
    pub fn pixel(&self, x: u32, y: u32) -> Option<SerializableColor> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = ((y * self.width + x) * 4) as usize;
        let p = &self.pixels[i..i + 4];
        Some(SerializableColor::new(p[0], p[1], p[2], p[3]))
    }

    fn set(&mut self, x: u32, y: u32, color: SerializableColor) {
        let i = ((y * self.width + x) * 4) as usize;
        self.pixels[i..i + 4].copy_from_slice(&[color.r, color.g, color.b, color.a]);
    }

    /// Source-over blend.
    fn blend(&mut self, x: u32, y: u32, color: SerializableColor) {
        let i = ((y * self.width + x) * 4) as usize;
        let src_a = color.a as f64 / 255.0;
        let dst_a = self.pixels[i + 3] as f64 / 255.0;
        let out_a = src_a + dst_a * (1.0 - src_a);
        if out_a <= 0.0 {
            return;
        }
        for (c, src) in [color.r, color.g, color.b].into_iter().enumerate() {
            let dst = self.pixels[i + c] as f64;
            let mixed = (src as f64 * src_a + dst * dst_a * (1.0 - src_a)) / out_a;
            self.pixels[i + c] = mixed.round().clamp(0.0, 255.0) as u8;
        }
        self.pixels[i + 3] = (out_a * 255.0).round() as u8;
    }
}

/// Paint used for an object kind.
fn paint(kind: &DrawableKind) -> SerializableColor {
    match kind {
        DrawableKind::Stroke(stroke) => stroke.color,
        DrawableKind::Shape(outline) => outline.fill.unwrap_or(outline.stroke_color),
        // Glyph boxes stand in for text and emoji
        DrawableKind::Text(text) => SerializableColor {
            a: text.color.a / 3,
            ..text.color
        },
        DrawableKind::Sticker(_) => SerializableColor::new(250, 204, 21, 255),
        DrawableKind::Image(_) => SerializableColor::new(160, 160, 160, 255),
    }
}

/// Rasterize a scene at `multiplier` pixels per page unit.
pub fn rasterize(scene: &SceneModel, size: Size, multiplier: f64) -> RenderResult<Frame> {
    let width = (size.width * multiplier).round();
    let height = (size.height * multiplier).round();
    if !(width.is_finite() && height.is_finite() && width >= 1.0 && height >= 1.0) {
        return Err(RendererError::ExportFailed(format!(
            "invalid output size {width}x{height}"
        )));
    }
    if width * height > MAX_PIXELS {
        return Err(RendererError::ExportFailed(format!(
            "output size {width}x{height} exceeds {MAX_PIXELS} pixels"
        )));
    }
    let background = scene
        .background()
        .unwrap_or_else(|| SerializableColor::from(paper()));
    let mut frame = Frame::filled(width as u32, height as u32, background);

    for object in scene.objects() {
        let bounds = object.bounds();
        let x0 = (bounds.x0 * multiplier).floor().max(0.0) as u32;
        let y0 = (bounds.y0 * multiplier).floor().max(0.0) as u32;
        let x1 = (bounds.x1 * multiplier).ceil().min(width) as u32;
        let y1 = (bounds.y1 * multiplier).ceil().min(height) as u32;
        let color = paint(&object.kind);
        let erase = matches!(&object.kind, DrawableKind::Stroke(s) if s.is_eraser());
        for py in y0..y1 {
            for px in x0..x1 {
                let point = Point::new(
                    (px as f64 + 0.5) / multiplier,
                    (py as f64 + 0.5) / multiplier,
                );
                if !object.hit_test(point, 0.0) {
                    continue;
                }
                if erase {
                    frame.set(px, py, background);
                } else {
                    frame.blend(px, py, color);
                }
            }
        }
    }
    Ok(frame)
}

/// Encode RGBA pixel data as PNG.
pub fn encode_png(frame: &Frame) -> RenderResult<Vec<u8>> {
    let mut png_data = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut png_data, frame.width, frame.height);
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);

        let mut writer = encoder
            .write_header()
            .map_err(|e| RendererError::ExportFailed(format!("PNG header: {e}")))?;
        writer
            .write_image_data(&frame.pixels)
            .map_err(|e| RendererError::ExportFailed(format!("PNG data: {e}")))?;
    }
    Ok(png_data)
}

/// Encode a frame in the requested bitmap format.
///
/// PNG goes through the `png` encoder. JPEG drops the alpha channel and
/// WebP is written lossless.
pub fn encode(frame: &Frame, options: &ExportOptions) -> RenderResult<Vec<u8>> {
    let mut data = Vec::new();
    let result = match options.format {
        ExportFormat::Png => return encode_png(frame),
        ExportFormat::Jpeg => {
            let rgb: Vec<u8> = frame
                .pixels
                .chunks_exact(4)
                .flat_map(|p| [p[0], p[1], p[2]])
                .collect();
            let quality = (options.quality.clamp(0.0, 1.0) * 100.0).round().max(1.0) as u8;
            JpegEncoder::new_with_quality(&mut data, quality).write_image(
                &rgb,
                frame.width,
                frame.height,
                image::ExtendedColorType::Rgb8,
            )
        }
        ExportFormat::Webp => WebPEncoder::new_lossless(&mut data).write_image(
            &frame.pixels,
            frame.width,
            frame.height,
            image::ExtendedColorType::Rgba8,
        ),
    };
    result.map_err(|e| {
        RendererError::ExportFailed(format!("{} encoding: {e}", options.format.extension()))
    })?;
    Ok(data)
}

/// Renderer keeping the last rendered frame in memory.
#[derive(Debug, Default)]
pub struct RasterRenderer {
    size: Size,
    /// Position of the page inside the host window.
    offset: Vec2,
    frame: Option<Frame>,
    frames: usize,
    mode: InteractionMode,
    implement: Option<DrawingImplement>,
    editing: Option<ObjectId>,
}

impl RasterRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place the page at `offset` in host coordinates.
    pub fn with_offset(mut self, offset: Vec2) -> Self {
        self.offset = offset;
        self
    }

    /// The last rendered frame.
    pub fn frame(&self) -> Option<&Frame> {
        self.frame.as_ref()
    }

    /// Number of completed render passes.
    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn mode(&self) -> InteractionMode {
        self.mode
    }

    pub fn implement(&self) -> Option<DrawingImplement> {
        self.implement
    }

    pub fn editing(&self) -> Option<ObjectId> {
        self.editing
    }
}

impl Renderer for RasterRenderer {
    fn initialize(&mut self, size: Size) -> RenderResult<()> {
        if !(size.width > 0.0 && size.height > 0.0 && size.is_finite()) {
            return Err(RendererError::InitFailed(format!(
                "invalid page size {}x{}",
                size.width, size.height
            )));
        }
        self.size = size;
        log::debug!("Raster surface {}x{}", size.width, size.height);
        Ok(())
    }

    fn set_interaction(&mut self, mode: InteractionMode) {
        self.mode = mode;
    }

    fn set_implement(&mut self, implement: &DrawingImplement) {
        self.implement = Some(*implement);
    }

    fn to_local(&self, point: Point) -> Point {
        point - self.offset
    }

    fn render(&mut self, scene: &SceneModel) {
        match rasterize(scene, self.size, 1.0) {
            Ok(frame) => {
                self.frame = Some(frame);
                self.frames += 1;
            }
            Err(e) => log::error!("Render failed: {e}"),
        }
    }

    fn begin_text_editing(&mut self, id: ObjectId) {
        self.editing = Some(id);
    }

    fn export_bitmap(&mut self, scene: &SceneModel, options: &ExportOptions) -> RenderResult<Vec<u8>> {
        encode(&rasterize(scene, self.size, options.multiplier)?, options)
    }
}
