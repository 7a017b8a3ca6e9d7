//! Test doubles shared by unit tests.

use crate::renderer::{ExportOptions, RenderResult, Renderer, RendererError};
use crate::scene::SceneModel;
use crate::shapes::ObjectId;
use crate::tools::{DrawingImplement, InteractionMode};
use kurbo::Size;
use std::cell::RefCell;
use std::rc::Rc;

/// Everything a [`RecordingRenderer`] was asked to do.
#[derive(Debug, Default)]
pub struct RenderLog {
    pub size: Option<Size>,
    pub renders: usize,
    pub modes: Vec<InteractionMode>,
    pub implements: Vec<DrawingImplement>,
    pub editing: Vec<ObjectId>,
    pub exports: Vec<ExportOptions>,
    /// Object count seen by the last render.
    pub last_render_len: Option<usize>,
}

/// Renderer that records calls into a shared log.
#[derive(Debug, Default)]
pub struct RecordingRenderer {
    log: Rc<RefCell<RenderLog>>,
    fail_init: bool,
    fail_export: bool,
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A renderer whose initialization fails.
    pub fn broken() -> Self {
        Self {
            fail_init: true,
            ..Self::default()
        }
    }

    pub fn failing_export() -> Self {
        Self {
            fail_export: true,
            ..Self::default()
        }
    }

    /// Shared handle to the log (stays valid after the renderer is boxed).
    pub fn log(&self) -> Rc<RefCell<RenderLog>> {
        self.log.clone()
    }
}

impl Renderer for RecordingRenderer {
    fn initialize(&mut self, size: Size) -> RenderResult<()> {
        if self.fail_init {
            return Err(RendererError::InitFailed("no drawing surface".to_string()));
        }
        self.log.borrow_mut().size = Some(size);
        Ok(())
    }

    fn set_interaction(&mut self, mode: InteractionMode) {
        self.log.borrow_mut().modes.push(mode);
    }

    fn set_implement(&mut self, implement: &DrawingImplement) {
        self.log.borrow_mut().implements.push(*implement);
    }

    fn render(&mut self, scene: &SceneModel) {
        let mut log = self.log.borrow_mut();
        log.renders += 1;
        log.last_render_len = Some(scene.len());
    }

    fn begin_text_editing(&mut self, id: ObjectId) {
        self.log.borrow_mut().editing.push(id);
    }

    fn export_bitmap(&mut self, scene: &SceneModel, options: &ExportOptions) -> RenderResult<Vec<u8>> {
        if self.fail_export {
            return Err(RendererError::ExportFailed("encoder unavailable".to_string()));
        }
        self.log.borrow_mut().exports.push(*options);
        Ok(format!("bitmap:{}", scene.len()).into_bytes())
    }
}

/// Encode a solid red PNG.
pub fn tiny_png(width: u32, height: u32) -> Vec<u8> {
    let mut bytes = std::io::Cursor::new(Vec::new());
    image::RgbaImage::from_pixel(width, height, image::Rgba([255, 0, 0, 255]))
        .write_to(&mut bytes, image::ImageFormat::Png)
        .unwrap();
    bytes.into_inner()
}
