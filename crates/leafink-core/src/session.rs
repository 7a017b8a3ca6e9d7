//! One page's editing session.
//!
//! A [`PageSession`] owns the scene, history, tool controller, sync engine,
//! update flag and renderer of a single page. Hosts feed it input and call
//! [`PageSession::poll`] from their event loop; everything that fails is
//! logged and contained so the page stays usable.

use crate::config::EditorConfig;
use crate::history::HistoryStack;
use crate::input::{Key, KeyEvent, PointerEvent};
use crate::renderer::{ExportOptions, Renderer};
use crate::scene::{RemoteUpdateFlag, SceneModel};
use crate::shapes::{
    DrawableKind, DrawableObject, ImageRef, ObjectId, ObjectPatch, SerializableColor, Transform,
};
use crate::snapshot::SceneSnapshot;
use crate::store::{DocumentKey, DocumentStore};
use crate::sync::SyncEngine;
use crate::tools::{InteractionMode, Tool, ToolAction, ToolController, ToolKind, ToolResponse};
use chrono::Utc;
use kurbo::Point;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Instant;

/// Identifies an outstanding file request made by the image tool.
pub type ImageRequestId = u64;

/// Notifications for the downstream UI.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The active tool changed (including automatic reverts to select).
    ToolChanged(ToolKind),
    /// The host should prompt for an image file and answer with
    /// [`PageSession::complete_image`] or [`PageSession::cancel_image`].
    ImageRequested(ImageRequestId),
    /// An exported bitmap ready to be saved.
    Download { file_name: String, bytes: Vec<u8> },
}

/// Editing session for one page.
pub struct PageSession {
    key: DocumentKey,
    config: EditorConfig,
    flag: RemoteUpdateFlag,
    scene: SceneModel,
    history: HistoryStack,
    tools: ToolController,
    sync: SyncEngine,
    renderer: Box<dyn Renderer>,
    functional: bool,
    active: bool,
    selection: Vec<ObjectId>,
    editing: Option<ObjectId>,
    image_requests: HashMap<ImageRequestId, Point>,
    next_request: ImageRequestId,
    /// State restored by the last undo, published once its window closes.
    undo_publish: Option<SceneSnapshot>,
    events: Vec<SessionEvent>,
}

impl PageSession {
    /// Start a session. Without a store the page is edited locally only.
    ///
    /// If the renderer cannot be initialized the session is created inert:
    /// it ignores all input and never touches the store.
    pub fn new(
        key: DocumentKey,
        config: EditorConfig,
        mut renderer: Box<dyn Renderer>,
        store: Option<Rc<dyn DocumentStore>>,
    ) -> Self {
        let flag = RemoteUpdateFlag::new();
        let functional = match renderer.initialize(config.page_size()) {
            Ok(()) => true,
            Err(e) => {
                log::error!("Page {key} is not editable: {e}");
                false
            }
        };
        let mut sync = SyncEngine::new(key.clone(), store, flag.clone(), config.remote_grace());
        let scene = SceneModel::new(flag.clone());
        if functional {
            renderer.set_interaction(InteractionMode::Select);
            sync.subscribe_remote();
            renderer.render(&scene);
        }
        Self {
            history: HistoryStack::with_capacity(config.history_capacity),
            tools: ToolController::new(config.clone()),
            key,
            config,
            flag,
            scene,
            sync,
            renderer,
            functional,
            active: true,
            selection: Vec::new(),
            editing: None,
            image_requests: HashMap::new(),
            next_request: 0,
            undo_publish: None,
            events: Vec::new(),
        }
    }

    pub fn key(&self) -> &DocumentKey {
        &self.key
    }

    pub fn scene(&self) -> &SceneModel {
        &self.scene
    }

    pub fn history(&self) -> &HistoryStack {
        &self.history
    }

    pub fn sync(&self) -> &SyncEngine {
        &self.sync
    }

    pub fn flag(&self) -> &RemoteUpdateFlag {
        &self.flag
    }

    pub fn tool(&self) -> ToolKind {
        self.tools.current()
    }

    pub fn mode(&self) -> InteractionMode {
        self.tools.mode()
    }

    pub fn selection(&self) -> &[ObjectId] {
        &self.selection
    }

    /// Text object currently in edit mode.
    pub fn editing(&self) -> Option<ObjectId> {
        self.editing
    }

    /// False when the renderer failed to initialize.
    pub fn is_functional(&self) -> bool {
        self.functional
    }

    /// Whether this page is the one on screen.
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    /// Select a tool. One-shot tools act immediately if the page is active.
    pub fn select_tool(&mut self, tool: Tool, now: Instant) {
        if !self.functional {
            return;
        }
        let response = self.tools.select(tool, self.active, now);
        self.handle(response, now);
    }

    /// Change brush color and width.
    pub fn set_brush(&mut self, color: SerializableColor, width: f64) {
        if !self.functional {
            return;
        }
        if let Some(implement) = self.tools.set_brush(color, width).implement {
            self.renderer.set_implement(&implement);
        }
    }

    /// Feed a pointer event in host coordinates.
    pub fn pointer(&mut self, event: PointerEvent, now: Instant) {
        if !self.functional || !event.is_primary() {
            return;
        }
        let pos = self.renderer.to_local(event.position());
        let response = match event {
            PointerEvent::Down { .. } => match self.tools.mode() {
                InteractionMode::Place => {
                    let target = self.renderer.hit_test(&self.scene, pos, self.config.hit_tolerance);
                    self.tools.pointer_down(pos, target, self.active)
                }
                InteractionMode::Select => {
                    let target = self.renderer.hit_test(&self.scene, pos, self.config.hit_tolerance);
                    self.set_selection(target.into_iter().collect());
                    return;
                }
                _ => self.tools.pointer_down(pos, None, self.active),
            },
            PointerEvent::Move { .. } => {
                self.tools.pointer_move(pos);
                return;
            }
            PointerEvent::Up { .. } => self.tools.pointer_up(pos),
        };
        self.handle(response, now);
    }

    /// Handle a key press. Returns whether the key was used.
    ///
    /// Keys typed into a text object or a form field are left alone.
    pub fn key_pressed(&mut self, event: &KeyEvent) -> bool {
        if !self.functional || event.in_text_field || self.editing.is_some() {
            return false;
        }
        match &event.key {
            key if key.is_delete() => {
                if self.selection.is_empty() {
                    return false;
                }
                let ids = std::mem::take(&mut self.selection);
                if self.scene.remove_objects(&ids) > 0 {
                    self.renderer.render(&self.scene);
                }
                self.drain_commits();
                true
            }
            Key::Escape => {
                self.tools.cancel();
                self.selection.clear();
                true
            }
            _ => false,
        }
    }

    /// Replace the selection. Unknown and non-selectable ids are dropped.
    pub fn set_selection(&mut self, ids: Vec<ObjectId>) {
        self.selection = ids
            .into_iter()
            .filter(|id| self.scene.get(*id).is_some_and(|o| o.flags.selectable))
            .collect();
    }

    /// Record a change the host made to an object (drag, resize, typing).
    pub fn object_modified(&mut self, id: ObjectId, patch: &ObjectPatch) {
        if !self.functional || patch.is_empty() {
            return;
        }
        match self.scene.modify_object(id, patch) {
            Ok(true) => {
                self.renderer.render(&self.scene);
                self.drain_commits();
            }
            Ok(false) => {}
            Err(e) => log::warn!("Ignoring edit on {}: {e}", self.key),
        }
    }

    /// Leave text edit mode.
    pub fn end_text_editing(&mut self) {
        self.editing = None;
    }

    /// Answer an image request with file bytes. Returns whether an image was
    /// placed; undecodable files abandon the request.
    pub fn complete_image(&mut self, request: ImageRequestId, bytes: &[u8]) -> bool {
        let Some(pos) = self.image_requests.remove(&request) else {
            log::debug!("Unknown image request {request}");
            return false;
        };
        self.place_image(pos, bytes)
    }

    /// The host dismissed the file prompt.
    pub fn cancel_image(&mut self, request: ImageRequestId) {
        self.image_requests.remove(&request);
    }

    /// Image files dropped onto the page land in its middle.
    pub fn drop_image(&mut self, bytes: &[u8]) -> bool {
        let half = self.config.image_target_width / 2.0;
        let pos = Point::new(
            self.config.page_width / 2.0 - half,
            self.config.page_height / 2.0 - half,
        );
        self.place_image(pos, bytes)
    }

    /// Image requests waiting for a file.
    pub fn pending_images(&self) -> usize {
        self.image_requests.len()
    }

    /// Advance timers and apply remote changes.
    pub fn poll(&mut self, now: Instant) {
        if !self.functional {
            return;
        }
        if self.flag.poll(now) {
            if let Some(restored) = self.undo_publish.take() {
                if restored == self.scene.serialize() {
                    self.sync.publish(&restored);
                }
            }
        }
        if self.sync.apply_remote(&mut self.scene, &mut *self.renderer, now) {
            self.prune_selection();
        }
        let response = self.tools.poll(now);
        self.handle(response, now);
    }

    /// Drain pending UI notifications.
    pub fn take_events(&mut self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.events)
    }

    fn handle(&mut self, response: ToolResponse, now: Instant) {
        if let Some(transition) = response.transition {
            self.renderer.set_interaction(transition.mode);
            self.events.push(SessionEvent::ToolChanged(transition.tool));
        }
        if let Some(implement) = response.implement {
            self.renderer.set_implement(&implement);
        }
        if let Some(action) = response.action {
            self.perform(action, now);
        }
        self.drain_commits();
    }

    fn perform(&mut self, action: ToolAction, now: Instant) {
        match action {
            ToolAction::Draw(object) | ToolAction::Stamp(object) => {
                if self.insert(object) {
                    self.renderer.render(&self.scene);
                }
            }
            ToolAction::Place(object) => {
                let id = object.id;
                let is_text = matches!(object.kind, DrawableKind::Text(_));
                if self.insert(object) {
                    self.selection = vec![id];
                    self.renderer.render(&self.scene);
                    if is_text {
                        self.editing = Some(id);
                        self.renderer.begin_text_editing(id);
                    }
                }
            }
            ToolAction::RequestImage(pos) => {
                let request = self.next_request;
                self.next_request += 1;
                self.image_requests.insert(request, pos);
                self.events.push(SessionEvent::ImageRequested(request));
            }
            ToolAction::Clear => {
                self.scene.clear();
                self.selection.clear();
                self.editing = None;
                self.renderer.render(&self.scene);
            }
            ToolAction::Undo => self.undo(now),
            ToolAction::Export(options) => self.export(&options),
        }
    }

    fn insert(&mut self, object: DrawableObject) -> bool {
        let kind = object.kind.name();
        match self.scene.add_object(object) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Could not add {kind} to {}: {e}", self.key);
                false
            }
        }
    }

    /// Restore the previous history entry with mutation hooks suppressed.
    fn undo(&mut self, now: Instant) {
        let Some(restored) = self.history.undo() else {
            log::debug!("Nothing to undo on {}", self.key);
            return;
        };
        self.flag.raise();
        match self.scene.restore(&restored) {
            Ok(()) => {
                self.renderer.render(&self.scene);
                self.prune_selection();
                self.undo_publish = Some(self.scene.serialize());
            }
            Err(e) => log::warn!("Undo on {} failed: {e}", self.key),
        }
        self.flag.release_after(now, self.config.undo_grace());
    }

    fn export(&mut self, options: &ExportOptions) {
        match self.renderer.export_bitmap(&self.scene, options) {
            Ok(bytes) => {
                let file_name = format!(
                    "journal-{}-{}.{}",
                    self.key.page,
                    Utc::now().timestamp_millis(),
                    options.format.extension()
                );
                log::info!("Exported {} ({} bytes)", file_name, bytes.len());
                self.events.push(SessionEvent::Download { file_name, bytes });
            }
            Err(e) => log::error!("Export of {} failed: {e}", self.key),
        }
    }

    fn place_image(&mut self, pos: Point, bytes: &[u8]) -> bool {
        if !self.functional {
            return false;
        }
        let image = match ImageRef::decode(bytes) {
            Ok(image) => image,
            Err(e) => {
                log::warn!("Image placement on {} abandoned: {e}", self.key);
                return false;
            }
        };
        let scale = image.scale_to_width(self.config.image_target_width);
        let object = DrawableObject::new(Transform::at(pos).with_scale(scale), DrawableKind::Image(image));
        let id = object.id;
        if !self.insert(object) {
            return false;
        }
        self.selection = vec![id];
        self.renderer.render(&self.scene);
        self.drain_commits();
        true
    }

    /// Forget selected or edited objects that no longer exist.
    fn prune_selection(&mut self) {
        let scene = &self.scene;
        self.selection.retain(|id| scene.contains(*id));
        if self.editing.is_some_and(|id| !scene.contains(id)) {
            self.editing = None;
        }
    }

    /// Each commit is recorded in history, then published.
    fn drain_commits(&mut self) {
        for snapshot in self.scene.take_commits() {
            self.history.push(snapshot.clone());
            self.sync.publish(&snapshot);
        }
    }
}

impl std::fmt::Debug for PageSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageSession")
            .field("key", &self.key)
            .field("tool", &self.tools.current())
            .field("objects", &self.scene.len())
            .field("history", &self.history.len())
            .field("functional", &self.functional)
            .field("active", &self.active)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{FieldValue, Fields, MemoryDocumentStore};
    use crate::sync::{CANVAS_FIELD, encode_snapshot};
    use crate::testing::{RecordingRenderer, RenderLog, tiny_png};
    use std::cell::RefCell;
    use std::time::Duration;

    fn key() -> DocumentKey {
        DocumentKey::new("books", "b1", "p1")
    }

    fn session_on(store: &MemoryDocumentStore) -> (PageSession, Rc<RefCell<RenderLog>>) {
        let renderer = RecordingRenderer::new();
        let log = renderer.log();
        let store: Rc<dyn DocumentStore> = Rc::new(store.clone());
        let session = PageSession::new(key(), EditorConfig::default(), Box::new(renderer), Some(store));
        (session, log)
    }

    fn draw(session: &mut PageSession, from: (f64, f64), to: (f64, f64), now: Instant) {
        session.pointer(PointerEvent::down(from.0, from.1), now);
        session.pointer(
            PointerEvent::moved((from.0 + to.0) / 2.0, (from.1 + to.1) / 2.0),
            now,
        );
        session.pointer(PointerEvent::up(to.0, to.1), now);
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_starts_in_select_and_subscribes() {
        let store = MemoryDocumentStore::new();
        let (session, log) = session_on(&store);
        assert!(session.is_functional());
        assert!(session.sync().is_subscribed());
        assert_eq!(session.tool(), ToolKind::Select);
        assert_eq!(log.borrow().modes, vec![InteractionMode::Select]);
        assert_eq!(log.borrow().renders, 1);
        assert_eq!(log.borrow().size, Some(kurbo::Size::new(450.0, 650.0)));
        assert_eq!(store.listener_count(&key()), 1);
    }

    #[test]
    fn test_brush_stroke_publishes_once() {
        let store = MemoryDocumentStore::new();
        let (mut session, log) = session_on(&store);
        let now = Instant::now();
        session.select_tool(Tool::Brush, now);
        assert_eq!(log.borrow().implements.len(), 1);

        draw(&mut session, (10.0, 10.0), (80.0, 60.0), now);
        assert_eq!(session.scene().len(), 1);
        assert!(matches!(session.scene().objects()[0].kind, DrawableKind::Stroke(_)));
        assert!(!session.history().is_empty());
        assert_eq!(store.write_count(), 1);

        // The echo of our own write changes nothing
        let renders = log.borrow().renders;
        session.poll(now + ms(10));
        assert_eq!(log.borrow().renders, renders);
        assert!(!session.flag().is_set());
        assert_eq!(store.write_count(), 1);
    }

    #[test]
    fn test_late_own_echo_keeps_newer_strokes() {
        let store = MemoryDocumentStore::deferred();
        let (mut session, _) = session_on(&store);
        let now = Instant::now();
        session.select_tool(Tool::Brush, now);
        draw(&mut session, (10.0, 10.0), (80.0, 60.0), now);
        store.flush();
        draw(&mut session, (20.0, 30.0), (90.0, 10.0), now);

        // The first stroke's echo arrives after the second stroke
        session.poll(now + ms(5));
        assert_eq!(session.scene().len(), 2);
        assert!(!session.flag().is_set());

        draw(&mut session, (30.0, 50.0), (70.0, 90.0), now + ms(10));
        store.flush();
        session.poll(now + ms(600));
        assert_eq!(session.scene().len(), 3);
        assert_eq!(store.write_count(), 3);
        let stored = store.document(&key()).unwrap();
        assert_eq!(
            stored[CANVAS_FIELD].as_str(),
            Some(session.scene().serialize().canonical().as_str())
        );
    }

    #[test]
    fn test_nothing_published_while_flag_set() {
        let store = MemoryDocumentStore::new();
        let (mut session, _) = session_on(&store);
        let now = Instant::now();
        session.select_tool(Tool::Brush, now);
        session.flag().raise();
        draw(&mut session, (10.0, 10.0), (80.0, 60.0), now);

        assert_eq!(session.scene().len(), 1);
        assert!(session.history().is_empty());
        assert_eq!(store.write_count(), 0);
    }

    #[test]
    fn test_undo_until_empty() {
        let store = MemoryDocumentStore::new();
        let (mut session, _) = session_on(&store);
        let mut now = Instant::now();
        session.select_tool(Tool::Brush, now);
        draw(&mut session, (10.0, 10.0), (80.0, 60.0), now);
        draw(&mut session, (20.0, 30.0), (90.0, 10.0), now);
        session.select_tool(Tool::sticker("🌸"), now);
        let first = session.scene().objects()[0].id;
        session.object_modified(first, &ObjectPatch::moved_to(Point::new(5.0, 5.0)));
        assert_eq!(session.scene().len(), 3);
        assert_eq!(session.history().len(), 4);

        while !session.history().is_empty() {
            session.select_tool(Tool::Undo, now);
            now += ms(300);
            session.poll(now);
        }
        assert_eq!(session.scene().serialize(), SceneSnapshot::new(Vec::new(), None));
        assert_eq!(session.tool(), ToolKind::Select);

        // Undo on an empty stack changes nothing
        session.select_tool(Tool::Undo, now);
        assert!(session.scene().is_empty());
    }

    #[test]
    fn test_undo_is_not_recorded_and_publishes_after_window() {
        let store = MemoryDocumentStore::new();
        let (mut session, log) = session_on(&store);
        let now = Instant::now();
        session.select_tool(Tool::Brush, now);
        draw(&mut session, (10.0, 10.0), (80.0, 60.0), now);
        draw(&mut session, (20.0, 30.0), (90.0, 10.0), now);
        session.poll(now);
        assert_eq!(store.write_count(), 2);

        let renders = log.borrow().renders;
        session.select_tool(Tool::Undo, now);
        assert_eq!(session.scene().len(), 1);
        assert_eq!(session.history().len(), 1);
        assert_eq!(log.borrow().renders, renders + 1);
        assert!(session.flag().is_set());
        assert_eq!(store.write_count(), 2);

        session.poll(now + ms(100));
        assert!(!session.flag().is_set());
        assert_eq!(store.write_count(), 3);
        let stored = store.document(&key()).unwrap();
        assert_eq!(
            stored[CANVAS_FIELD].as_str(),
            Some(session.scene().serialize().canonical().as_str())
        );
        assert_eq!(session.history().len(), 1);
    }

    #[test]
    fn test_placement_swallowed_by_existing_object() {
        let store = MemoryDocumentStore::new();
        let (mut session, _) = session_on(&store);
        let now = Instant::now();
        session.select_tool(Tool::ShapeRect, now);
        session.pointer(PointerEvent::down(100.0, 100.0), now);
        session.pointer(PointerEvent::up(100.0, 100.0), now);
        assert_eq!(session.scene().len(), 1);
        assert_eq!(session.tool(), ToolKind::Select);
        session.take_events();

        // The rectangle spans 60..140; its left edge is under the pointer
        session.select_tool(Tool::ShapeCircle, now);
        session.pointer(PointerEvent::down(61.0, 100.0), now);
        assert_eq!(session.scene().len(), 1);
        assert_eq!(session.tool(), ToolKind::ShapeCircle);

        session.pointer(PointerEvent::down(300.0, 400.0), now);
        assert_eq!(session.scene().len(), 2);
        assert_eq!(session.tool(), ToolKind::Select);
        assert_eq!(
            session.take_events(),
            vec![
                SessionEvent::ToolChanged(ToolKind::ShapeCircle),
                SessionEvent::ToolChanged(ToolKind::Select),
            ]
        );
        // The new circle is selected
        let circle = session.scene().objects()[1].id;
        assert_eq!(session.selection(), &[circle]);
    }

    #[test]
    fn test_every_placement_tool_ignores_clicks_on_objects() {
        let store = MemoryDocumentStore::new();
        let (mut session, _) = session_on(&store);
        let now = Instant::now();
        session.select_tool(Tool::ShapeRect, now);
        session.pointer(PointerEvent::down(100.0, 100.0), now);
        assert_eq!(session.scene().len(), 1);

        for (tool, kind) in [
            (Tool::Text, ToolKind::Text),
            (Tool::ShapeRect, ToolKind::ShapeRect),
            (Tool::Image, ToolKind::Image),
        ] {
            session.select_tool(tool, now);
            session.take_events();
            session.pointer(PointerEvent::down(61.0, 100.0), now);
            session.pointer(PointerEvent::up(61.0, 100.0), now);
            assert_eq!(session.scene().len(), 1, "{kind}");
            assert_eq!(session.tool(), kind);
            assert!(session.take_events().is_empty(), "{kind}");
        }
        assert_eq!(session.pending_images(), 0);
        assert_eq!(session.editing(), None);
        assert_eq!(store.write_count(), 1);
    }

    #[test]
    fn test_text_placement_enters_edit_mode() {
        let store = MemoryDocumentStore::new();
        let (mut session, log) = session_on(&store);
        let now = Instant::now();
        session.select_tool(Tool::Text, now);
        session.pointer(PointerEvent::down(40.0, 50.0), now);
        let id = session.scene().objects()[0].id;
        assert_eq!(session.editing(), Some(id));
        assert_eq!(log.borrow().editing, vec![id]);

        // Keys go to the text object, not the page
        assert!(!session.key_pressed(&KeyEvent::pressed(Key::Backspace)));
        assert_eq!(session.scene().len(), 1);

        session.object_modified(id, &ObjectPatch::text("Dear diary"));
        session.end_text_editing();
        match &session.scene().objects()[0].kind {
            DrawableKind::Text(text) => assert_eq!(text.content, "Dear diary"),
            other => panic!("unexpected kind {other:?}"),
        }
        assert_eq!(store.write_count(), 2);
    }

    #[test]
    fn test_non_finite_edit_is_not_published() {
        let store = MemoryDocumentStore::new();
        let (mut session, _) = session_on(&store);
        let now = Instant::now();
        session.select_tool(Tool::sticker("🌼"), now);
        let id = session.scene().objects()[0].id;
        let before = session.scene().serialize();
        let writes = store.write_count();

        session.object_modified(id, &ObjectPatch::moved_to(Point::new(f64::NAN, 3.0)));
        assert_eq!(session.scene().serialize(), before);
        assert_eq!(store.write_count(), writes);
        assert_eq!(session.history().len(), 1);
    }

    #[test]
    fn test_delete_removes_selection() {
        let store = MemoryDocumentStore::new();
        let (mut session, _) = session_on(&store);
        let now = Instant::now();
        session.select_tool(Tool::Brush, now);
        draw(&mut session, (10.0, 10.0), (80.0, 60.0), now);
        draw(&mut session, (200.0, 200.0), (260.0, 260.0), now);
        let ids: Vec<_> = session.scene().objects().iter().map(|o| o.id).collect();
        let writes = store.write_count();

        session.set_selection(ids.clone());
        assert!(session.key_pressed(&KeyEvent::pressed(Key::Delete)));
        assert!(session.scene().is_empty());
        assert!(session.selection().is_empty());
        assert_eq!(store.write_count(), writes + 1);

        // Focus in a form field leaves the page alone
        assert!(!session.key_pressed(&KeyEvent {
            key: Key::Delete,
            in_text_field: true,
        }));
    }

    #[test]
    fn test_select_click_picks_object() {
        let store = MemoryDocumentStore::new();
        let (mut session, _) = session_on(&store);
        let now = Instant::now();
        session.select_tool(Tool::ShapeRect, now);
        session.pointer(PointerEvent::down(100.0, 100.0), now);
        session.set_selection(Vec::new());

        session.pointer(PointerEvent::down(140.0, 120.0), now);
        assert_eq!(session.selection().len(), 1);
        session.pointer(PointerEvent::down(400.0, 600.0), now);
        assert!(session.selection().is_empty());
    }

    #[test]
    fn test_clear_on_inactive_page_is_noop() {
        let store = MemoryDocumentStore::new();
        let (mut session, _) = session_on(&store);
        let now = Instant::now();
        session.select_tool(Tool::Brush, now);
        draw(&mut session, (10.0, 10.0), (80.0, 60.0), now);
        draw(&mut session, (20.0, 30.0), (90.0, 10.0), now);
        draw(&mut session, (40.0, 40.0), (50.0, 90.0), now);
        let writes = store.write_count();

        session.set_active(false);
        session.select_tool(Tool::Clear, now);
        assert_eq!(session.scene().len(), 3);
        assert_eq!(store.write_count(), writes);
        assert_eq!(session.tool(), ToolKind::Clear);
        session.poll(now + ms(200));
        assert_eq!(session.tool(), ToolKind::Select);

        session.set_active(true);
        session.select_tool(Tool::Clear, now + ms(300));
        assert!(session.scene().is_empty());
        assert_eq!(store.write_count(), writes + 1);
    }

    #[test]
    fn test_remote_snapshot_replaces_scene_without_publish() {
        let store = MemoryDocumentStore::new();
        let (mut session, log) = session_on(&store);
        let now = Instant::now();
        session.select_tool(Tool::Brush, now);
        for i in 0..5 {
            let x = i as f64 * 20.0;
            draw(&mut session, (x, 10.0), (x + 15.0, 60.0), now);
        }
        session.poll(now);

        let config = EditorConfig::default();
        let remote: Vec<_> = (0..5)
            .map(|i| {
                let mut tools = ToolController::new(config.clone());
                match tools.select(Tool::sticker(format!("{i}")), true, now).action {
                    Some(ToolAction::Stamp(obj)) => obj,
                    other => panic!("expected stamp, got {other:?}"),
                }
            })
            .collect();
        let remote = SceneSnapshot::new(remote, None);
        store
            .write(&key(), encode_snapshot(&remote, Utc::now()), true)
            .unwrap();
        let writes = store.write_count();
        let renders = log.borrow().renders;

        session.poll(now + ms(10));
        assert_eq!(session.scene().serialize(), remote);
        assert_eq!(log.borrow().renders, renders + 1);
        assert_eq!(log.borrow().last_render_len, Some(5));
        assert!(session.flag().is_set());

        // Local edits inside the apply window are not published either
        draw(&mut session, (300.0, 300.0), (350.0, 350.0), now + ms(20));
        assert_eq!(store.write_count(), writes);

        session.poll(now + ms(600));
        assert!(!session.flag().is_set());
        assert_eq!(store.write_count(), writes);
    }

    #[test]
    fn test_two_pages_converge() {
        let store = MemoryDocumentStore::new();
        let (mut alice, _) = session_on(&store);
        let (mut bob, bob_log) = session_on(&store);
        let now = Instant::now();

        alice.select_tool(Tool::Brush, now);
        draw(&mut alice, (10.0, 10.0), (80.0, 60.0), now);
        bob.poll(now);
        assert_eq!(bob.scene().serialize(), alice.scene().serialize());

        // Re-delivering the same state does not render again
        let renders = bob_log.borrow().renders;
        store
            .write(&key(), encode_snapshot(&bob.scene().serialize(), Utc::now()), true)
            .unwrap();
        bob.poll(now + ms(600));
        assert_eq!(bob_log.borrow().renders, renders);
    }

    #[test]
    fn test_documents_without_canvas_are_ignored() {
        let store = MemoryDocumentStore::new();
        let (mut session, log) = session_on(&store);
        let mut fields = Fields::new();
        fields.insert("title".to_string(), FieldValue::from("Summer"));
        store.write(&key(), fields, true).unwrap();
        session.poll(Instant::now());
        assert_eq!(log.borrow().renders, 1);
        assert!(!session.flag().is_set());
    }

    #[test]
    fn test_image_request_flow() {
        let store = MemoryDocumentStore::new();
        let (mut session, _) = session_on(&store);
        let now = Instant::now();
        session.select_tool(Tool::Image, now);
        session.pointer(PointerEvent::down(20.0, 30.0), now);
        let events = session.take_events();
        let request = match events.last() {
            Some(SessionEvent::ImageRequested(request)) => *request,
            other => panic!("expected image request, got {other:?}"),
        };
        assert!(session.scene().is_empty());
        assert_eq!(session.tool(), ToolKind::Select);

        assert!(session.complete_image(request, &tiny_png(300, 200)));
        let image = &session.scene().objects()[0];
        assert_eq!(image.transform.origin(), Point::new(20.0, 30.0));
        assert!((image.transform.scale_x - 0.5).abs() < 1e-12);
        assert_eq!(session.pending_images(), 0);
        assert_eq!(store.write_count(), 1);
    }

    #[test]
    fn test_bad_image_is_abandoned() {
        let store = MemoryDocumentStore::new();
        let (mut session, _) = session_on(&store);
        let now = Instant::now();
        session.select_tool(Tool::Image, now);
        session.pointer(PointerEvent::down(20.0, 30.0), now);
        assert_eq!(session.pending_images(), 1);

        assert!(!session.complete_image(0, b"not an image"));
        assert!(session.scene().is_empty());
        assert_eq!(session.pending_images(), 0);
        assert_eq!(store.write_count(), 0);

        // Answering twice does nothing
        assert!(!session.complete_image(0, &tiny_png(4, 4)));
    }

    #[test]
    fn test_dropped_image_is_centered() {
        let store = MemoryDocumentStore::new();
        let (mut session, _) = session_on(&store);
        assert!(session.drop_image(&tiny_png(300, 300)));
        let image = &session.scene().objects()[0];
        assert_eq!(image.transform.origin(), Point::new(150.0, 250.0));
        assert_eq!(session.selection(), &[image.id]);
    }

    #[test]
    fn test_download_emits_file() {
        let store = MemoryDocumentStore::new();
        let (mut session, log) = session_on(&store);
        let now = Instant::now();
        session.select_tool(Tool::Download, now);
        let download = session.take_events().into_iter().find_map(|e| match e {
            SessionEvent::Download { file_name, bytes } => Some((file_name, bytes)),
            _ => None,
        });
        let (file_name, bytes) = download.unwrap();
        assert!(file_name.starts_with("journal-p1-"));
        assert!(file_name.ends_with(".png"));
        assert_eq!(bytes, b"bitmap:0");
        assert_eq!(log.borrow().exports, vec![ExportOptions::default()]);
    }

    #[test]
    fn test_failed_export_is_contained() {
        let renderer = RecordingRenderer::failing_export();
        let mut session = PageSession::new(key(), EditorConfig::default(), Box::new(renderer), None);
        session.select_tool(Tool::Download, Instant::now());
        assert!(
            !session
                .take_events()
                .iter()
                .any(|e| matches!(e, SessionEvent::Download { .. }))
        );
    }

    #[test]
    fn test_renderer_failure_leaves_session_inert() {
        let store = MemoryDocumentStore::new();
        let renderer = RecordingRenderer::broken();
        let log = renderer.log();
        let shared: Rc<dyn DocumentStore> = Rc::new(store.clone());
        let mut session = PageSession::new(key(), EditorConfig::default(), Box::new(renderer), Some(shared));
        assert!(!session.is_functional());

        let now = Instant::now();
        session.select_tool(Tool::Brush, now);
        draw(&mut session, (10.0, 10.0), (80.0, 60.0), now);
        assert!(session.scene().is_empty());
        assert_eq!(session.tool(), ToolKind::Select);
        assert_eq!(log.borrow().renders, 0);
        assert_eq!(store.listener_count(&key()), 0);
    }

    #[test]
    fn test_local_only_session() {
        let renderer = RecordingRenderer::new();
        let mut session = PageSession::new(key(), EditorConfig::default(), Box::new(renderer), None);
        let now = Instant::now();
        session.select_tool(Tool::Brush, now);
        draw(&mut session, (10.0, 10.0), (80.0, 60.0), now);
        assert_eq!(session.scene().len(), 1);
        assert_eq!(session.history().len(), 1);
        assert!(!session.sync().is_enabled());
    }

    #[test]
    fn test_store_outage_does_not_break_editing() {
        let store = MemoryDocumentStore::new();
        store.set_available(false);
        let (mut session, _) = session_on(&store);
        assert!(!session.sync().is_enabled());
        let now = Instant::now();
        session.select_tool(Tool::Brush, now);
        draw(&mut session, (10.0, 10.0), (80.0, 60.0), now);
        assert_eq!(session.scene().len(), 1);
    }

    #[test]
    fn test_live_brush_update() {
        let store = MemoryDocumentStore::new();
        let (mut session, log) = session_on(&store);
        let now = Instant::now();
        session.select_tool(Tool::Eraser, now);
        session.set_brush(SerializableColor::black(), 5.0);
        let last = *log.borrow().implements.last().unwrap();
        assert_eq!(last.width, 15.0);
    }
}
