//! Scripted two-client session.
//!
//! Two notebooks edit the same book through one in-memory store with
//! deferred delivery, the way two browsers share a page through the
//! replicated store. The script draws, undoes, erases and exports, then
//! checks that both clients ended up with the same page.

use crate::AppError;
use crate::raster::RasterRenderer;
use kurbo::{Point, Vec2};
use leafink_core::shapes::{ObjectPatch, SerializableColor};
use leafink_core::{
    DocumentStore, EditorConfig, MemoryDocumentStore, Notebook, PointerEvent, SceneSnapshot,
    SessionEvent, Tool,
};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::{Duration, Instant};

const BOOK: &str = "summer-journal";
const PAGE: &str = "p1";

/// Simulated wall clock.
struct Clock {
    now: Instant,
}

impl Clock {
    fn advance(&mut self, millis: u64) -> Instant {
        self.now += Duration::from_millis(millis);
        self.now
    }
}

/// One client's view of the demo page.
#[derive(Debug)]
pub struct PageSummary {
    pub client: &'static str,
    pub objects: Vec<&'static str>,
    pub history: usize,
}

/// Outcome of the scripted session.
#[derive(Debug)]
pub struct DemoReport {
    pub pages: Vec<PageSummary>,
    pub converged: bool,
    pub writes: usize,
    pub snapshot: SceneSnapshot,
    /// Exported files, written to the output directory if one was given.
    pub downloads: Vec<(String, usize)>,
}

fn open(name: &'static str, config: &EditorConfig, store: &MemoryDocumentStore) -> Notebook {
    let shared: Rc<dyn DocumentStore> = Rc::new(store.clone());
    let mut notebook = Notebook::new(BOOK, config.clone(), Some(shared));
    // The page sits below a toolbar in the host window
    let renderer = RasterRenderer::new().with_offset(Vec2::new(0.0, 48.0));
    notebook.open_page(PAGE, Box::new(renderer));
    notebook.set_active_page(PAGE);
    log::info!("{name} opened {BOOK}/{PAGE}");
    notebook
}

/// Drag along `points` (host coordinates) on the demo page.
fn drag(notebook: &mut Notebook, points: &[Point], now: Instant) {
    let Some(page) = notebook.page_mut(PAGE) else {
        return;
    };
    let Some((first, rest)) = points.split_first() else {
        return;
    };
    page.pointer(PointerEvent::down(first.x, first.y), now);
    for p in rest {
        page.pointer(PointerEvent::moved(p.x, p.y), now);
    }
    if let Some(last) = rest.last() {
        page.pointer(PointerEvent::up(last.x, last.y), now);
    }
}

fn click(notebook: &mut Notebook, x: f64, y: f64, now: Instant) {
    if let Some(page) = notebook.page_mut(PAGE) {
        page.pointer(PointerEvent::down(x, y), now);
        page.pointer(PointerEvent::up(x, y), now);
    }
}

/// Deliver pending store notifications and let both clients catch up.
fn sync_all(store: &MemoryDocumentStore, clients: &mut [&mut Notebook], now: Instant) {
    store.flush();
    for client in clients.iter_mut() {
        client.poll(now);
    }
}

fn wave(from: Point, length: f64) -> Vec<Point> {
    (0..=24)
        .map(|i| {
            let t = i as f64 / 24.0;
            Point::new(
                from.x + t * length,
                from.y + (t * std::f64::consts::TAU).sin() * 12.0,
            )
        })
        .collect()
}

fn summary(client: &'static str, notebook: &Notebook) -> Option<PageSummary> {
    let page = notebook.page(PAGE)?;
    Some(PageSummary {
        client,
        objects: page.scene().objects().iter().map(|o| o.kind.name()).collect(),
        history: page.history().len(),
    })
}

/// Run the script. Exports are saved under `out_dir` when given.
pub fn run(config: &EditorConfig, out_dir: Option<&Path>) -> Result<DemoReport, AppError> {
    let store = MemoryDocumentStore::deferred();
    let mut alice = open("alice", config, &store);
    let mut bob = open("bob", config, &store);
    let mut clock = Clock { now: Instant::now() };
    let mut now = clock.now;

    // Alice writes the first entry
    alice.select_tool(&Tool::Brush, now);
    alice.set_brush(SerializableColor::new(220, 38, 38, 255), 4.0);
    drag(&mut alice, &wave(Point::new(40.0, 140.0), 360.0), now);
    alice.select_tool(&Tool::ShapeCircle, now);
    click(&mut alice, 120.0, 300.0, now);
    alice.select_tool(&Tool::Text, now);
    click(&mut alice, 40.0, 80.0, now);
    if let Some(page) = alice.page_mut(PAGE) {
        if let Some(id) = page.editing() {
            page.object_modified(id, &ObjectPatch::text("Day one at the lake"));
        }
        page.end_text_editing();
    }
    alice.select_tool(&Tool::sticker("🌻"), now);
    now = clock.advance(250);
    sync_all(&store, &mut [&mut alice, &mut bob], now);

    // She takes the sticker back; the undo is published once its window closes
    alice.select_tool(&Tool::Undo, now);
    now = clock.advance(300);
    sync_all(&store, &mut [&mut alice, &mut bob], now);
    now = clock.advance(600);
    sync_all(&store, &mut [&mut alice, &mut bob], now);

    // Bob adds a line and erases across Alice's, once his copy has settled
    now = clock.advance(600);
    bob.poll(now);
    bob.select_tool(&Tool::Brush, now);
    drag(&mut bob, &wave(Point::new(60.0, 500.0), 200.0), now);
    bob.select_tool(&Tool::Eraser, now);
    drag(&mut bob, &[Point::new(200.0, 100.0), Point::new(210.0, 240.0)], now);
    now = clock.advance(50);
    sync_all(&store, &mut [&mut alice, &mut bob], now);
    now = clock.advance(600);
    sync_all(&store, &mut [&mut alice, &mut bob], now);

    alice.select_tool(&Tool::Download, now);
    let mut downloads = Vec::new();
    for (page, event) in alice.take_events() {
        if let SessionEvent::Download { file_name, bytes } = event {
            if let Some(dir) = out_dir {
                let path: PathBuf = dir.join(&file_name);
                std::fs::write(&path, &bytes)?;
                log::info!("Saved {} from page {page}", path.display());
            }
            downloads.push((file_name, bytes.len()));
        }
    }
    now = clock.advance(600);
    sync_all(&store, &mut [&mut alice, &mut bob], now);

    let alice_page = alice.page(PAGE).ok_or(AppError::PageClosed(PAGE))?;
    let bob_page = bob.page(PAGE).ok_or(AppError::PageClosed(PAGE))?;
    let snapshot = alice_page.scene().serialize();
    let converged = snapshot == bob_page.scene().serialize();

    Ok(DemoReport {
        pages: [summary("alice", &alice), summary("bob", &bob)]
            .into_iter()
            .flatten()
            .collect(),
        converged,
        writes: store.write_count(),
        snapshot,
        downloads,
    })
}
