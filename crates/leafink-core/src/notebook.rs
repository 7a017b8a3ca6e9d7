//! A book of pages sharing one toolbar.
//!
//! Tool and brush changes are broadcast to every open page. Each page
//! applies them with its own active flag, so placement, stamps and one-shot
//! actions only ever land on the page that is on screen.

use crate::config::EditorConfig;
use crate::renderer::Renderer;
use crate::session::{PageSession, SessionEvent};
use crate::shapes::SerializableColor;
use crate::store::{DocumentKey, DocumentStore};
use crate::tools::Tool;
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::rc::Rc;
use std::time::Instant;

/// Open pages of one book.
pub struct Notebook {
    book: String,
    config: EditorConfig,
    store: Option<Rc<dyn DocumentStore>>,
    pages: BTreeMap<String, PageSession>,
    active: Option<String>,
}

impl Notebook {
    pub fn new(book: impl Into<String>, config: EditorConfig, store: Option<Rc<dyn DocumentStore>>) -> Self {
        Self {
            book: book.into(),
            config,
            store,
            pages: BTreeMap::new(),
            active: None,
        }
    }

    pub fn book(&self) -> &str {
        &self.book
    }

    /// Open (or reopen) a page with its own renderer.
    pub fn open_page(&mut self, page: &str, renderer: Box<dyn Renderer>) -> &mut PageSession {
        let key = DocumentKey::new(self.config.collection.clone(), self.book.clone(), page);
        let mut session = PageSession::new(key, self.config.clone(), renderer, self.store.clone());
        session.set_active(self.active.as_deref() == Some(page));
        log::debug!("Opened page {page} of {}", self.book);
        match self.pages.entry(page.to_string()) {
            Entry::Occupied(mut entry) => {
                entry.insert(session);
                entry.into_mut()
            }
            Entry::Vacant(entry) => entry.insert(session),
        }
    }

    /// Close a page, ending its subscription.
    pub fn close_page(&mut self, page: &str) -> bool {
        if self.active.as_deref() == Some(page) {
            self.active = None;
        }
        self.pages.remove(page).is_some()
    }

    /// Make one page the visible one. Unknown pages leave none active.
    pub fn set_active_page(&mut self, page: &str) {
        self.active = self.pages.contains_key(page).then(|| page.to_string());
        for (id, session) in &mut self.pages {
            session.set_active(id == page);
        }
    }

    pub fn active_page(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn page(&self, page: &str) -> Option<&PageSession> {
        self.pages.get(page)
    }

    pub fn page_mut(&mut self, page: &str) -> Option<&mut PageSession> {
        self.pages.get_mut(page)
    }

    /// Ids of open pages, in order.
    pub fn page_ids(&self) -> impl Iterator<Item = &str> {
        self.pages.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Send a toolbar selection to every page.
    pub fn select_tool(&mut self, tool: &Tool, now: Instant) {
        for session in self.pages.values_mut() {
            session.select_tool(tool.clone(), now);
        }
    }

    pub fn set_brush(&mut self, color: SerializableColor, width: f64) {
        for session in self.pages.values_mut() {
            session.set_brush(color, width);
        }
    }

    pub fn poll(&mut self, now: Instant) {
        for session in self.pages.values_mut() {
            session.poll(now);
        }
    }

    /// Drain events from every page, tagged with the page id.
    pub fn take_events(&mut self) -> Vec<(String, SessionEvent)> {
        self.pages
            .iter_mut()
            .flat_map(|(id, session)| {
                session
                    .take_events()
                    .into_iter()
                    .map(move |event| (id.clone(), event))
            })
            .collect()
    }
}

impl std::fmt::Debug for Notebook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notebook")
            .field("book", &self.book)
            .field("pages", &self.pages)
            .field("active", &self.active)
            .finish()
    }
}
