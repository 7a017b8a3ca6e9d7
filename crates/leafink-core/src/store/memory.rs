//! In-memory document store for tests, demos and offline use.

use super::{
    DocumentKey, DocumentStore, Fields, Listener, StoreError, StoreResult, Subscription,
    validate_fields,
};
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::{Rc, Weak};

type SharedListener = Rc<RefCell<Listener>>;

struct Delivery {
    path: String,
    /// Only this listener (initial delivery on subscribe), or everyone.
    target: Option<u64>,
    fields: Fields,
}

#[derive(Default)]
struct Inner {
    documents: HashMap<String, Fields>,
    listeners: HashMap<String, Vec<(u64, SharedListener)>>,
    pending: VecDeque<Delivery>,
    next_listener: u64,
    deferred: bool,
    delivering: bool,
    unavailable: bool,
    writes: usize,
}

/// Shared, single-threaded document store.
///
/// Clones share the same documents, so several sessions (one per simulated
/// client) can replicate through one store. By default notifications are
/// delivered synchronously after each write; a deferred store holds them
/// until [`MemoryDocumentStore::flush`].
#[derive(Clone, Default)]
pub struct MemoryDocumentStore {
    inner: Rc<RefCell<Inner>>,
}

impl MemoryDocumentStore {
    /// Create a store that notifies subscribers immediately.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that queues notifications until `flush`.
    pub fn deferred() -> Self {
        let store = Self::default();
        store.inner.borrow_mut().deferred = true;
        store
    }

    /// Simulate an outage (or recovery).
    pub fn set_available(&self, available: bool) {
        self.inner.borrow_mut().unavailable = !available;
    }

    /// Deliver all queued notifications. Returns how many were delivered.
    pub fn flush(&self) -> usize {
        let mut delivered = 0;
        loop {
            let next = {
                let mut inner = self.inner.borrow_mut();
                match inner.pending.pop_front() {
                    Some(delivery) => {
                        let listeners: Vec<SharedListener> = inner
                            .listeners
                            .get(&delivery.path)
                            .map(|list| {
                                list.iter()
                                    .filter(|(id, _)| delivery.target.is_none_or(|t| t == *id))
                                    .map(|(_, l)| l.clone())
                                    .collect()
                            })
                            .unwrap_or_default();
                        Some((delivery.fields, listeners))
                    }
                    None => None,
                }
            };
            let Some((fields, listeners)) = next else {
                break;
            };
            for listener in listeners {
                (listener.borrow_mut())(&fields);
                delivered += 1;
            }
        }
        delivered
    }

    fn enqueue(&self, delivery: Delivery) {
        let run_now = {
            let mut inner = self.inner.borrow_mut();
            inner.pending.push_back(delivery);
            !inner.deferred && !inner.delivering
        };
        if run_now {
            self.inner.borrow_mut().delivering = true;
            self.flush();
            self.inner.borrow_mut().delivering = false;
        }
    }

    /// Current fields of a document.
    pub fn document(&self, key: &DocumentKey) -> Option<Fields> {
        self.inner.borrow().documents.get(&key.path()).cloned()
    }

    /// Number of successful writes so far.
    pub fn write_count(&self) -> usize {
        self.inner.borrow().writes
    }

    /// Number of live subscriptions on a document.
    pub fn listener_count(&self, key: &DocumentKey) -> usize {
        self.inner
            .borrow()
            .listeners
            .get(&key.path())
            .map_or(0, Vec::len)
    }

    /// Notifications waiting for `flush`.
    pub fn pending(&self) -> usize {
        self.inner.borrow().pending.len()
    }
}

fn unsubscribe(inner: &Weak<RefCell<Inner>>, path: &str, id: u64) {
    let Some(inner) = inner.upgrade() else {
        return;
    };
    let mut inner = inner.borrow_mut();
    if let Some(list) = inner.listeners.get_mut(path) {
        list.retain(|(lid, _)| *lid != id);
    }
}

impl DocumentStore for MemoryDocumentStore {
    fn subscribe(&self, key: &DocumentKey, listener: Listener) -> StoreResult<Subscription> {
        let path = key.path();
        let (id, existing) = {
            let mut inner = self.inner.borrow_mut();
            if inner.unavailable {
                return Err(StoreError::Unavailable(format!("cannot subscribe to {path}")));
            }
            let id = inner.next_listener;
            inner.next_listener += 1;
            inner
                .listeners
                .entry(path.clone())
                .or_default()
                .push((id, Rc::new(RefCell::new(listener))));
            (id, inner.documents.get(&path).cloned())
        };
        if let Some(fields) = existing {
            self.enqueue(Delivery {
                path: path.clone(),
                target: Some(id),
                fields,
            });
        }
        let weak = Rc::downgrade(&self.inner);
        Ok(Subscription::new(move || unsubscribe(&weak, &path, id)))
    }

    fn write(&self, key: &DocumentKey, fields: Fields, merge: bool) -> StoreResult<()> {
        validate_fields(&fields)?;
        let path = key.path();
        let document = {
            let mut inner = self.inner.borrow_mut();
            if inner.unavailable {
                return Err(StoreError::Unavailable(format!("cannot write {path}")));
            }
            let document = inner.documents.entry(path.clone()).or_default();
            if merge {
                document.extend(fields);
            } else {
                *document = fields;
            }
            let document = document.clone();
            inner.writes += 1;
            document
        };
        log::debug!("Stored {path}");
        self.enqueue(Delivery {
            path,
            target: None,
            fields: document,
        });
        Ok(())
    }
}
