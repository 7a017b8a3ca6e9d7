//! Replication of page snapshots through a document store.
//!
//! Each page document holds the whole scene as an opaque JSON string
//! (`canvasJSON`) plus an ISO-8601 `lastUpdated` stamp. Stroke paths are
//! nested arrays, which the store cannot hold natively, so snapshots are
//! always written in string form.
//!
//! Conflict policy is last-write-wins per page: a remote snapshot that
//! differs from the local scene replaces it entirely. Every write is tagged
//! with the writing engine's id, and an engine never applies its own echoes:
//! a late echo would otherwise roll back edits made after it was written.

use crate::renderer::Renderer;
use crate::scene::{RemoteUpdateFlag, SceneError, SceneModel};
use crate::snapshot::{FORMAT_VERSION, SceneSnapshot};
use crate::store::{DocumentKey, DocumentStore, FieldValue, Fields, StoreError, Subscription};
use chrono::{DateTime, Utc};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::{Duration, Instant};
use thiserror::Error;
use uuid::Uuid;

/// Field holding the encoded snapshot.
pub const CANVAS_FIELD: &str = "canvasJSON";

/// Field holding the write timestamp.
pub const UPDATED_FIELD: &str = "lastUpdated";

/// Field identifying the engine that made the last write.
pub const WRITER_FIELD: &str = "writerId";

/// Sync errors.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Document has no {0} field")]
    MissingField(&'static str),
    #[error("Field {0} has an unexpected type")]
    UnexpectedType(&'static str),
    #[error("Malformed snapshot: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("Scene error: {0}")]
    Scene(#[from] SceneError),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Encode a snapshot as page document fields.
pub fn encode_snapshot(snapshot: &SceneSnapshot, updated: DateTime<Utc>) -> Fields {
    let mut fields = Fields::new();
    fields.insert(CANVAS_FIELD.to_string(), FieldValue::String(snapshot.canonical()));
    fields.insert(UPDATED_FIELD.to_string(), FieldValue::String(updated.to_rfc3339()));
    fields
}

/// Decode page document fields into a snapshot.
///
/// Besides the string form, documents written by older clients that stored
/// the scene as a native map are accepted.
pub fn decode_snapshot(fields: &Fields) -> SyncResult<SceneSnapshot> {
    let mut snapshot = match fields.get(CANVAS_FIELD) {
        None => return Err(SyncError::MissingField(CANVAS_FIELD)),
        Some(FieldValue::String(json)) => SceneSnapshot::from_canonical(json)?,
        Some(map @ FieldValue::Map(_)) => serde_json::from_value(map.to_json())?,
        Some(_) => return Err(SyncError::UnexpectedType(CANVAS_FIELD)),
    };
    if let Some(version) = snapshot.version {
        if version > FORMAT_VERSION {
            log::warn!("Remote snapshot has newer format version {version}");
        }
    }
    // Stamp with the local version so canonical comparison matches what a
    // local serialize would produce.
    snapshot.version = Some(FORMAT_VERSION);
    Ok(snapshot)
}

/// What happened to a publish request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Handed to the store.
    Written,
    /// The update flag was set.
    Suppressed,
    /// Nothing worth writing.
    Vacuous,
    /// Running local-only.
    Disabled,
    /// The store refused the write (logged, not retried).
    Failed,
}

/// Keeps one page in step with its remote document.
pub struct SyncEngine {
    key: DocumentKey,
    store: Option<Rc<dyn DocumentStore>>,
    flag: RemoteUpdateFlag,
    inbox: Rc<RefCell<VecDeque<Fields>>>,
    subscription: Option<Subscription>,
    grace: Duration,
    writer: String,
}

impl SyncEngine {
    /// Create an engine. Without a store the engine runs local-only.
    pub fn new(
        key: DocumentKey,
        store: Option<Rc<dyn DocumentStore>>,
        flag: RemoteUpdateFlag,
        grace: Duration,
    ) -> Self {
        if store.is_none() {
            log::info!("No document store configured for {key}, running local-only");
        }
        Self {
            key,
            store,
            flag,
            inbox: Rc::new(RefCell::new(VecDeque::new())),
            subscription: None,
            grace,
            writer: Uuid::new_v4().to_string(),
        }
    }

    pub fn key(&self) -> &DocumentKey {
        &self.key
    }

    /// Id stamped on this engine's writes.
    pub fn writer_id(&self) -> &str {
        &self.writer
    }

    /// Whether a store is attached.
    pub fn is_enabled(&self) -> bool {
        self.store.is_some()
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription.is_some()
    }

    /// Start listening for remote changes.
    ///
    /// Remote documents are queued and applied by [`SyncEngine::apply_remote`].
    /// If the store refuses, the engine drops to local-only mode.
    pub fn subscribe_remote(&mut self) -> bool {
        let Some(store) = &self.store else {
            return false;
        };
        let inbox = self.inbox.clone();
        let listener = Box::new(move |fields: &Fields| inbox.borrow_mut().push_back(fields.clone()));
        match store.subscribe(&self.key, listener) {
            Ok(subscription) => {
                log::debug!("Subscribed to {}", self.key);
                self.subscription = Some(subscription);
                true
            }
            Err(e) => {
                log::warn!("Remote store unavailable for {}, continuing local-only: {e}", self.key);
                self.store = None;
                false
            }
        }
    }

    /// Stop listening. Also happens when the engine is dropped.
    pub fn unsubscribe(&mut self) {
        self.subscription = None;
        self.inbox.borrow_mut().clear();
    }

    /// Remote documents waiting to be applied.
    pub fn pending_remote(&self) -> usize {
        self.inbox.borrow().len()
    }

    /// Write a snapshot to the store with merge semantics.
    pub fn publish(&mut self, snapshot: &SceneSnapshot) -> PublishOutcome {
        if self.flag.is_set() {
            log::debug!("Publish for {} suppressed while update flag is set", self.key);
            return PublishOutcome::Suppressed;
        }
        if snapshot.is_vacuous() {
            return PublishOutcome::Vacuous;
        }
        let Some(store) = &self.store else {
            return PublishOutcome::Disabled;
        };
        let mut fields = encode_snapshot(snapshot, Utc::now());
        fields.insert(WRITER_FIELD.to_string(), FieldValue::String(self.writer.clone()));
        match store.write(&self.key, fields, true) {
            Ok(()) => PublishOutcome::Written,
            Err(e) => {
                log::error!("Failed to save {}: {e}", self.key);
                PublishOutcome::Failed
            }
        }
    }

    /// Apply the newest queued remote document to the scene.
    ///
    /// Every delivery carries the whole document, so older queued ones are
    /// superseded and dropped. An echo of this engine's own write is dropped
    /// too, since the local scene is at least as new. A document identical
    /// to the local scene is skipped without touching the scene, the renderer or the flag.
    /// Otherwise the flag is raised, the scene is replaced and rendered, and
    /// the flag is released after the grace window. Returns whether the scene
    /// was replaced.
    pub fn apply_remote(&mut self, scene: &mut SceneModel, renderer: &mut dyn Renderer, now: Instant) -> bool {
        let Some(fields) = self.inbox.borrow_mut().drain(..).last() else {
            return false;
        };
        if fields.get(WRITER_FIELD).and_then(FieldValue::as_str) == Some(self.writer.as_str()) {
            log::debug!("Dropping echo of own write to {}", self.key);
            return false;
        }
        let remote = match decode_snapshot(&fields) {
            Ok(snapshot) => snapshot,
            Err(SyncError::MissingField(field)) => {
                log::debug!("Ignoring {} update without {field}", self.key);
                return false;
            }
            Err(e) => {
                log::warn!("Skipping remote snapshot for {}: {e}", self.key);
                return false;
            }
        };
        if remote.canonical() == scene.serialize().canonical() {
            log::debug!("Remote snapshot for {} matches local state", self.key);
            return false;
        }
        self.flag.raise();
        let applied = match scene.restore(&remote) {
            Ok(()) => {
                renderer.render(scene);
                true
            }
            Err(e) => {
                log::warn!("Rejected remote snapshot for {}: {e}", self.key);
                false
            }
        };
        self.flag.release_after(now, self.grace);
        applied
    }
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("key", &self.key)
            .field("enabled", &self.store.is_some())
            .field("subscribed", &self.subscription.is_some())
            .field("pending", &self.inbox.borrow().len())
            .finish()
    }
}
