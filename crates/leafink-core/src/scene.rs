//! The in-memory scene for one page.

use crate::shapes::{DrawableObject, ObjectId, ObjectPatch, SerializableColor};
use crate::snapshot::SceneSnapshot;
use kurbo::Point;
use std::cell::Cell;
use std::collections::HashSet;
use std::rc::Rc;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Scene mutation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SceneError {
    #[error("Object already exists: {0}")]
    DuplicateId(ObjectId),
    #[error("Object not found: {0}")]
    NotFound(ObjectId),
    #[error("Edit on {0} has a non-finite value")]
    NonFinitePatch(ObjectId),
}

#[derive(Debug, Clone, Copy, Default)]
struct FlagState {
    raised: bool,
    release_at: Option<Instant>,
}

/// Per-page gate that is set while a restore (remote apply or undo) is in
/// flight, plus a trailing grace window.
///
/// Cloning shares the gate. Each page session creates its own and hands
/// clones to its scene and sync engine, so pages never share one.
#[derive(Debug, Clone, Default)]
pub struct RemoteUpdateFlag {
    state: Rc<Cell<FlagState>>,
}

impl RemoteUpdateFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the gate until released.
    pub fn raise(&self) {
        let mut state = self.state.get();
        state.raised = true;
        self.state.set(state);
    }

    /// Schedule the gate to clear `grace` after `now`.
    ///
    /// An earlier release never shortens a later one already pending.
    pub fn release_after(&self, now: Instant, grace: Duration) {
        let mut state = self.state.get();
        let deadline = now + grace;
        state.raised = false;
        state.release_at = Some(match state.release_at {
            Some(pending) if pending > deadline => pending,
            _ => deadline,
        });
        self.state.set(state);
    }

    /// Advance time. Returns true if the gate cleared on this call.
    pub fn poll(&self, now: Instant) -> bool {
        let mut state = self.state.get();
        match state.release_at {
            Some(deadline) if !state.raised && now >= deadline => {
                state.release_at = None;
                self.state.set(state);
                true
            }
            _ => false,
        }
    }

    /// Whether mutation hooks are currently suppressed.
    pub fn is_set(&self) -> bool {
        let state = self.state.get();
        state.raised || state.release_at.is_some()
    }
}

/// Objects on one page in z-order (back to front), plus background.
///
/// Local mutations queue a commit carrying the post-mutation snapshot; the
/// owner drains them with [`SceneModel::take_commits`]. `restore` never
/// queues a commit, and nothing is queued while the update flag is set.
#[derive(Debug)]
pub struct SceneModel {
    objects: Vec<DrawableObject>,
    background: Option<SerializableColor>,
    flag: RemoteUpdateFlag,
    commits: Vec<SceneSnapshot>,
}

impl SceneModel {
    pub fn new(flag: RemoteUpdateFlag) -> Self {
        Self {
            objects: Vec::new(),
            background: None,
            flag,
            commits: Vec::new(),
        }
    }

    fn commit(&mut self) {
        if self.flag.is_set() {
            log::debug!("Scene commit suppressed while update flag is set");
            return;
        }
        let snapshot = self.serialize();
        self.commits.push(snapshot);
    }

    /// Add an object on top of the z-order.
    pub fn add_object(&mut self, object: DrawableObject) -> Result<(), SceneError> {
        if self.contains(object.id) {
            return Err(SceneError::DuplicateId(object.id));
        }
        self.objects.push(object);
        self.commit();
        Ok(())
    }

    /// Remove objects by id. Unknown ids are ignored.
    /// Returns the number removed; a single commit covers the whole batch.
    pub fn remove_objects(&mut self, ids: &[ObjectId]) -> usize {
        let before = self.objects.len();
        self.objects.retain(|o| !ids.contains(&o.id));
        let removed = before - self.objects.len();
        if removed > 0 {
            self.commit();
        }
        removed
    }

    /// Apply a patch to one object. Returns whether anything changed.
    pub fn modify_object(&mut self, id: ObjectId, patch: &ObjectPatch) -> Result<bool, SceneError> {
        let object = self
            .objects
            .iter_mut()
            .find(|o| o.id == id)
            .ok_or(SceneError::NotFound(id))?;
        if !patch.is_finite() {
            return Err(SceneError::NonFinitePatch(id));
        }
        let changed = object.apply_patch(patch);
        if changed {
            self.commit();
        }
        Ok(changed)
    }

    /// Set the page background (None = transparent).
    pub fn set_background(&mut self, background: Option<SerializableColor>) {
        self.background = background;
        self.commit();
    }

    /// Remove everything, including the background.
    pub fn clear(&mut self) {
        self.objects.clear();
        self.background = None;
        self.commit();
    }

    /// Capture the current state.
    pub fn serialize(&self) -> SceneSnapshot {
        SceneSnapshot::new(self.objects.clone(), self.background)
    }

    /// Replace the whole scene without queuing a commit.
    ///
    /// Snapshots with duplicate ids are rejected and leave the scene as it was.
    pub fn restore(&mut self, snapshot: &SceneSnapshot) -> Result<(), SceneError> {
        let mut seen = HashSet::with_capacity(snapshot.objects.len());
        for object in &snapshot.objects {
            if !seen.insert(object.id) {
                return Err(SceneError::DuplicateId(object.id));
            }
        }
        self.objects = snapshot.objects.clone();
        self.background = snapshot.background;
        Ok(())
    }

    /// Drain queued commit notifications, oldest first.
    pub fn take_commits(&mut self) -> Vec<SceneSnapshot> {
        std::mem::take(&mut self.commits)
    }

    /// Front-most evented object under `point`.
    pub fn object_at(&self, point: Point, tolerance: f64) -> Option<ObjectId> {
        self.objects
            .iter()
            .rev()
            .filter(|o| o.flags.evented)
            .find(|o| o.hit_test(point, tolerance))
            .map(|o| o.id)
    }

    pub fn get(&self, id: ObjectId) -> Option<&DrawableObject> {
        self.objects.iter().find(|o| o.id == id)
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.objects.iter().any(|o| o.id == id)
    }

    pub fn objects(&self) -> &[DrawableObject] {
        &self.objects
    }

    pub fn background(&self) -> Option<SerializableColor> {
        self.background
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn flag(&self) -> &RemoteUpdateFlag {
        &self.flag
    }
}
