//! Serialized page state.

use crate::shapes::{DrawableObject, SerializableColor};
use serde::{Deserialize, Serialize};

/// Snapshot format written by this version.
pub const FORMAT_VERSION: u32 = 1;

/// Canonical form of a snapshot with nothing in it.
pub const VACUOUS: &str = "{}";

/// Every object on a page, back to front, plus page-level background.
///
/// Empty fields are omitted so that `SceneSnapshot::default()` serializes to
/// `{}`. Equality is defined on the canonical string, which is also what
/// decides whether a remote snapshot needs to be applied.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SceneSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<SerializableColor>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub objects: Vec<DrawableObject>,
}

impl SceneSnapshot {
    /// Snapshot as produced by a live page.
    pub fn new(objects: Vec<DrawableObject>, background: Option<SerializableColor>) -> Self {
        Self {
            version: Some(FORMAT_VERSION),
            background,
            objects,
        }
    }

    /// Canonical string form.
    pub fn canonical(&self) -> String {
        // Derived serialization of plain data cannot fail; an empty string
        // would still never equal a real snapshot.
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Parse a canonical string.
    pub fn from_canonical(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    /// Whether this is the "nothing here yet" snapshot.
    pub fn is_vacuous(&self) -> bool {
        self.canonical() == VACUOUS
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

impl PartialEq for SceneSnapshot {
    fn eq(&self, other: &Self) -> bool {
        self.canonical() == other.canonical()
    }
}
