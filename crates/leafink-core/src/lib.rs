//! LeafInk Core Library
//!
//! Per-page editing and synchronization engine for the LeafInk journal:
//! scene model, tool state machine, undo history and replication through a
//! document store.

pub mod config;
pub mod history;
pub mod input;
pub mod notebook;
pub mod renderer;
pub mod scene;
pub mod session;
pub mod shapes;
pub mod snapshot;
pub mod store;
pub mod sync;
pub mod tools;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{ConfigError, EditorConfig};
pub use history::HistoryStack;
pub use input::{Key, KeyEvent, MouseButton, PointerEvent};
pub use notebook::Notebook;
pub use renderer::{ExportFormat, ExportOptions, RenderResult, Renderer, RendererError};
pub use scene::{RemoteUpdateFlag, SceneError, SceneModel};
pub use session::{ImageRequestId, PageSession, SessionEvent};
pub use snapshot::SceneSnapshot;
pub use store::{DocumentKey, DocumentStore, MemoryDocumentStore, StoreError, StoreResult};
pub use sync::{PublishOutcome, SyncEngine, SyncError};
pub use tools::{DrawingImplement, InteractionMode, Tool, ToolController, ToolKind};
