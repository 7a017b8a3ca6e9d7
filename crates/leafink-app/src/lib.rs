//! LeafInk headless host.
//!
//! Runs page sessions against the in-memory store with a software renderer.

pub mod demo;
pub mod raster;

use leafink_core::ConfigError;
use thiserror::Error;

/// Host errors.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Page {0} is not open")]
    PageClosed(&'static str),
}
