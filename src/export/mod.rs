//! Export functionality
//!
//! Emits stored decisions as OMG DMN interchange XML.

pub mod dmn;

/// Error during export
#[derive(Debug, Clone, thiserror::Error, serde::Serialize, serde::Deserialize)]
pub enum ExportError {
    #[error("Serialization error: {0}")]
    SerializationError(String),
    #[error("Unsupported decision: {0}")]
    UnsupportedDecision(String),
}

pub use dmn::{DmnExporter, ExportOptions};
