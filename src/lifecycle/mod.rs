//! Decision lifecycle management
//!
//! CRUD plus the state machine over stored definitions: Draft → Published
//! → [Suspended ⇄ Published], versioning, validation gate, statistics and
//! the XML import/export entrypoints.

pub mod manager;

pub use manager::{DecisionDefinition, DecisionManager, LifecycleError};
