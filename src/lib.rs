//! DMN Engine - Decision Model and Notation (DMN 1.3) decision-table engine
//!
//! Provides unified interfaces for:
//! - Decision-table evaluation under the eight DMN hit policies
//! - FEEL expression parsing and evaluation (with a direct-string fast path)
//! - DMN 1.1 / 1.2 / 1.3 XML import and export
//! - Decision lifecycle management (draft, publish, suspend, version)
//! - Auditable execution records and aggregated statistics
//!
//! Storage is pluggable: the engine talks to a [`store::DecisionStore`]
//! and an append-only [`store::ExecutionStore`]; in-memory reference
//! implementations back the test suite and small embedded deployments.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use dmn_engine::engine::RuleEngineExecutor;
//! use dmn_engine::lifecycle::{DecisionDefinition, DecisionManager};
//! use dmn_engine::models::{ExecuteOptions, ExecuteRequest};
//! use dmn_engine::store::{InMemoryDecisionStore, InMemoryExecutionStore, SystemClock, UuidGenerator};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let decisions = Arc::new(InMemoryDecisionStore::new());
//! let executions = Arc::new(InMemoryExecutionStore::new());
//! let clock = Arc::new(SystemClock);
//! let ids = Arc::new(UuidGenerator);
//!
//! let manager = DecisionManager::new(decisions.clone(), executions.clone(), clock.clone(), ids.clone());
//! let executor = RuleEngineExecutor::new(decisions, executions, clock, ids);
//!
//! let draft = manager.create(DecisionDefinition {
//!     decision_key: "grading".into(),
//!     name: "Age Grading".into(),
//!     ..Default::default()
//! }).await?;
//! # let _ = (draft, executor);
//! # Ok(())
//! # }
//! ```

pub mod engine;
pub mod export;
pub mod feel;
pub mod import;
pub mod lifecycle;
pub mod models;
pub mod store;
pub mod validation;

// Re-export commonly used types
pub use engine::{ConditionOperator, EngineError, RuleEngineExecutor};
pub use export::{DmnExporter, ExportError, ExportOptions};
pub use feel::{FeelContext, FeelError, FeelErrorKind, FeelValue};
pub use import::{convert_to_decisions, DmnParser, ImportError};
pub use lifecycle::{DecisionDefinition, DecisionManager, LifecycleError};
pub use models::{
    Aggregation, AuditContainer, Condition, Decision, DecisionInput, DecisionOutput,
    DecisionResult, DecisionStatistics, DecisionStatus, ExecuteOptions, ExecuteRequest,
    ExecutionRecord, ExecutionStatus, HitPolicy, Rule, RuleOutput,
};
pub use store::{
    Clock, DecisionFilter, DecisionStore, ExecutionStore, IdGenerator, InMemoryDecisionStore,
    InMemoryExecutionStore, Page, StoreError, SystemClock, UuidGenerator,
};
pub use validation::{validate_decision, DecisionValidationResult};
