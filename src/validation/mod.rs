//! Validation functionality
//!
//! Structural checks over decision definitions: referential integrity
//! between rules and their input/output clauses, plus best-effort
//! UNIQUE-overlap detection.

pub mod decision;

pub use decision::{validate_decision, DecisionValidationResult};
