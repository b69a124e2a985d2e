//! Import functionality
//!
//! Parsers for ingesting decision definitions from the OMG DMN XML
//! interchange format (1.1 / 1.2 / 1.3).

pub mod dmn;

/// Error during import
#[derive(Debug, Clone, thiserror::Error, serde::Serialize, serde::Deserialize)]
pub enum ImportError {
    #[error("Parse error: {0}")]
    ParseError(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("DMN parse error: {0}")]
    DmnParseError(String),
    #[error("DMN validation error: {0}")]
    DmnValidationError(String),
}

pub use dmn::{
    convert_to_decisions, DmnDefinitions, DmnParseResult, DmnParser, DmnVersion, ParsedDecision,
    ValidationOutcome,
};
