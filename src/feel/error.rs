//! FEEL error classification

use serde::{Deserialize, Serialize};

/// Classification of a FEEL tokenizer, parser or evaluator failure
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeelErrorKind {
    SyntaxError,
    TypeError,
    VariableNotFound,
    FunctionNotFound,
    InvalidArguments,
    DivisionByZero,
    NullValue,
    RuntimeError,
}

impl std::fmt::Display for FeelErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FeelErrorKind::SyntaxError => "SYNTAX_ERROR",
            FeelErrorKind::TypeError => "TYPE_ERROR",
            FeelErrorKind::VariableNotFound => "VARIABLE_NOT_FOUND",
            FeelErrorKind::FunctionNotFound => "FUNCTION_NOT_FOUND",
            FeelErrorKind::InvalidArguments => "INVALID_ARGUMENTS",
            FeelErrorKind::DivisionByZero => "DIVISION_BY_ZERO",
            FeelErrorKind::NullValue => "NULL_VALUE",
            FeelErrorKind::RuntimeError => "RUNTIME_ERROR",
        };
        write!(f, "{}", name)
    }
}

/// A FEEL failure with its classification and, when known, source position
#[derive(Debug, Clone, thiserror::Error, Serialize, Deserialize, PartialEq)]
#[error("{kind}: {message}")]
pub struct FeelError {
    /// Failure classification
    pub kind: FeelErrorKind,
    /// Human-readable detail
    pub message: String,
    /// Source line (1-based), when the failure has a location
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    /// Source column (1-based), when the failure has a location
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
}

impl FeelError {
    /// Create an error without a source location
    pub fn new(kind: FeelErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            line: None,
            column: None,
        }
    }

    /// Create an error carrying a source location
    pub fn at(kind: FeelErrorKind, message: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            kind,
            message: message.into(),
            line: Some(line),
            column: Some(column),
        }
    }

    /// Shorthand for a syntax error
    pub fn syntax(message: impl Into<String>) -> Self {
        Self::new(FeelErrorKind::SyntaxError, message)
    }

    /// Shorthand for a type error
    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new(FeelErrorKind::TypeError, message)
    }

    /// Shorthand for an invalid-arguments error
    pub fn invalid_arguments(message: impl Into<String>) -> Self {
        Self::new(FeelErrorKind::InvalidArguments, message)
    }

    /// Shorthand for a runtime error
    pub fn runtime(message: impl Into<String>) -> Self {
        Self::new(FeelErrorKind::RuntimeError, message)
    }
}
