// SPDX-License-Identifier: MIT

//! Typed error handling for audience-rs
//!
//! Each layer owns an error enum: the formula document parser, the engine,
//! the row stores and the ledger. `AudienceError` sits on top for callers
//! (the CLI, the loader) that only need to report what went wrong.

use thiserror::Error;
use uuid::Uuid;

use crate::formula::{DataType, Operator};

/// Top-level error type for audience-rs
#[derive(Debug, Error)]
pub enum AudienceError {
    /// Malformed formula document
    #[error("Formula parse error: {0}")]
    Parse(#[from] FormulaParseError),

    /// Evaluation-time failure
    #[error("Formula evaluation error: {0}")]
    Eval(#[from] EvalError),

    /// Ledger validation or recompute failure
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// Row store failure
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Configuration errors (bad env vars)
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

impl AudienceError {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

/// Errors raised while reading a builder document into a formula tree
#[derive(Debug, Error)]
pub enum FormulaParseError {
    #[error("Formula node must be a JSON object")]
    NotAnObject,

    #[error("Unknown connective: {0}")]
    UnknownConnective(String),

    #[error("Unknown operator: {0}")]
    UnknownOperator(String),

    #[error("Unknown operand type: {0}")]
    UnknownType(String),

    #[error("Missing field '{0}'")]
    MissingField(&'static str),

    #[error("{connective} expects {expected} rule(s), found {found}")]
    BadArity {
        connective: String,
        expected: &'static str,
        found: usize,
    },

    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },

    #[error("Operator '{operator}' does not take this operand")]
    UnexpectedOperand { operator: String },

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl FormulaParseError {
    pub(crate) fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Errors raised by the engine for a single evaluation call
#[derive(Debug, Clone, Error, PartialEq)]
pub enum EvalError {
    #[error("Operator '{operator}' is not supported for {data_type} columns")]
    UnsupportedOperator {
        operator: Operator,
        data_type: DataType,
    },

    #[error("Type mismatch on column '{column}': column is {expected}, operand is {found}")]
    TypeMismatch {
        column: String,
        expected: DataType,
        found: DataType,
    },

    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    #[error("Malformed expression: {0}")]
    MalformedExpression(String),

    /// The row handed to a row mask has no value for a referenced column
    #[error("Row has no value for column '{column}'")]
    MissingValue { column: String },
}

/// Which namespace a rejected condition name collides with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReservedBy {
    Column,
    Attribute,
}

impl std::fmt::Display for ReservedBy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReservedBy::Column => write!(f, "a column"),
            ReservedBy::Attribute => write!(f, "a workflow attribute"),
        }
    }
}

/// Ledger-level failures. Validation errors are recoverable: nothing is saved.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("The action already has a filter")]
    DuplicateFilter,

    #[error("The action has no filter")]
    NoFilter,

    #[error("A condition named '{0}' already exists in this action")]
    DuplicateConditionName(String),

    #[error("Condition name '{name}' is already used by {reserved_by}")]
    ReservedConditionName { name: String, reserved_by: ReservedBy },

    #[error("'{0}' is not a valid condition name")]
    IllegalConditionName(String),

    #[error("Condition {0} not found")]
    ConditionNotFound(Uuid),

    #[error("Action {0} not found")]
    ActionNotFound(Uuid),

    /// The formula does not evaluate against the current schema
    #[error("Invalid formula: {0}")]
    Invalid(#[from] EvalError),

    /// Counting failed part way; the previous generation is kept
    #[error("Recompute failed: {0}")]
    RecomputeFailure(String),
}

/// Row store failures
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Sql(#[from] sqlx::Error),

    #[error(transparent)]
    Eval(#[from] EvalError),

    #[error("Column '{column}': {message}")]
    Conversion { column: String, message: String },
}

impl StoreError {
    pub(crate) fn conversion(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Conversion {
            column: column.into(),
            message: message.into(),
        }
    }
}
