//! # Compile Errors and Warnings
//!
//! The error taxonomy surfaced to callers of [`crate::check`]. Every kind
//! carries a stable human-readable message and an optional span; an
//! external formatter may render source snippets from the span. Warnings
//! are informational only and never affect whether checking succeeds.

use crate::ast::Span;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A fatal diagnostic produced during checking.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum CompileError {
    #[error("Undefined variable '{name}'")]
    UndefinedVariable { name: String, span: Option<Span> },

    #[error("Undefined type '{name}'")]
    UndefinedType { name: String, span: Option<Span> },

    #[error("{}", undefined_function_message(.name, .suggestions))]
    UndefinedFunction {
        name: String,
        /// Qualified names that export the same simple name
        suggestions: Vec<String>,
        span: Option<Span>,
    },

    #[error("Undefined namespace '{namespace}'")]
    UndefinedNamespace {
        namespace: String,
        span: Option<Span>,
    },

    #[error("Ambiguous function '{name}': candidates are {}", .candidates.join(", "))]
    AmbiguousFunction {
        name: String,
        /// Fully qualified candidates, sorted
        candidates: Vec<String>,
        span: Option<Span>,
    },

    #[error("Type mismatch: expected {expected}, got {got}")]
    TypeMismatch {
        expected: String,
        got: String,
        span: Option<Span>,
    },

    #[error("Type error: {message}")]
    TypeError { message: String, span: Option<Span> },

    #[error("Cannot merge {left} with {right}")]
    IncompatibleMerge {
        left: String,
        right: String,
        span: Option<Span>,
    },

    #[error("Cannot project field '{field}'; available fields are {}", .available.join(", "))]
    InvalidProjection {
        field: String,
        available: Vec<String>,
        span: Option<Span>,
    },

    #[error("No field '{field}'; available fields are {}", .available.join(", "))]
    InvalidFieldAccess {
        field: String,
        available: Vec<String>,
        span: Option<Span>,
    },

    #[error("Operator '{op}' is not supported between {lhs} and {rhs}")]
    UnsupportedComparison {
        op: String,
        lhs: String,
        rhs: String,
        span: Option<Span>,
    },

    #[error("Arithmetic '{op}' is not supported between {lhs} and {rhs}")]
    UnsupportedArithmetic {
        op: String,
        lhs: String,
        rhs: String,
        span: Option<Span>,
    },

    #[error("Fallback type mismatch: the function returns {expected}, but the fallback is {got}")]
    FallbackTypeMismatch {
        expected: String,
        got: String,
        span: Option<Span>,
    },

    #[error("Invalid value {value} for option '{option}': {constraint}")]
    InvalidOptionValue {
        option: String,
        value: String,
        constraint: String,
        span: Option<Span>,
    },
}

fn undefined_function_message(name: &str, suggestions: &[String]) -> String {
    if suggestions.is_empty() {
        format!("Undefined function '{name}'")
    } else {
        format!(
            "Undefined function '{name}'. Did you mean: {}?",
            suggestions.join(", ")
        )
    }
}

impl CompileError {
    /// Stable machine-readable tag for the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            CompileError::UndefinedVariable { .. } => "undefined_variable",
            CompileError::UndefinedType { .. } => "undefined_type",
            CompileError::UndefinedFunction { .. } => "undefined_function",
            CompileError::UndefinedNamespace { .. } => "undefined_namespace",
            CompileError::AmbiguousFunction { .. } => "ambiguous_function",
            CompileError::TypeMismatch { .. } => "type_mismatch",
            CompileError::TypeError { .. } => "type_error",
            CompileError::IncompatibleMerge { .. } => "incompatible_merge",
            CompileError::InvalidProjection { .. } => "invalid_projection",
            CompileError::InvalidFieldAccess { .. } => "invalid_field_access",
            CompileError::UnsupportedComparison { .. } => "unsupported_comparison",
            CompileError::UnsupportedArithmetic { .. } => "unsupported_arithmetic",
            CompileError::FallbackTypeMismatch { .. } => "fallback_type_mismatch",
            CompileError::InvalidOptionValue { .. } => "invalid_option_value",
        }
    }

    /// The source span the error points at, if known.
    pub fn span(&self) -> Option<Span> {
        match self {
            CompileError::UndefinedVariable { span, .. }
            | CompileError::UndefinedType { span, .. }
            | CompileError::UndefinedFunction { span, .. }
            | CompileError::UndefinedNamespace { span, .. }
            | CompileError::AmbiguousFunction { span, .. }
            | CompileError::TypeMismatch { span, .. }
            | CompileError::TypeError { span, .. }
            | CompileError::IncompatibleMerge { span, .. }
            | CompileError::InvalidProjection { span, .. }
            | CompileError::InvalidFieldAccess { span, .. }
            | CompileError::UnsupportedComparison { span, .. }
            | CompileError::UnsupportedArithmetic { span, .. }
            | CompileError::FallbackTypeMismatch { span, .. }
            | CompileError::InvalidOptionValue { span, .. } => *span,
        }
    }
}

/// A non-fatal diagnostic accumulated alongside a successful check.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum CompileWarning {
    #[error("Option '{option}' has no effect without '{required}'")]
    OptionDependency {
        option: String,
        required: String,
        span: Option<Span>,
    },

    #[error("Retry count {value} is unusually high; consider a fallback instead")]
    HighRetryCount { value: i64, span: Option<Span> },
}

impl CompileWarning {
    /// Stable machine-readable tag for the warning kind.
    pub fn kind(&self) -> &'static str {
        match self {
            CompileWarning::OptionDependency { .. } => "option_dependency",
            CompileWarning::HighRetryCount { .. } => "high_retry_count",
        }
    }

    pub fn span(&self) -> Option<Span> {
        match self {
            CompileWarning::OptionDependency { span, .. }
            | CompileWarning::HighRetryCount { span, .. } => *span,
        }
    }
}
