//! Error taxonomy for the query pipeline.
//!
//! Three classes, surfaced separately so callers can react differently:
//!
//! - [`SyntaxError`] - the query text does not match the grammar; reported
//!   with the offending position, surfaced verbatim.
//! - [`CompileError`] - semantic problems found during assembly,
//!   optimization, or SQL lowering (unknown named query, circular reference,
//!   mismatched range types, unregistered filter, ...). Compilation aborts
//!   entirely; no partial SQL is ever produced.
//! - [`ExecError`] - the data source or a pluggable filter failed during
//!   execution. Propagated to the caller, never retried here.

use std::fmt;

/// The query text does not match the MQL grammar.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntaxError {
    pub message: String,
    /// Character offset into the query text.
    pub position: usize,
}

impl SyntaxError {
    pub fn new(message: impl Into<String>, position: usize) -> Self {
        SyntaxError {
            message: message.into(),
            position,
        }
    }
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MQL syntax error at position {}: {}",
            self.position, self.message
        )
    }
}

impl std::error::Error for SyntaxError {}

/// A semantic problem discovered before execution.
#[derive(Debug, Clone, PartialEq)]
pub enum CompileError {
    /// `query ns:name` refers to a named query that does not exist.
    UnknownNamedQuery { namespace: String, name: String },

    /// A named query transitively references itself.
    CircularNamedQuery { namespace: String, name: String },

    /// A `filter name(...)` call names a filter that is not registered.
    UnknownFilter(String),

    /// A column-backed attribute name that is not a known column.
    UnknownAttribute(String),

    /// Range bounds of differing literal types, e.g. `x in 1:"b"`.
    RangeTypeMismatch { low: String, high: String },

    /// DNF expansion exceeded the term bound (see `dnf::MAX_DNF_TERMS`).
    TooManyTerms { terms: usize, limit: usize },

    /// A dataset pattern that cannot be compiled (e.g. an invalid regexp).
    BadDatasetPattern(String),

    /// A tree shape the compiler cannot accept. Reaching this is a bug in
    /// the pipeline, not a user error; the message names the node.
    MalformedTree(String),
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileError::UnknownNamedQuery { namespace, name } => {
                write!(f, "named query {}:{} not found", namespace, name)
            }
            CompileError::CircularNamedQuery { namespace, name } => {
                write!(f, "named query {}:{} references itself", namespace, name)
            }
            CompileError::UnknownFilter(name) => write!(f, "filter '{}' is not registered", name),
            CompileError::UnknownAttribute(name) => {
                write!(f, "unrecognized attribute name '{}'", name)
            }
            CompileError::RangeTypeMismatch { low, high } => {
                write!(f, "range ends must be of the same type, got {}:{}", low, high)
            }
            CompileError::TooManyTerms { terms, limit } => write!(
                f,
                "metadata expression expands to {} DNF terms, limit is {}",
                terms, limit
            ),
            CompileError::BadDatasetPattern(p) => write!(f, "bad dataset pattern '{}'", p),
            CompileError::MalformedTree(what) => {
                write!(f, "internal error: malformed query tree ({})", what)
            }
        }
    }
}

impl std::error::Error for CompileError {}

/// The storage engine or a pluggable filter failed while producing results.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecError {
    /// Error reported by the data source.
    Source(String),

    /// Error raised by a pluggable filter.
    Filter { name: String, message: String },

    /// A metadata expression could not be evaluated in process
    /// (e.g. an invalid regular expression in a match operator).
    Eval(String),
}

impl fmt::Display for ExecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecError::Source(msg) => write!(f, "data source error: {}", msg),
            ExecError::Filter { name, message } => {
                write!(f, "filter '{}' failed: {}", name, message)
            }
            ExecError::Eval(msg) => write!(f, "evaluation error: {}", msg),
        }
    }
}

impl std::error::Error for ExecError {}

/// Top-level error for the facade API.
#[derive(Debug, Clone, PartialEq)]
pub enum MqlError {
    Syntax(SyntaxError),
    Compile(CompileError),
    Execution(ExecError),
}

impl fmt::Display for MqlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MqlError::Syntax(e) => e.fmt(f),
            MqlError::Compile(e) => write!(f, "MQL compilation error: {}", e),
            MqlError::Execution(e) => write!(f, "MQL execution error: {}", e),
        }
    }
}

impl std::error::Error for MqlError {}

impl From<SyntaxError> for MqlError {
    fn from(e: SyntaxError) -> Self {
        MqlError::Syntax(e)
    }
}

impl From<CompileError> for MqlError {
    fn from(e: CompileError) -> Self {
        MqlError::Compile(e)
    }
}

impl From<ExecError> for MqlError {
    fn from(e: ExecError) -> Self {
        MqlError::Execution(e)
    }
}
