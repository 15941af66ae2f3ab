//! Canonical error taxonomy for the crate (spec §4.9).
//!
//! Every node carries a sticky "first error"; once set, chained operations
//! on that node keep returning the same kind without doing further work.

use thiserror::Error;

/// The crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// The seven canonical error kinds named in the design.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum Error {
    #[error("node is invalid")]
    InvalidNode,

    #[error("type assertion failed: expected {expected}, found {found}")]
    TypeAssertion {
        expected: &'static str,
        found: &'static str,
    },

    #[error("index {index} out of bounds (len {len})")]
    IndexOutOfBounds { index: i64, len: usize },

    #[error("key {0:?} not found")]
    NotFound(String),

    #[error("parse error: {0}")]
    ParseError(String),

    #[error("path syntax error: {0}")]
    PathSyntaxError(String),

    #[error("function {0:?} not registered")]
    FuncNotFound(String),
}

impl Error {
    /// Whether this error should drop only the branch that produced it
    /// (§4.7 point 4) rather than aborting the whole query. Path syntax
    /// errors and missing registered functions are structural and abort
    /// evaluation; everything else (a wrong type, a missing key, an
    /// out-of-range index) is a per-item miss that just prunes that branch.
    pub fn is_branch_local(&self) -> bool {
        !matches!(self, Error::PathSyntaxError(_) | Error::FuncNotFound(_))
    }
}
