//! Error types for placement identifiers and run state.

use thiserror::Error;

/// Errors that can occur when building or parsing a deployment-unit anchor.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AnchorError {
    /// A required segment is empty.
    #[error("deployment unit {field} cannot be empty")]
    Empty { field: &'static str },

    /// A segment contains a character that would break path encoding.
    #[error("invalid deployment unit {field} '{value}': must not contain '/', '?' or '#'")]
    InvalidSegment { field: &'static str, value: String },

    /// The anchor string does not have the expected shape.
    #[error("invalid status anchor '{anchor}': {reason}")]
    Malformed { anchor: String, reason: String },
}

impl AnchorError {
    /// Returns true if this error indicates a missing segment.
    pub fn is_empty(&self) -> bool {
        matches!(self, AnchorError::Empty { .. })
    }
}

/// A record carries a phase value outside {Apply, Delete}.
///
/// Only reachable when decoding persisted run state.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("{0} is a bad phase")]
pub struct PhaseError(pub i64);
