//! Merge pass phase.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::PhaseError;

/// Which merge pass a record is waiting for.
///
/// Serialized as the small integer the orchestrator workflow state has always
/// carried (`0` = apply, `1` = delete), so snapshots stay readable across
/// versions. Any other value is rejected with [`PhaseError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum Phase {
    /// Next merge keeps old selectors next to the new target.
    #[default]
    Apply,

    /// Next merge strips everything but the new target.
    Delete,
}

impl Phase {
    /// The phase that follows a completed merge pass.
    #[must_use]
    pub fn toggled(self) -> Self {
        match self {
            Self::Apply => Self::Delete,
            Self::Delete => Self::Apply,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Apply => "apply",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<i64> for Phase {
    type Error = PhaseError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Apply),
            1 => Ok(Self::Delete),
            other => Err(PhaseError(other)),
        }
    }
}

impl From<Phase> for i64 {
    fn from(phase: Phase) -> Self {
        match phase {
            Phase::Apply => 0,
            Phase::Delete => 1,
        }
    }
}
