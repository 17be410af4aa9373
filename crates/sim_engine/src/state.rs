//! Run lifecycle.
//!
//! ```text
//! Pending → Validating → Running → Completed
//!    │           │          ├────→ TimedOut
//!    │           │          └────→ Cancelled
//!    └───────────┴──────────┴────→ Failed
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// State of a simulation run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// Accepted, not yet validated
    Pending,
    /// Checking inputs and limits
    Validating,
    /// Batches executing
    Running,
    /// All batches finished
    Completed,
    /// Rejected or failed
    Failed,
    /// Wall-clock budget expired
    TimedOut,
    /// Cancelled through the token
    Cancelled,
}

impl RunState {
    /// Whether no further transition is possible.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::TimedOut | Self::Cancelled
        )
    }

    /// Whether `next` may follow `self`.
    pub fn can_advance(&self, next: RunState) -> bool {
        use RunState::*;
        matches!(
            (self, next),
            (Pending, Validating)
                | (Pending, Failed)
                | (Validating, Running)
                | (Validating, Failed)
                | (Running, Completed)
                | (Running, Failed)
                | (Running, TimedOut)
                | (Running, Cancelled)
        )
    }

    /// Moves to `next`.
    ///
    /// # Errors
    ///
    /// Returns the rejected pair when the transition is not allowed.
    pub fn advance(&mut self, next: RunState) -> Result<(), (RunState, RunState)> {
        if !self.can_advance(next) {
            return Err((*self, next));
        }
        *self = next;
        Ok(())
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::Validating => "validating",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::TimedOut => "timed_out",
            Self::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}
