//! Error types for the axiom CLI.
//!
//! Uses thiserror for derive macros and provides user-actionable error messages.

use crate::exit_codes;
use thiserror::Error;

/// Main error type for axiom operations.
///
/// Each variant maps to a specific exit code. Git and PRD write-back failures
/// inside the dispatch loop are deliberately *not* represented here: they fail
/// softly and are reported through result objects instead.
#[derive(Error, Debug)]
pub enum AxiomError {
    /// User provided invalid arguments or the workspace is in an invalid state.
    #[error("{0}")]
    UserError(String),

    /// The dispatch run finished but left failed or blocked tasks behind.
    #[error("dispatch finished with {failed} failed and {blocked} blocked task(s)")]
    DispatchIncomplete { failed: usize, blocked: usize },

    /// The session heartbeat exceeded the staleness threshold.
    #[error("session is stale: {0}")]
    StaleSession(String),

    /// Git operation failed.
    #[error("Git operation failed: {0}")]
    GitError(String),
}

impl AxiomError {
    /// Returns the appropriate exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            AxiomError::UserError(_) => exit_codes::USER_ERROR,
            AxiomError::DispatchIncomplete { .. } => exit_codes::USER_ERROR,
            AxiomError::StaleSession(_) => exit_codes::STALE_SESSION,
            AxiomError::GitError(_) => exit_codes::GIT_FAILURE,
        }
    }
}

/// Result type alias for axiom operations.
pub type Result<T> = std::result::Result<T, AxiomError>;
