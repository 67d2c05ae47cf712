//! Error taxonomy for the reconciliation workflow
//!
//! The split matters to the operator-facing caller:
//! - `Validation` is caught before any network call and is recoverable in
//!   place; no session state changes.
//! - `Gateway` is transient; the session returns to editing with all draft
//!   edits intact and the operator re-triggers the commit.
//! - `PartialCommit` is the one state the workflow cannot auto-heal: the
//!   record write landed but the approval did not. It is surfaced
//!   distinctly so the UI can say "the record is saved; retry only the
//!   approval" instead of inviting a duplicate record write.
//! - `IdentifierGeneration` is fatal to the current attempt only and is
//!   guaranteed to occur before any write.

use crate::gateway::{GatewayError, Resolution};
use shellmatch_common::{FieldKey, RecordKey};
use thiserror::Error;

/// Result type for workflow operations
pub type WorkflowResult<T> = std::result::Result<T, WorkflowError>;

/// Pre-commit validation failures (no network call has happened yet)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// No target partition (sheet) selected for the commit
    #[error("A target partition must be selected before committing")]
    MissingPartition,

    /// Proposed display name collides with another record's name
    #[error("Name '{name}' is already used by record {conflicting_id}")]
    DuplicateName { name: String, conflicting_id: String },
}

/// Errors surfaced by the reconciliation state machine
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Transient gateway failure; drafts are intact, retry is safe
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// Identifier generation failed before any write occurred
    #[error("Identifier generation failed: {0}")]
    IdentifierGeneration(GatewayError),

    /// The record write succeeded but the approval call failed. The record
    /// is saved; only the approval should be retried, with the resolution
    /// payload carried here.
    #[error("Record {} was written to partition {} but approval failed: {source}",
            record_key.primary_id, record_key.partition)]
    PartialCommit {
        record_key: RecordKey,
        resolution: Box<Resolution>,
        source: GatewayError,
    },

    /// Operation not permitted in the session's current state
    #[error("Operation '{operation}' is not valid in state {state}")]
    InvalidTransition {
        operation: &'static str,
        state: &'static str,
    },

    /// Attempted direct edit of a locked field in add-only mode
    #[error("Field '{0}' is locked; unlock it before editing")]
    LockedField(FieldKey),
}

impl WorkflowError {
    /// True when the recommended recovery is "retry the approval only"
    pub fn is_partial_commit(&self) -> bool {
        matches!(self, WorkflowError::PartialCommit { .. })
    }

    /// True when the error occurred before any external write
    pub fn occurred_before_write(&self) -> bool {
        matches!(
            self,
            WorkflowError::Validation(_)
                | WorkflowError::IdentifierGeneration(_)
                | WorkflowError::InvalidTransition { .. }
                | WorkflowError::LockedField(_)
        )
    }
}
