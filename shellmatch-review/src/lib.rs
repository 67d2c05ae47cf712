//! Identity-reconciliation workflow for Shellmatch
//!
//! Resolves a submitted photo against a ranked candidate list: the
//! operator picks an existing canonical record or mints a new one, edits
//! the draft under per-field access control, and commits the result across
//! the record store and the review queue.
//!
//! The two stores fail independently and there is no distributed
//! transaction; the commit protocol sequences the calls and surfaces the
//! one uncloseable gap (record written, approval failed) as a distinct
//! partial-commit error with a retry-approval-only recovery path.

pub mod error;
pub mod gateway;
pub mod notify;
pub mod session;
pub mod validate;

pub use error::{ValidationError, WorkflowError, WorkflowResult};
pub use gateway::{
    FindMetadata, GatewayError, LookupOutcome, NameEntry, RecordGateway, RecordStoreClient,
    RegionHint, Resolution, ResolutionTarget, ReviewQueueClient, ReviewQueueGateway,
};
pub use notify::{CommitNotice, NoopNotifier, Notifier, WebhookNotifier};
pub use session::{
    CommitOutcome, EditMode, LoadTicket, ReconciliationSession, SessionState,
};
