//! Shared types for Shellmatch
//!
//! Domain model (canonical records, review items), the record field
//! catalog, configuration loading, and the common error type used by the
//! workflow crates.

pub mod config;
pub mod error;
pub mod fields;
pub mod model;

pub use error::{Error, Result};
pub use fields::FieldKey;
pub use model::{
    CanonicalRecord, Candidate, EvidenceImage, EvidenceKind, LocationHint, LocationSource,
    RecordKey, ReviewItem, ReviewStatus, SubmissionMetadata,
};
