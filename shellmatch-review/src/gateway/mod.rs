//! Gateway client contracts for the two external stores
//!
//! The workflow talks to two independently-failing systems: the
//! spreadsheet-backed canonical record store and the review queue. Both are
//! expressed as traits so the state machine can be driven against
//! recording fakes in tests; the `records` and `queue` submodules provide
//! the HTTP implementations.
//!
//! There is no distributed transaction across the two stores; the commit
//! protocol in `session` sequences the calls and surfaces the gap in its
//! error taxonomy.

pub mod queue;
pub mod records;

pub use queue::ReviewQueueClient;
pub use records::RecordStoreClient;

use serde::{Deserialize, Serialize};
use shellmatch_common::{CanonicalRecord, EvidenceKind, ReviewItem};
use thiserror::Error;

/// Transport-level gateway failure.
///
/// A timeout is a distinct kind, never conflated with "not found": keyed
/// lookups legitimately miss for valid candidates, and that routes to the
/// skeleton path rather than here.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Gateway returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Failed to decode gateway response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GatewayError::Timeout(err.to_string())
        } else if err.is_decode() {
            GatewayError::Decode(err.to_string())
        } else {
            GatewayError::Network(err.to_string())
        }
    }
}

/// Result type for gateway calls
pub type GatewayResult<T> = std::result::Result<T, GatewayError>;

/// Partition/location hint for the fallback record lookup
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegionHint {
    /// Partition (sheet) name, when known
    pub partition: Option<String>,
    /// General region (e.g. state)
    pub state: String,
    /// Specific location within the region
    pub location: String,
}

/// Outcome of a keyed record lookup. `exists` is the store's own existence
/// flag; the record may still be near-empty for rows that were only ever
/// partially entered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupOutcome {
    pub record: CanonicalRecord,
    pub exists: bool,
}

/// One `(name, primary_id)` pair from the record store's name listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameEntry {
    pub name: String,
    pub primary_id: String,
}

/// Canonical record store client contract
pub trait RecordGateway {
    /// Keyed lookup. Not-found is not an error: it comes back as
    /// `exists == false` with whatever cells the store could produce.
    fn get(
        &self,
        primary_id: &str,
        hint: Option<&RegionHint>,
    ) -> impl std::future::Future<Output = GatewayResult<LookupOutcome>> + Send;

    /// Create a new record in the given partition; returns the primary id
    /// the store filed it under.
    fn create(
        &self,
        partition: &str,
        record: &CanonicalRecord,
    ) -> impl std::future::Future<Output = GatewayResult<String>> + Send;

    /// Update an existing record by key
    fn update(
        &self,
        primary_id: &str,
        partition: &str,
        record: &CanonicalRecord,
    ) -> impl std::future::Future<Output = GatewayResult<()>> + Send;

    /// Generate a new globally unique primary id, keyed by region attrs
    fn generate_primary_id(
        &self,
        state: &str,
        location: &str,
    ) -> impl std::future::Future<Output = GatewayResult<String>> + Send;

    /// Generate the next partition-scoped biology id for a gender letter
    /// (M/F/J, anything else is treated as U upstream)
    fn generate_biology_id(
        &self,
        gender: &str,
        partition: &str,
    ) -> impl std::future::Future<Output = GatewayResult<String>> + Send;

    /// List partitions (sheet tabs), backup tabs excluded
    fn list_partitions(
        &self,
    ) -> impl std::future::Future<Output = GatewayResult<Vec<String>>> + Send;

    /// Full current `(name, primary_id)` listing across all partitions.
    /// Duplicate-name validation must call this at commit time, never a
    /// cached copy.
    fn list_all_names(
        &self,
    ) -> impl std::future::Future<Output = GatewayResult<Vec<NameEntry>>> + Send;

    /// Create a new partition with the standard column headers
    fn create_partition(
        &self,
        name: &str,
    ) -> impl std::future::Future<Output = GatewayResult<()>> + Send;
}

/// Operator-entered flags forwarded with an approval
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub microhabitat_uploaded: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub physical_flag: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digital_flag: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collected_to_lab: Option<bool>,
}

impl FindMetadata {
    pub fn is_empty(&self) -> bool {
        self.microhabitat_uploaded.is_none()
            && self.physical_flag.is_none()
            && self.digital_flag.is_none()
            && self.collected_to_lab.is_none()
    }
}

/// Matched-vs-new disambiguation for an approval payload. The wire format
/// carries `matched_identity` XOR `new_identity`+`new_partition`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResolutionTarget {
    Matched {
        matched_identity: String,
    },
    NewIdentity {
        new_identity: String,
        new_partition: String,
    },
}

/// Full approval payload: the resolution target plus any operator-entered
/// flag/location metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    #[serde(flatten)]
    pub target: ResolutionTarget,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub find_metadata: Option<FindMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_label: Option<String>,
}

impl Resolution {
    pub fn matched(primary_id: impl Into<String>) -> Self {
        Self {
            target: ResolutionTarget::Matched {
                matched_identity: primary_id.into(),
            },
            find_metadata: None,
            location_label: None,
        }
    }

    pub fn new_identity(primary_id: impl Into<String>, partition: impl Into<String>) -> Self {
        Self {
            target: ResolutionTarget::NewIdentity {
                new_identity: primary_id.into(),
                new_partition: partition.into(),
            },
            find_metadata: None,
            location_label: None,
        }
    }
}

/// One evidentiary image to attach to a pending item
#[derive(Debug, Clone)]
pub struct EvidenceUpload {
    pub filename: String,
    pub kind: EvidenceKind,
    pub bytes: Vec<u8>,
}

/// Review queue client contract
pub trait ReviewQueueGateway {
    /// List pending items
    fn list(&self) -> impl std::future::Future<Output = GatewayResult<Vec<ReviewItem>>> + Send;

    /// Mark an item resolved. This is the sole pending-to-resolved
    /// transition; the call is idempotent upstream, so retrying after a
    /// partial commit is safe.
    fn approve(
        &self,
        item_id: &str,
        resolution: &Resolution,
    ) -> impl std::future::Future<Output = GatewayResult<()>> + Send;

    /// Discard an item without processing (junk/spam)
    fn discard(&self, item_id: &str)
        -> impl std::future::Future<Output = GatewayResult<()>> + Send;

    /// Attach evidentiary images to a pending item
    fn add_evidence(
        &self,
        item_id: &str,
        images: &[EvidenceUpload],
    ) -> impl std::future::Future<Output = GatewayResult<()>> + Send;

    /// Remove one evidentiary image from a pending item
    fn remove_evidence(
        &self,
        item_id: &str,
        filename: &str,
    ) -> impl std::future::Future<Output = GatewayResult<()>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matched_resolution_serializes_flat() {
        let res = Resolution::matched("T42");
        let json = serde_json::to_value(&res).unwrap();
        assert_eq!(json["matched_identity"], "T42");
        assert!(json.get("new_identity").is_none());
        assert!(json.get("find_metadata").is_none());
    }

    #[test]
    fn new_identity_resolution_carries_partition() {
        let mut res = Resolution::new_identity("NE-0043", "Nebraska");
        res.find_metadata = Some(FindMetadata {
            digital_flag: Some(true),
            ..Default::default()
        });
        let json = serde_json::to_value(&res).unwrap();
        assert_eq!(json["new_identity"], "NE-0043");
        assert_eq!(json["new_partition"], "Nebraska");
        assert_eq!(json["find_metadata"]["digital_flag"], true);
        assert!(json.get("matched_identity").is_none());
    }
}
