//! Reconciliation session state machine
//!
//! Drives one operator through resolving one review item: candidate
//! selection, record load (with location fallback and skeleton synthesis),
//! gated editing, and the ordered commit across the two external stores.
//!
//! Commit ordering is strict: partition check, fresh duplicate-name
//! validation, append merge, identifier generation (new-identity path),
//! record write, then approval. Identifier generation always happens
//! before any write, so a generation failure never leaves a half-written
//! record. A record write that lands without its approval is surfaced as a
//! partial commit so the operator retries only the approval.
//!
//! Load results are applied through a generation-stamped ticket: a
//! response that arrives after the operator has moved to another item
//! carries a superseded generation and is dropped without touching the
//! current session.

pub mod locks;
pub mod merge;

pub use locks::{EditMode, FieldLocks, LockState};
pub use merge::PendingAppends;

use crate::error::{ValidationError, WorkflowError, WorkflowResult};
use crate::gateway::{
    FindMetadata, GatewayError, LookupOutcome, RecordGateway, RegionHint, Resolution,
    ReviewQueueGateway,
};
use crate::notify::{CommitNotice, Notifier};
use crate::validate::validate_name;
use merge::{merge_dates, merge_notes};
use shellmatch_common::{CanonicalRecord, Candidate, FieldKey, RecordKey, ReviewItem};
use tracing::{debug, info, warn};

/// A lookup whose result has fewer populated cells than this, and no
/// existence flag, is treated as a miss and retried with the location hint.
const MIN_POPULATED_FOR_HIT: usize = 4;

/// Session lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    ItemSelected,
    CandidateChosen,
    NewIdentityChosen,
    RecordLoaded,
    Editing,
    Committing,
    Approved,
    Failed,
    Discarded,
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Idle => "Idle",
            SessionState::ItemSelected => "ItemSelected",
            SessionState::CandidateChosen => "CandidateChosen",
            SessionState::NewIdentityChosen => "NewIdentityChosen",
            SessionState::RecordLoaded => "RecordLoaded",
            SessionState::Editing => "Editing",
            SessionState::Committing => "Committing",
            SessionState::Approved => "Approved",
            SessionState::Failed => "Failed",
            SessionState::Discarded => "Discarded",
        }
    }

    /// Approved and Discarded end the session
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Approved | SessionState::Discarded)
    }
}

/// What the operator resolved the photo to
#[derive(Debug, Clone, PartialEq)]
pub enum ChosenIdentity {
    /// An existing candidate from the ranked list
    Candidate(Candidate),
    /// A freshly minted identity
    NewIdentity,
}

/// Generation-stamped handle for one in-flight record load. Applying a
/// ticket from a superseded generation is a no-op.
#[derive(Debug, Clone, Copy)]
#[must_use]
pub struct LoadTicket {
    generation: u64,
    primary_id_required: bool,
}

/// Result of a successful commit
#[derive(Debug, Clone)]
pub struct CommitOutcome {
    pub record_key: RecordKey,
    pub resolution: Resolution,
    pub created_new_identity: bool,
}

/// One reconciliation attempt for one review item. Ephemeral and
/// client-side; never persisted.
#[derive(Debug)]
pub struct ReconciliationSession {
    state: SessionState,
    mode: EditMode,
    item: Option<ReviewItem>,
    chosen: Option<ChosenIdentity>,
    draft: CanonicalRecord,
    /// True when the draft came from an existing store row (matched path
    /// with a real hit); false for skeletons and new identities.
    record_exists: bool,
    /// Operator-selected target partition for the commit
    partition: Option<String>,
    locks: FieldLocks,
    pending: PendingAppends,
    /// Cached once generated; never regenerated within the same session
    generated_primary_id: Option<String>,
    find_metadata: FindMetadata,
    /// Set when a record write landed but its approval did not. While set,
    /// a full re-commit is refused (it would write the record a second
    /// time); only `retry_approval` clears it.
    awaiting_approval_retry: bool,
    /// Liveness generation; bumped on every item switch and reset
    generation: u64,
}

impl ReconciliationSession {
    pub fn new(mode: EditMode) -> Self {
        Self {
            state: SessionState::Idle,
            mode,
            item: None,
            chosen: None,
            draft: CanonicalRecord::default(),
            record_exists: false,
            partition: None,
            locks: FieldLocks::new(mode),
            pending: PendingAppends::default(),
            generated_primary_id: None,
            find_metadata: FindMetadata::default(),
            awaiting_approval_retry: false,
            generation: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn draft(&self) -> &CanonicalRecord {
        &self.draft
    }

    pub fn pending_appends(&self) -> &PendingAppends {
        &self.pending
    }

    pub fn item(&self) -> Option<&ReviewItem> {
        self.item.as_ref()
    }

    pub fn chosen(&self) -> Option<&ChosenIdentity> {
        self.chosen.as_ref()
    }

    pub fn locks(&self) -> &FieldLocks {
        &self.locks
    }

    pub fn partition(&self) -> Option<&str> {
        self.partition.as_deref()
    }

    pub fn generated_primary_id(&self) -> Option<&str> {
        self.generated_primary_id.as_deref()
    }

    pub fn record_exists(&self) -> bool {
        self.record_exists
    }

    fn require_state(
        &self,
        operation: &'static str,
        allowed: &[SessionState],
    ) -> WorkflowResult<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(WorkflowError::InvalidTransition {
                operation,
                state: self.state.name(),
            })
        }
    }

    /// Open a review item, resetting all session fields. Permitted from
    /// any state except mid-commit.
    pub fn select_item(&mut self, item: ReviewItem) -> WorkflowResult<()> {
        if self.state == SessionState::Committing {
            return Err(WorkflowError::InvalidTransition {
                operation: "select_item",
                state: self.state.name(),
            });
        }

        self.generation += 1;
        debug!(item_id = %item.id, generation = self.generation, "Item selected");

        self.item = Some(item);
        self.chosen = None;
        self.draft = CanonicalRecord::default();
        self.record_exists = false;
        self.partition = None;
        self.locks = FieldLocks::new(self.mode);
        self.pending = PendingAppends::default();
        self.generated_primary_id = None;
        self.find_metadata = FindMetadata::default();
        self.awaiting_approval_retry = false;
        self.state = SessionState::ItemSelected;
        Ok(())
    }

    /// Choose one of the item's ranked candidates. The record load follows
    /// via `load_record` (or `begin_load`/`apply_load` for callers that
    /// run the fetch elsewhere).
    pub fn choose_candidate(&mut self, candidate: Candidate) -> WorkflowResult<()> {
        self.require_state("choose_candidate", &[SessionState::ItemSelected])?;
        debug!(turtle_ref = %candidate.turtle_ref, rank = candidate.rank, "Candidate chosen");
        self.chosen = Some(ChosenIdentity::Candidate(candidate));
        self.state = SessionState::CandidateChosen;
        Ok(())
    }

    /// Resolve to a freshly minted identity: no fetch, editing begins with
    /// an empty draft.
    pub fn choose_new_identity(&mut self) -> WorkflowResult<()> {
        self.require_state("choose_new_identity", &[SessionState::ItemSelected])?;
        self.chosen = Some(ChosenIdentity::NewIdentity);
        self.state = SessionState::NewIdentityChosen;
        self.draft = CanonicalRecord::default();
        self.record_exists = false;
        self.state = SessionState::Editing;
        Ok(())
    }

    /// Primary id of the chosen candidate, when on the matched path
    pub fn chosen_candidate_id(&self) -> Option<&str> {
        match &self.chosen {
            Some(ChosenIdentity::Candidate(c)) => Some(c.turtle_ref.as_str()),
            _ => None,
        }
    }

    /// Stamp a ticket for the pending record load (matched path)
    pub fn begin_load(&mut self) -> WorkflowResult<LoadTicket> {
        self.require_state("begin_load", &[SessionState::CandidateChosen])?;
        Ok(LoadTicket {
            generation: self.generation,
            primary_id_required: true,
        })
    }

    /// Region hint derived from the item's submitter metadata, for the
    /// fallback lookup. Label format is "State/Location".
    pub fn fallback_hint(&self) -> Option<RegionHint> {
        let label = self.item.as_ref()?.metadata.location_label.trim();
        if label.is_empty() {
            return None;
        }
        let (state, location) = match label.split_once('/') {
            Some((s, l)) => (s.trim(), l.trim()),
            None => (label, ""),
        };
        Some(RegionHint {
            partition: if location.is_empty() {
                Some(state.to_string())
            } else {
                Some(location.to_string())
            },
            state: state.to_string(),
            location: location.to_string(),
        })
    }

    /// Apply the outcome of a record load. Returns false (and mutates
    /// nothing) when the ticket's generation has been superseded.
    ///
    /// `outcome == None` means the lookup produced nothing usable; a
    /// skeleton draft with only the candidate's identifier is synthesized.
    /// The transition into Editing always succeeds.
    pub fn apply_load(&mut self, ticket: LoadTicket, outcome: Option<LookupOutcome>) -> bool {
        if ticket.generation != self.generation {
            debug!(
                ticket_generation = ticket.generation,
                current_generation = self.generation,
                "Dropping stale load result"
            );
            return false;
        }
        if self.state != SessionState::CandidateChosen {
            return false;
        }
        let _ = ticket.primary_id_required;

        match outcome {
            Some(found) => {
                self.draft = found.record;
                self.record_exists = true;
                // A row can come back without its identifier cell filled
                if self.draft.primary_id.is_empty() {
                    if let Some(id) = self.chosen_candidate_id().map(str::to_string) {
                        self.draft.primary_id = id;
                    }
                }
            }
            None => {
                let id = self
                    .chosen_candidate_id()
                    .map(str::to_string)
                    .unwrap_or_default();
                info!(primary_id = %id, "No record found; synthesizing skeleton draft");
                self.draft = CanonicalRecord::skeleton(id);
                self.record_exists = false;
            }
        }

        self.state = SessionState::RecordLoaded;
        self.state = SessionState::Editing;
        true
    }

    /// Full matched-path load: keyed lookup, then the location-hint
    /// fallback when the first result is missing or looks empty, then
    /// skeleton synthesis.
    ///
    /// Transport errors during the load degrade to the skeleton path (the
    /// record store historically surfaces transient errors as empty
    /// results); the operator can still resolve the item.
    pub async fn load_record<R: RecordGateway>(&mut self, records: &R) -> WorkflowResult<()> {
        let ticket = self.begin_load()?;
        let primary_id = self
            .chosen_candidate_id()
            .map(str::to_string)
            .unwrap_or_default();

        let usable = |outcome: &LookupOutcome| {
            outcome.exists || outcome.record.populated_field_count() >= MIN_POPULATED_FOR_HIT
        };

        let mut resolved: Option<LookupOutcome> = None;

        match records.get(&primary_id, None).await {
            Ok(outcome) if usable(&outcome) => resolved = Some(outcome),
            Ok(_) => {}
            Err(e) => warn!(primary_id = %primary_id, "Keyed lookup failed: {}", e),
        }

        if resolved.is_none() {
            if let Some(hint) = self.fallback_hint() {
                debug!(primary_id = %primary_id, ?hint, "Retrying lookup with location hint");
                match records.get(&primary_id, Some(&hint)).await {
                    Ok(outcome) if usable(&outcome) => resolved = Some(outcome),
                    Ok(_) => {}
                    Err(e) => warn!(primary_id = %primary_id, "Fallback lookup failed: {}", e),
                }
            }
        }

        self.apply_load(ticket, resolved);
        Ok(())
    }

    /// Edit one draft field.
    ///
    /// In add-only mode the two append-only fields always route to staged
    /// appends (appends cannot destroy existing data); any other locked
    /// field is rejected with a lock-violation the caller must surface.
    pub fn edit_field(&mut self, key: FieldKey, value: &str) -> WorkflowResult<()> {
        self.require_state("edit_field", &[SessionState::Editing, SessionState::Failed])?;
        self.state = SessionState::Editing;

        if self.mode == EditMode::AddOnly && key.is_append_only() {
            self.stage_append(key, value)?;
            return Ok(());
        }

        if !self.locks.can_edit(key) {
            return Err(WorkflowError::LockedField(key));
        }

        self.draft.set(key, value);
        Ok(())
    }

    /// Stage append text for one of the two append-only fields. Merged
    /// into the draft at commit time, not before.
    pub fn stage_append(&mut self, key: FieldKey, text: &str) -> WorkflowResult<()> {
        self.require_state(
            "stage_append",
            &[SessionState::Editing, SessionState::Failed],
        )?;
        self.state = SessionState::Editing;

        match key {
            FieldKey::Notes => {
                self.pending.notes = merge_notes(&self.pending.notes, text);
                Ok(())
            }
            FieldKey::DatesRefound => {
                self.pending.dates_refound = merge_dates(&self.pending.dates_refound, text);
                Ok(())
            }
            other => Err(WorkflowError::LockedField(other)),
        }
    }

    /// Stage the unlock confirmation prompt for a field
    pub fn request_unlock(&mut self, key: FieldKey) -> WorkflowResult<bool> {
        self.require_state(
            "request_unlock",
            &[SessionState::Editing, SessionState::Failed],
        )?;
        Ok(self.locks.request_unlock(key))
    }

    /// Confirm a previously requested unlock for exactly this field
    pub fn confirm_unlock(&mut self, key: FieldKey) -> WorkflowResult<bool> {
        self.require_state(
            "confirm_unlock",
            &[SessionState::Editing, SessionState::Failed],
        )?;
        Ok(self.locks.confirm_unlock(key))
    }

    /// Select the target partition (sheet) for the commit
    pub fn set_partition(&mut self, partition: impl Into<String>) -> WorkflowResult<()> {
        self.require_state(
            "set_partition",
            &[SessionState::Editing, SessionState::Failed],
        )?;
        let partition = partition.into();
        self.partition = if partition.trim().is_empty() {
            None
        } else {
            Some(partition.trim().to_string())
        };
        Ok(())
    }

    /// Attach operator-entered flag metadata to the eventual approval
    pub fn set_find_metadata(&mut self, metadata: FindMetadata) -> WorkflowResult<()> {
        self.require_state(
            "set_find_metadata",
            &[SessionState::Editing, SessionState::Failed],
        )?;
        self.find_metadata = metadata;
        Ok(())
    }

    /// Identifier used for self-exclusion in the duplicate-name check
    fn own_identifier(&self) -> String {
        if let Some(id) = self.chosen_candidate_id() {
            return id.to_string();
        }
        if !self.draft.primary_id.is_empty() {
            return self.draft.primary_id.clone();
        }
        self.generated_primary_id.clone().unwrap_or_default()
    }

    /// Commit the resolution across the record store and the review queue.
    ///
    /// Strict step order; each step completes before the next begins.
    /// Failures map to the error taxonomy: validation failures return the
    /// session to Editing with every draft edit intact; gateway failures
    /// before the write are fully retryable; an approval failure after a
    /// successful write is a partial commit, and the recovery path is
    /// `retry_approval` with the resolution from the error, never a
    /// re-run of the whole commit. A session holding an unretried partial
    /// commit refuses further full commits (the record is already
    /// written; re-committing would write it again).
    pub async fn commit<R, Q, N>(
        &mut self,
        records: &R,
        queue: &Q,
        notifier: &N,
    ) -> WorkflowResult<CommitOutcome>
    where
        R: RecordGateway,
        Q: ReviewQueueGateway,
        N: Notifier,
    {
        self.require_state("commit", &[SessionState::Editing, SessionState::Failed])?;

        // The record write already landed; only the approval may be retried
        if self.awaiting_approval_retry {
            return Err(WorkflowError::InvalidTransition {
                operation: "commit",
                state: "Failed (awaiting approval retry)",
            });
        }

        // Step 1: target partition is required; fail fast with no state
        // change beyond staying editable.
        let partition = match &self.partition {
            Some(p) if !p.trim().is_empty() => p.clone(),
            _ => {
                self.state = SessionState::Editing;
                return Err(ValidationError::MissingPartition.into());
            }
        };

        let item_id = self
            .item
            .as_ref()
            .map(|i| i.id.clone())
            .ok_or(WorkflowError::InvalidTransition {
                operation: "commit",
                state: "Editing without item",
            })?;

        self.state = SessionState::Committing;
        info!(item_id = %item_id, partition = %partition, "Commit started");

        // Step 2: fresh name list, never the session's cached copy. The
        // list can change between record load and commit.
        let names = match records.list_all_names().await {
            Ok(names) => names,
            Err(e) => return self.fail_commit(e.into()),
        };
        if let Err(e) = validate_name(&self.draft.name, &self.own_identifier(), &names) {
            // Validation failures are recoverable in place
            self.state = SessionState::Editing;
            return Err(e.into());
        }

        // Step 3: merge staged appends into the draft. Clearing the stage
        // afterwards keeps a retried commit from double-appending.
        if !self.pending.is_empty() {
            self.draft.notes = merge_notes(&self.draft.notes, &self.pending.notes);
            self.draft.dates_refound =
                merge_dates(&self.draft.dates_refound, &self.pending.dates_refound);
            self.pending.clear();
        }

        let new_identity = matches!(self.chosen, Some(ChosenIdentity::NewIdentity));

        // Step 4: identifier generation, new-identity path only, strictly
        // before any write. The generated primary id is cached for the
        // session and never regenerated.
        if new_identity {
            if self.generated_primary_id.is_none() {
                match records
                    .generate_primary_id(&self.draft.general_location, &self.draft.location)
                    .await
                {
                    Ok(id) => {
                        debug!(primary_id = %id, "Primary id generated");
                        self.generated_primary_id = Some(id);
                    }
                    Err(e) => return self.fail_commit(WorkflowError::IdentifierGeneration(e)),
                }
            }
            // The cached id may come from an earlier failed attempt
            let id = self
                .generated_primary_id
                .clone()
                .unwrap_or_default();
            self.draft.primary_id = id;

            // Partition-scoped biology id, also before any write
            if self.draft.id.trim().is_empty() {
                let gender = normalize_gender(&self.draft.sex);
                match records.generate_biology_id(gender, &partition).await {
                    Ok(id) => self.draft.id = id,
                    Err(e) => return self.fail_commit(WorkflowError::IdentifierGeneration(e)),
                }
            }
        }

        // Step 5: the record write
        let primary_id = if new_identity {
            match records.create(&partition, &self.draft).await {
                Ok(id) => id,
                Err(e) => return self.fail_commit(e.into()),
            }
        } else {
            let id = self.own_identifier();
            match records.update(&id, &partition, &self.draft).await {
                Ok(()) => id,
                Err(e) => return self.fail_commit(e.into()),
            }
        };

        let record_key = RecordKey::new(primary_id.clone(), partition.clone());

        // Step 6: approval. A failure here is the accepted inconsistency
        // window: the record write is not rolled back.
        let mut resolution = if new_identity {
            Resolution::new_identity(primary_id.clone(), partition.clone())
        } else {
            Resolution::matched(primary_id.clone())
        };
        if !self.find_metadata.is_empty() {
            resolution.find_metadata = Some(self.find_metadata.clone());
        }
        if let Some(item) = &self.item {
            let label = item.metadata.location_label.trim();
            if !label.is_empty() {
                resolution.location_label = Some(label.to_string());
            }
        }

        if let Err(e) = queue.approve(&item_id, &resolution).await {
            warn!(
                item_id = %item_id,
                primary_id = %record_key.primary_id,
                "Record written but approval failed: {}",
                e
            );
            self.state = SessionState::Failed;
            self.awaiting_approval_retry = true;
            return Err(WorkflowError::PartialCommit {
                record_key,
                resolution: Box::new(resolution),
                source: e,
            });
        }

        self.state = SessionState::Approved;
        info!(
            item_id = %item_id,
            primary_id = %record_key.primary_id,
            new_identity,
            "Commit approved"
        );

        // Fire-and-forget; the commit never depends on the notification
        if new_identity {
            notifier.notify(CommitNotice {
                item_id,
                record_key: record_key.clone(),
                created_new_identity: true,
            });
        }

        Ok(CommitOutcome {
            record_key,
            resolution,
            created_new_identity: new_identity,
        })
    }

    fn fail_commit<T>(&mut self, err: WorkflowError) -> WorkflowResult<T> {
        warn!("Commit failed: {}", err);
        self.state = SessionState::Failed;
        Err(err)
    }

    /// Return a failed session to editing for another attempt
    pub fn resume_editing(&mut self) -> WorkflowResult<()> {
        self.require_state("resume_editing", &[SessionState::Failed])?;
        self.state = SessionState::Editing;
        Ok(())
    }

    /// Abandon the session. Reachable from any non-terminal state; mutates
    /// neither the review item nor any canonical record.
    pub fn discard(&mut self) -> WorkflowResult<()> {
        if self.state.is_terminal() {
            return Err(WorkflowError::InvalidTransition {
                operation: "discard",
                state: self.state.name(),
            });
        }
        self.generation += 1;
        self.item = None;
        self.chosen = None;
        self.draft = CanonicalRecord::default();
        self.record_exists = false;
        self.partition = None;
        self.locks = FieldLocks::new(self.mode);
        self.pending = PendingAppends::default();
        self.generated_primary_id = None;
        self.find_metadata = FindMetadata::default();
        self.awaiting_approval_retry = false;
        self.state = SessionState::Discarded;
        Ok(())
    }
}

/// Map a free-text sex cell to the gender letter the id generator expects
fn normalize_gender(sex: &str) -> &'static str {
    match sex.trim().to_ascii_uppercase().as_str() {
        "M" => "M",
        "F" => "F",
        "J" => "J",
        _ => "U",
    }
}

/// Convenience: a retried approval after a partial commit. Sends the
/// identical resolution payload; the queue's approve is idempotent.
pub async fn retry_approval<Q: ReviewQueueGateway>(
    session: &mut ReconciliationSession,
    queue: &Q,
    item_id: &str,
    resolution: &Resolution,
) -> WorkflowResult<()> {
    session.require_state("retry_approval", &[SessionState::Failed])?;
    queue.approve(item_id, resolution).await.map_err(|e| {
        warn!(item_id, "Approval retry failed: {}", e);
        WorkflowError::Gateway(e)
    })?;
    session.awaiting_approval_retry = false;
    session.state = SessionState::Approved;
    info!(item_id, "Approval retry succeeded");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gender_cases() -> Vec<(&'static str, &'static str)> {
        vec![
            ("M", "M"),
            ("f", "F"),
            (" j ", "J"),
            ("", "U"),
            ("unknown", "U"),
        ]
    }

    #[test]
    fn gender_normalization() {
        for (input, expected) in gender_cases() {
            assert_eq!(normalize_gender(input), expected, "input {input:?}");
        }
    }

    #[test]
    fn state_names_are_stable() {
        assert_eq!(SessionState::Idle.name(), "Idle");
        assert_eq!(SessionState::Committing.name(), "Committing");
        assert!(SessionState::Approved.is_terminal());
        assert!(SessionState::Discarded.is_terminal());
        assert!(!SessionState::Failed.is_terminal());
    }
}
