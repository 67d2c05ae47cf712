//! Per-field edit locking for add-only operating mode
//!
//! In add-only mode every record field starts locked except the two
//! append-only fields, which are never lockable (they only ever accept
//! staged appends, so they cannot destroy existing data). Unlocking is a
//! two-step gate per exact field key: a request stages a confirmation
//! prompt, and only the matching confirm actually unlocks. The
//! request/confirm distinction is first-class state, not a UI flag.

use shellmatch_common::FieldKey;
use std::collections::HashMap;

/// Operating mode supplied by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditMode {
    /// All fields freely editable
    Unrestricted,
    /// Existing values read-only unless explicitly unlocked; text fields
    /// accept appends instead
    AddOnly,
}

/// Two-step unlock gate for one field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    Locked,
    /// Unlock requested, confirmation pending
    PendingConfirm,
    Unlocked,
}

/// Lock table for one reconciliation session
#[derive(Debug, Clone)]
pub struct FieldLocks {
    mode: EditMode,
    states: HashMap<FieldKey, LockState>,
}

impl FieldLocks {
    /// Fresh lock table: in add-only mode all lockable fields start locked
    pub fn new(mode: EditMode) -> Self {
        let mut states = HashMap::new();
        if mode == EditMode::AddOnly {
            for key in FieldKey::ALL {
                if !key.is_append_only() {
                    states.insert(key, LockState::Locked);
                }
            }
        }
        Self { mode, states }
    }

    pub fn mode(&self) -> EditMode {
        self.mode
    }

    /// Current gate state for a field. Append-only fields and every field
    /// in unrestricted mode report `Unlocked`.
    pub fn state(&self, key: FieldKey) -> LockState {
        self.states.get(&key).copied().unwrap_or(LockState::Unlocked)
    }

    /// True if a direct overwrite of this field is currently permitted.
    /// Append-only fields are never directly writable in add-only mode;
    /// they take staged appends instead.
    pub fn can_edit(&self, key: FieldKey) -> bool {
        match self.mode {
            EditMode::Unrestricted => true,
            EditMode::AddOnly => {
                if key.is_append_only() {
                    false
                } else {
                    self.state(key) == LockState::Unlocked
                }
            }
        }
    }

    /// Stage the confirmation prompt for one field. Returns false when the
    /// field has no lock to release (unrestricted mode, append-only field,
    /// or already unlocked).
    pub fn request_unlock(&mut self, key: FieldKey) -> bool {
        match self.states.get(&key) {
            Some(LockState::Locked) => {
                self.states.insert(key, LockState::PendingConfirm);
                true
            }
            Some(LockState::PendingConfirm) => true,
            _ => false,
        }
    }

    /// Confirm a previously requested unlock for exactly this field.
    /// Confirming without a pending request is a no-op (returns false);
    /// no other field's state is touched.
    pub fn confirm_unlock(&mut self, key: FieldKey) -> bool {
        match self.states.get(&key) {
            Some(LockState::PendingConfirm) => {
                self.states.insert(key, LockState::Unlocked);
                true
            }
            _ => false,
        }
    }

    /// Cancel a pending confirmation, returning the field to locked
    pub fn cancel_unlock(&mut self, key: FieldKey) {
        if self.state(key) == LockState::PendingConfirm {
            self.states.insert(key, LockState::Locked);
        }
    }

    /// Re-lock everything (switching to a new item/record)
    pub fn reset(&mut self) {
        *self = FieldLocks::new(self.mode);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unrestricted_mode_allows_everything() {
        let locks = FieldLocks::new(EditMode::Unrestricted);
        for key in FieldKey::ALL {
            assert!(locks.can_edit(key), "{key} should be editable");
        }
    }

    #[test]
    fn add_only_starts_locked_except_append_fields() {
        let locks = FieldLocks::new(EditMode::AddOnly);
        assert!(!locks.can_edit(FieldKey::Sex));
        assert!(!locks.can_edit(FieldKey::Species));
        // Append-only fields are not directly writable either; they take
        // staged appends
        assert!(!locks.can_edit(FieldKey::Notes));
        assert_eq!(locks.state(FieldKey::Notes), LockState::Unlocked);
    }

    #[test]
    fn unlock_requires_both_steps() {
        let mut locks = FieldLocks::new(EditMode::AddOnly);

        assert!(locks.request_unlock(FieldKey::Sex));
        assert_eq!(locks.state(FieldKey::Sex), LockState::PendingConfirm);
        assert!(!locks.can_edit(FieldKey::Sex));

        assert!(locks.confirm_unlock(FieldKey::Sex));
        assert!(locks.can_edit(FieldKey::Sex));
    }

    #[test]
    fn confirm_without_request_is_rejected() {
        let mut locks = FieldLocks::new(EditMode::AddOnly);
        assert!(!locks.confirm_unlock(FieldKey::Sex));
        assert_eq!(locks.state(FieldKey::Sex), LockState::Locked);
    }

    #[test]
    fn unlock_is_scoped_to_one_field() {
        let mut locks = FieldLocks::new(EditMode::AddOnly);
        locks.request_unlock(FieldKey::Sex);
        locks.confirm_unlock(FieldKey::Sex);

        assert!(locks.can_edit(FieldKey::Sex));
        assert_eq!(locks.state(FieldKey::Species), LockState::Locked);
        assert!(!locks.can_edit(FieldKey::Species));
    }

    #[test]
    fn append_only_fields_cannot_be_unlocked() {
        let mut locks = FieldLocks::new(EditMode::AddOnly);
        assert!(!locks.request_unlock(FieldKey::Notes));
        assert!(!locks.confirm_unlock(FieldKey::DatesRefound));
        assert!(!locks.can_edit(FieldKey::Notes));
    }

    #[test]
    fn reset_relocks_everything() {
        let mut locks = FieldLocks::new(EditMode::AddOnly);
        locks.request_unlock(FieldKey::Sex);
        locks.confirm_unlock(FieldKey::Sex);
        locks.request_unlock(FieldKey::Name);

        locks.reset();
        assert_eq!(locks.state(FieldKey::Sex), LockState::Locked);
        assert_eq!(locks.state(FieldKey::Name), LockState::Locked);
    }

    #[test]
    fn cancel_returns_field_to_locked() {
        let mut locks = FieldLocks::new(EditMode::AddOnly);
        locks.request_unlock(FieldKey::Sex);
        locks.cancel_unlock(FieldKey::Sex);
        assert_eq!(locks.state(FieldKey::Sex), LockState::Locked);
        assert!(!locks.confirm_unlock(FieldKey::Sex));
    }
}
