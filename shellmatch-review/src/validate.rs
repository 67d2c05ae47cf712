//! Duplicate display-name validation
//!
//! Names are optional, but a non-empty name must be unique
//! (case-insensitively) across all canonical records except the record
//! being saved itself. The check runs against a freshly fetched name list
//! at commit time (never a cached copy), because another operator can add
//! a name between record-load time and commit time.

use crate::error::ValidationError;
use crate::gateway::NameEntry;

/// Validate a proposed display name against the current name list.
///
/// `own_id` is the identifier of the record being saved; its existing
/// entry is excluded so re-saving a record under its own name passes.
/// Empty (or whitespace-only) names are always valid.
pub fn validate_name(
    proposed: &str,
    own_id: &str,
    names: &[NameEntry],
) -> Result<(), ValidationError> {
    let proposed = proposed.trim();
    if proposed.is_empty() {
        return Ok(());
    }

    let proposed_lower = proposed.to_lowercase();
    for entry in names {
        if entry.primary_id == own_id {
            continue;
        }
        if entry.name.trim().to_lowercase() == proposed_lower {
            return Err(ValidationError::DuplicateName {
                name: proposed.to_string(),
                conflicting_id: entry.primary_id.clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, id: &str) -> NameEntry {
        NameEntry {
            name: name.to_string(),
            primary_id: id.to_string(),
        }
    }

    #[test]
    fn case_insensitive_collision_fails() {
        let names = vec![entry("Shelly", "A")];
        let err = validate_name("shelly", "B", &names).unwrap_err();
        match err {
            ValidationError::DuplicateName { name, conflicting_id } => {
                assert_eq!(name, "shelly");
                assert_eq!(conflicting_id, "A");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn own_record_is_excluded() {
        let names = vec![entry("Shelly", "A")];
        assert!(validate_name("Shelly", "A", &names).is_ok());
    }

    #[test]
    fn empty_name_is_always_valid() {
        let names = vec![entry("", "A"), entry("Boxer", "B")];
        assert!(validate_name("", "C", &names).is_ok());
        assert!(validate_name("   ", "C", &names).is_ok());
    }

    #[test]
    fn whitespace_is_trimmed_before_comparison() {
        let names = vec![entry(" Boxer ", "A")];
        assert!(validate_name("boxer", "B", &names).is_err());
        assert!(validate_name("Boxer Jr", "B", &names).is_ok());
    }
}
