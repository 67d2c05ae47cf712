//! Merge-on-append for the two append-only fields
//!
//! Staged appends are merged into the draft immediately before the record
//! write. Merging an empty side never injects a separator, so re-merging
//! with nothing staged leaves the field textually unchanged. The date list
//! merge is a literal append: a date staged twice produces two entries.

/// Staged append text for the two append-only fields
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingAppends {
    pub notes: String,
    pub dates_refound: String,
}

impl PendingAppends {
    pub fn is_empty(&self) -> bool {
        self.notes.trim().is_empty() && self.dates_refound.trim().is_empty()
    }

    pub fn clear(&mut self) {
        self.notes.clear();
        self.dates_refound.clear();
    }
}

/// Merge new notes onto existing notes, blank-line separated.
/// Empty sides are filtered; no separator appears unless both sides are
/// non-empty.
pub fn merge_notes(existing: &str, appended: &str) -> String {
    [existing, appended]
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Merge appended dates onto an existing delimited date list.
///
/// Both sides are tokenized on whitespace and commas, then re-joined with
/// `", "`. Order is preserved and duplicates are kept (the list is a
/// literal observation log, not a set).
pub fn merge_dates(existing: &str, appended: &str) -> String {
    let mut tokens: Vec<&str> = Vec::new();
    for side in [existing, appended] {
        tokens.extend(
            side.split(|c: char| c.is_whitespace() || c == ',')
                .filter(|t| !t.is_empty()),
        );
    }
    tokens.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_append_leaves_notes_unchanged() {
        assert_eq!(merge_notes("x", ""), "x");
        assert_eq!(merge_notes("x", "   "), "x");
    }

    #[test]
    fn notes_are_joined_with_blank_line() {
        assert_eq!(merge_notes("first obs", "second obs"), "first obs\n\nsecond obs");
    }

    #[test]
    fn notes_append_onto_empty_existing() {
        assert_eq!(merge_notes("", "fresh"), "fresh");
    }

    #[test]
    fn dates_accumulate() {
        assert_eq!(
            merge_dates("2023-01-01, 2023-02-02", "2023-03-03"),
            "2023-01-01, 2023-02-02, 2023-03-03"
        );
    }

    #[test]
    fn dates_tokenize_whitespace_and_commas() {
        assert_eq!(
            merge_dates("2023-01-01 2023-02-02", "2023-03-03,2023-04-04"),
            "2023-01-01, 2023-02-02, 2023-03-03, 2023-04-04"
        );
    }

    #[test]
    fn empty_date_append_is_idempotent() {
        assert_eq!(merge_dates("2023-01-01, 2023-02-02", ""), "2023-01-01, 2023-02-02");
        assert_eq!(merge_dates("", ""), "");
    }

    #[test]
    fn duplicate_dates_are_kept_literally() {
        assert_eq!(
            merge_dates("2023-01-01", "2023-01-01"),
            "2023-01-01, 2023-01-01"
        );
    }
}
