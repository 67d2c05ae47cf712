//! Shared domain model: canonical records and review queue items
//!
//! The canonical record mirrors one row of the spreadsheet-backed record
//! store; every attribute is cell-typed (a string, possibly empty). The
//! review item mirrors one pending submission packet in the review queue,
//! including its ranked candidate list from the identification service.

use crate::fields::FieldKey;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

fn is_empty(s: &String) -> bool {
    s.is_empty()
}

/// Key of a canonical record: globally assigned primary id plus the
/// partition (spreadsheet tab) the row lives in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordKey {
    pub primary_id: String,
    pub partition: String,
}

impl RecordKey {
    pub fn new(primary_id: impl Into<String>, partition: impl Into<String>) -> Self {
        Self {
            primary_id: primary_id.into(),
            partition: partition.into(),
        }
    }
}

/// One row of the record store.
///
/// All attributes are strings because the upstream store is a spreadsheet;
/// yes/no style fields carry whatever the operators typed. Empty string
/// means "cell not populated".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CanonicalRecord {
    #[serde(skip_serializing_if = "is_empty")]
    pub primary_id: String,
    #[serde(skip_serializing_if = "is_empty")]
    pub transmitter_id: String,
    #[serde(skip_serializing_if = "is_empty")]
    pub id: String,
    #[serde(skip_serializing_if = "is_empty")]
    pub id2: String,
    #[serde(skip_serializing_if = "is_empty")]
    pub pit: String,
    #[serde(skip_serializing_if = "is_empty")]
    pub pic_in_archive: String,
    #[serde(skip_serializing_if = "is_empty")]
    pub adopted: String,
    #[serde(skip_serializing_if = "is_empty")]
    pub ibutton: String,
    #[serde(skip_serializing_if = "is_empty")]
    pub dna_extracted: String,
    #[serde(skip_serializing_if = "is_empty")]
    pub date_first_found: String,
    #[serde(skip_serializing_if = "is_empty")]
    pub species: String,
    #[serde(skip_serializing_if = "is_empty")]
    pub name: String,
    #[serde(skip_serializing_if = "is_empty")]
    pub sex: String,
    #[serde(skip_serializing_if = "is_empty")]
    pub ibutton_last_set: String,
    #[serde(skip_serializing_if = "is_empty")]
    pub last_assay_date: String,
    #[serde(skip_serializing_if = "is_empty")]
    pub dates_refound: String,
    #[serde(skip_serializing_if = "is_empty")]
    pub general_location: String,
    #[serde(skip_serializing_if = "is_empty")]
    pub location: String,
    #[serde(skip_serializing_if = "is_empty")]
    pub notes: String,
    #[serde(skip_serializing_if = "is_empty")]
    pub transmitter_put_on_by: String,
    #[serde(skip_serializing_if = "is_empty")]
    pub transmitter_on_date: String,
    #[serde(skip_serializing_if = "is_empty")]
    pub transmitter_type: String,
    #[serde(skip_serializing_if = "is_empty")]
    pub transmitter_lifespan: String,
    #[serde(skip_serializing_if = "is_empty")]
    pub radio_replace_date: String,
    #[serde(skip_serializing_if = "is_empty")]
    pub old_frequencies: String,
}

impl CanonicalRecord {
    /// Placeholder draft for a candidate whose record was never entered
    /// into the store: only the identifier is populated.
    pub fn skeleton(primary_id: impl Into<String>) -> Self {
        Self {
            primary_id: primary_id.into(),
            ..Default::default()
        }
    }

    /// Read one attribute by field key
    pub fn get(&self, key: FieldKey) -> &str {
        match key {
            FieldKey::PrimaryId => &self.primary_id,
            FieldKey::TransmitterId => &self.transmitter_id,
            FieldKey::Id => &self.id,
            FieldKey::Id2 => &self.id2,
            FieldKey::Pit => &self.pit,
            FieldKey::PicInArchive => &self.pic_in_archive,
            FieldKey::Adopted => &self.adopted,
            FieldKey::Ibutton => &self.ibutton,
            FieldKey::DnaExtracted => &self.dna_extracted,
            FieldKey::DateFirstFound => &self.date_first_found,
            FieldKey::Species => &self.species,
            FieldKey::Name => &self.name,
            FieldKey::Sex => &self.sex,
            FieldKey::IbuttonLastSet => &self.ibutton_last_set,
            FieldKey::LastAssayDate => &self.last_assay_date,
            FieldKey::DatesRefound => &self.dates_refound,
            FieldKey::GeneralLocation => &self.general_location,
            FieldKey::Location => &self.location,
            FieldKey::Notes => &self.notes,
            FieldKey::TransmitterPutOnBy => &self.transmitter_put_on_by,
            FieldKey::TransmitterOnDate => &self.transmitter_on_date,
            FieldKey::TransmitterType => &self.transmitter_type,
            FieldKey::TransmitterLifespan => &self.transmitter_lifespan,
            FieldKey::RadioReplaceDate => &self.radio_replace_date,
            FieldKey::OldFrequencies => &self.old_frequencies,
        }
    }

    /// Write one attribute by field key
    pub fn set(&mut self, key: FieldKey, value: impl Into<String>) {
        let value = value.into();
        let slot = match key {
            FieldKey::PrimaryId => &mut self.primary_id,
            FieldKey::TransmitterId => &mut self.transmitter_id,
            FieldKey::Id => &mut self.id,
            FieldKey::Id2 => &mut self.id2,
            FieldKey::Pit => &mut self.pit,
            FieldKey::PicInArchive => &mut self.pic_in_archive,
            FieldKey::Adopted => &mut self.adopted,
            FieldKey::Ibutton => &mut self.ibutton,
            FieldKey::DnaExtracted => &mut self.dna_extracted,
            FieldKey::DateFirstFound => &mut self.date_first_found,
            FieldKey::Species => &mut self.species,
            FieldKey::Name => &mut self.name,
            FieldKey::Sex => &mut self.sex,
            FieldKey::IbuttonLastSet => &mut self.ibutton_last_set,
            FieldKey::LastAssayDate => &mut self.last_assay_date,
            FieldKey::DatesRefound => &mut self.dates_refound,
            FieldKey::GeneralLocation => &mut self.general_location,
            FieldKey::Location => &mut self.location,
            FieldKey::Notes => &mut self.notes,
            FieldKey::TransmitterPutOnBy => &mut self.transmitter_put_on_by,
            FieldKey::TransmitterOnDate => &mut self.transmitter_on_date,
            FieldKey::TransmitterType => &mut self.transmitter_type,
            FieldKey::TransmitterLifespan => &mut self.transmitter_lifespan,
            FieldKey::RadioReplaceDate => &mut self.radio_replace_date,
            FieldKey::OldFrequencies => &mut self.old_frequencies,
        };
        *slot = value;
    }

    /// Number of non-empty attributes. Lookups that return fewer than a
    /// handful of populated cells are treated as misses by the load path.
    pub fn populated_field_count(&self) -> usize {
        FieldKey::ALL
            .iter()
            .filter(|k| !self.get(**k).trim().is_empty())
            .count()
    }
}

/// One ranked identity suggestion from the identification service.
///
/// Immutable once attached to a review item; scores are opaque ordering
/// hints and are never recomputed here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Primary id of the suggested canonical record
    pub turtle_ref: String,
    /// 1-based rank, 1 = best match
    pub rank: u32,
    /// Similarity score as reported by the identification service
    pub score: f64,
    /// Reference to the candidate's comparison image
    pub image_ref: String,
}

/// Where a location hint came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocationSource {
    Gps,
    Manual,
}

/// Optional submitter-provided location for a submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationHint {
    pub lat: f64,
    pub lon: f64,
    pub source: LocationSource,
}

/// Submitter info and operator-relevant flags attached to a submission
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubmissionMetadata {
    #[serde(skip_serializing_if = "is_empty")]
    pub submitter_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_hint: Option<LocationHint>,
    /// Submitter-selected region label, "State/Location" format
    #[serde(skip_serializing_if = "is_empty")]
    pub location_label: String,
    /// Submitter intends to collect the animal to the lab
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collected_to_lab: Option<bool>,
    /// Physical marker flag placed in the field
    #[serde(skip_serializing_if = "Option::is_none")]
    pub physical_flag: Option<bool>,
    /// Digital flag set on the record
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digital_flag: Option<bool>,
}

/// Category tag for an evidentiary image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvidenceKind {
    Microhabitat,
    Condition,
    Other,
}

impl EvidenceKind {
    /// Parse an operator-supplied tag; anything unrecognized becomes `Other`
    pub fn parse_lenient(tag: &str) -> EvidenceKind {
        match tag.trim().to_ascii_lowercase().as_str() {
            "microhabitat" => EvidenceKind::Microhabitat,
            "condition" => EvidenceKind::Condition,
            _ => EvidenceKind::Other,
        }
    }
}

/// One evidentiary image attached to a review item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceImage {
    pub filename: String,
    #[serde(rename = "type")]
    pub kind: EvidenceKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Lifecycle of a review item. Terminal once resolved or discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewStatus {
    Pending,
    Resolved,
    Discarded,
}

/// A pending submission awaiting resolution to a canonical record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewItem {
    /// Opaque token, stable for the life of the item
    pub id: String,
    /// Reference to the submitted image
    pub photo_ref: String,
    /// Ranked candidates, insertion order = rank order
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    #[serde(default)]
    pub metadata: SubmissionMetadata,
    #[serde(default)]
    pub additional_images: Vec<EvidenceImage>,
    pub status: ReviewStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skeleton_populates_only_the_identifier() {
        let rec = CanonicalRecord::skeleton("T17099");
        assert_eq!(rec.primary_id, "T17099");
        assert_eq!(rec.populated_field_count(), 1);
    }

    #[test]
    fn get_set_round_trip_every_field() {
        let mut rec = CanonicalRecord::default();
        for (i, key) in FieldKey::ALL.iter().enumerate() {
            rec.set(*key, format!("v{}", i));
        }
        for (i, key) in FieldKey::ALL.iter().enumerate() {
            assert_eq!(rec.get(*key), format!("v{}", i));
        }
        assert_eq!(rec.populated_field_count(), 25);
    }

    #[test]
    fn empty_cells_are_not_serialized() {
        let rec = CanonicalRecord::skeleton("T1");
        let json = serde_json::to_value(&rec).unwrap();
        let obj = json.as_object().unwrap();
        assert_eq!(obj.len(), 1);
        assert_eq!(obj["primary_id"], "T1");
    }

    #[test]
    fn evidence_kind_is_lenient() {
        assert_eq!(EvidenceKind::parse_lenient(" Microhabitat "), EvidenceKind::Microhabitat);
        assert_eq!(EvidenceKind::parse_lenient("condition"), EvidenceKind::Condition);
        assert_eq!(EvidenceKind::parse_lenient("habitat-ish"), EvidenceKind::Other);
    }
}
