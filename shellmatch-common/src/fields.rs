//! Canonical record field catalog
//!
//! One `FieldKey` per spreadsheet column of the record store. The catalog
//! carries both names a field goes by: the spreadsheet column header (what
//! the upstream tabs show) and the API name (the JSON key used on the wire
//! and in config/test fixtures).
//!
//! `notes` and `dates_refound` are the two append-only fields: in add-only
//! editing they accept staged appends rather than direct overwrites.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Key for one attribute of a canonical record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKey {
    PrimaryId,
    TransmitterId,
    Id,
    Id2,
    Pit,
    PicInArchive,
    Adopted,
    Ibutton,
    DnaExtracted,
    DateFirstFound,
    Species,
    Name,
    Sex,
    IbuttonLastSet,
    LastAssayDate,
    DatesRefound,
    GeneralLocation,
    Location,
    Notes,
    TransmitterPutOnBy,
    TransmitterOnDate,
    TransmitterType,
    TransmitterLifespan,
    RadioReplaceDate,
    OldFrequencies,
}

impl FieldKey {
    /// All fields, in spreadsheet column order
    pub const ALL: [FieldKey; 25] = [
        FieldKey::PrimaryId,
        FieldKey::TransmitterId,
        FieldKey::Id,
        FieldKey::Id2,
        FieldKey::Pit,
        FieldKey::PicInArchive,
        FieldKey::Adopted,
        FieldKey::Ibutton,
        FieldKey::DnaExtracted,
        FieldKey::DateFirstFound,
        FieldKey::Species,
        FieldKey::Name,
        FieldKey::Sex,
        FieldKey::IbuttonLastSet,
        FieldKey::LastAssayDate,
        FieldKey::DatesRefound,
        FieldKey::GeneralLocation,
        FieldKey::Location,
        FieldKey::Notes,
        FieldKey::TransmitterPutOnBy,
        FieldKey::TransmitterOnDate,
        FieldKey::TransmitterType,
        FieldKey::TransmitterLifespan,
        FieldKey::RadioReplaceDate,
        FieldKey::OldFrequencies,
    ];

    /// JSON key used on the wire (and in the record struct)
    pub fn api_name(&self) -> &'static str {
        match self {
            FieldKey::PrimaryId => "primary_id",
            FieldKey::TransmitterId => "transmitter_id",
            FieldKey::Id => "id",
            FieldKey::Id2 => "id2",
            FieldKey::Pit => "pit",
            FieldKey::PicInArchive => "pic_in_archive",
            FieldKey::Adopted => "adopted",
            FieldKey::Ibutton => "ibutton",
            FieldKey::DnaExtracted => "dna_extracted",
            FieldKey::DateFirstFound => "date_first_found",
            FieldKey::Species => "species",
            FieldKey::Name => "name",
            FieldKey::Sex => "sex",
            FieldKey::IbuttonLastSet => "ibutton_last_set",
            FieldKey::LastAssayDate => "last_assay_date",
            FieldKey::DatesRefound => "dates_refound",
            FieldKey::GeneralLocation => "general_location",
            FieldKey::Location => "location",
            FieldKey::Notes => "notes",
            FieldKey::TransmitterPutOnBy => "transmitter_put_on_by",
            FieldKey::TransmitterOnDate => "transmitter_on_date",
            FieldKey::TransmitterType => "transmitter_type",
            FieldKey::TransmitterLifespan => "transmitter_lifespan",
            FieldKey::RadioReplaceDate => "radio_replace_date",
            FieldKey::OldFrequencies => "old_frequencies",
        }
    }

    /// Spreadsheet column header for this field
    pub fn column_header(&self) -> &'static str {
        match self {
            FieldKey::PrimaryId => "Primary ID",
            FieldKey::TransmitterId => "Transmitter ID",
            FieldKey::Id => "ID",
            FieldKey::Id2 => "ID2 (random sequence)",
            FieldKey::Pit => "Pit?",
            FieldKey::PicInArchive => "Pic in Archive?",
            FieldKey::Adopted => "Adopted?",
            FieldKey::Ibutton => "iButton?",
            FieldKey::DnaExtracted => "DNA Extracted?",
            FieldKey::DateFirstFound => "Date 1st found",
            FieldKey::Species => "Species",
            FieldKey::Name => "Name",
            FieldKey::Sex => "Sex",
            FieldKey::IbuttonLastSet => "iButton Last set",
            FieldKey::LastAssayDate => "Last Assay Date",
            FieldKey::DatesRefound => "Dates refound",
            FieldKey::GeneralLocation => "General Location",
            FieldKey::Location => "Location",
            FieldKey::Notes => "Notes",
            FieldKey::TransmitterPutOnBy => "Transmitter put on by",
            FieldKey::TransmitterOnDate => "Transmitter On Date",
            FieldKey::TransmitterType => "Transmitter type",
            FieldKey::TransmitterLifespan => "Transmitter lifespan",
            FieldKey::RadioReplaceDate => "Radio Replace Date",
            FieldKey::OldFrequencies => "OLD Frequencies",
        }
    }

    /// True for the two fields that only ever accept appends in add-only
    /// editing (`notes`, `dates_refound`)
    pub fn is_append_only(&self) -> bool {
        matches!(self, FieldKey::Notes | FieldKey::DatesRefound)
    }

    /// Look up a field by its API name
    pub fn from_api_name(name: &str) -> Option<FieldKey> {
        FieldKey::ALL.iter().copied().find(|k| k.api_name() == name)
    }

    /// Look up a field by its spreadsheet column header
    pub fn from_column_header(header: &str) -> Option<FieldKey> {
        FieldKey::ALL
            .iter()
            .copied()
            .find(|k| k.column_header() == header)
    }
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.api_name())
    }
}

impl FromStr for FieldKey {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FieldKey::from_api_name(s)
            .ok_or_else(|| crate::Error::InvalidInput(format!("Unknown field key: {}", s)))
    }
}
