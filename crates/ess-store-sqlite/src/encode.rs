//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings (microseconds, `Z`)
//! so that lexical comparison in SQL matches chronological order. Enums are
//! stored as their snake_case names, UUIDs as hyphenated lowercase strings,
//! file and support numbers as integers.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use ess_core::{
  file::{EvacuationFile, HouseholdMember, NeedsAssessment, Note},
  query::FileSummary,
  support::Support,
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn decode_opt_uuid(s: Option<String>) -> Result<Option<Uuid>> {
  s.as_deref().map(decode_uuid).transpose()
}

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d")
    .map_err(|e| Error::DateParse(e.to_string()))
}

/// Decode a snake_case enum name written with `AsRef<str>`.
pub fn decode_enum<T: FromStr>(what: &'static str, s: &str) -> Result<T> {
  s.parse()
    .map_err(|_| Error::Decode { what, value: s.to_owned() })
}

/// Human-readable ids are the canonical decimal form of the stored number.
/// Anything else (padding, a sign, whitespace) can never match a row.
pub fn parse_number(id: &str) -> Option<i64> {
  id.parse::<i64>().ok().filter(|n| n.to_string() == id)
}

/// Owner kind of a `member_links` row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
  File,
  NeedsAssessment,
  Support,
}

impl Role {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::File => "file",
      Self::NeedsAssessment => "needs_assessment",
      Self::Support => "support",
    }
  }
}

// ─── Column lists ────────────────────────────────────────────────────────────
// Each list matches the field order of the raw row type below it.

pub const FILE_SUMMARY_COLUMNS: &str = "f.file_key, f.file_number, f.status, \
                                        f.active, f.created_at";

pub const FILE_COLUMNS: &str = "file_number, status, primary_registrant_id, \
                                task_number, evacuated_from, security_phrase, \
                                created_at";

pub const ASSESSMENT_COLUMNS: &str = "needs_assessment_id, jurisdiction, \
                                      reviewed_by_id, needs, insurance, \
                                      created_at";

/// Linked members read their identity from the registrant profile.
pub const MEMBER_COLUMNS: &str = "m.member_id, m.registrant_id, \
                                  COALESCE(r.first_name, m.first_name), \
                                  COALESCE(r.last_name, m.last_name), \
                                  COALESCE(r.date_of_birth, m.date_of_birth), \
                                  m.gender, m.is_primary_registrant, \
                                  m.is_minor";

pub const NOTE_COLUMNS: &str =
  "note_id, content, added_by_id, is_hidden, created_at";

pub const SUPPORT_COLUMNS: &str = "s.support_key, s.support_number, \
                                   f.file_number, s.needs_assessment_id, \
                                   s.category, s.method, s.status, \
                                   s.valid_from, s.valid_to, s.amount_cents, \
                                   s.supplier_id, s.payee_id, \
                                   s.group_lodging_city, s.issued_by_id, \
                                   s.manual_referral_id, s.void_reason, \
                                   s.created_at";

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw columns of a file row, plus the assessment the candidate query
/// resolved it through.
pub struct RawFileSummary {
  pub file_key:            String,
  pub file_number:         i64,
  pub status:              String,
  pub active:              bool,
  pub created_at:          String,
  pub needs_assessment_id: Option<String>,
}

impl RawFileSummary {
  /// Expects [`FILE_SUMMARY_COLUMNS`] followed by one assessment id column.
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      file_key:            row.get(0)?,
      file_number:         row.get(1)?,
      status:              row.get(2)?,
      active:              row.get(3)?,
      created_at:          row.get(4)?,
      needs_assessment_id: row.get(5)?,
    })
  }

  pub fn into_summary(self) -> Result<FileSummary> {
    Ok(FileSummary {
      file_key:            decode_uuid(&self.file_key)?,
      file_number:         self.file_number.to_string(),
      status:              decode_enum("file status", &self.status)?,
      active:              self.active,
      created_at:          decode_dt(&self.created_at)?,
      needs_assessment_id: decode_opt_uuid(self.needs_assessment_id)?,
    })
  }
}

pub struct RawFile {
  pub file_number:           i64,
  pub status:                String,
  pub primary_registrant_id: String,
  pub task_number:           Option<String>,
  pub evacuated_from:        Option<String>,
  pub security_phrase:       Option<String>,
  pub created_at:            String,
}

impl RawFile {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      file_number:           row.get(0)?,
      status:                row.get(1)?,
      primary_registrant_id: row.get(2)?,
      task_number:           row.get(3)?,
      evacuated_from:        row.get(4)?,
      security_phrase:       row.get(5)?,
      created_at:            row.get(6)?,
    })
  }

  /// The file record with empty collections.
  pub fn into_file(self) -> Result<EvacuationFile> {
    Ok(EvacuationFile {
      id:                      Some(self.file_number.to_string()),
      status:                  decode_enum("file status", &self.status)?,
      primary_registrant_id:   Some(decode_uuid(&self.primary_registrant_id)?),
      task_id:                 self.task_number,
      evacuated_from:          self.evacuated_from,
      security_phrase:         self.security_phrase,
      security_phrase_changed: false,
      created_at:              Some(decode_dt(&self.created_at)?),
      needs_assessment:        None,
      household_members:       Vec::new(),
      pets:                    Vec::new(),
      notes:                   Vec::new(),
      supports:                Vec::new(),
    })
  }
}

pub struct RawAssessment {
  pub needs_assessment_id: String,
  pub jurisdiction:        Option<String>,
  pub reviewed_by_id:      Option<String>,
  pub needs:               String,
  pub insurance:           String,
  pub created_at:          String,
}

impl RawAssessment {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      needs_assessment_id: row.get(0)?,
      jurisdiction:        row.get(1)?,
      reviewed_by_id:      row.get(2)?,
      needs:               row.get(3)?,
      insurance:           row.get(4)?,
      created_at:          row.get(5)?,
    })
  }

  pub fn into_assessment(
    self,
    household_members: Vec<HouseholdMember>,
  ) -> Result<NeedsAssessment> {
    Ok(NeedsAssessment {
      needs_assessment_id: Some(decode_uuid(&self.needs_assessment_id)?),
      jurisdiction: self.jurisdiction,
      reviewed_by_id: decode_opt_uuid(self.reviewed_by_id)?,
      needs: serde_json::from_str(&self.needs)?,
      insurance: decode_enum("insurance option", &self.insurance)?,
      household_members,
      created_at: Some(decode_dt(&self.created_at)?),
    })
  }
}

pub struct RawMember {
  pub member_id:             String,
  pub registrant_id:         Option<String>,
  pub first_name:            String,
  pub last_name:             String,
  pub date_of_birth:         Option<String>,
  pub gender:                Option<String>,
  pub is_primary_registrant: bool,
  pub is_minor:              bool,
}

impl RawMember {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      member_id:             row.get(0)?,
      registrant_id:         row.get(1)?,
      first_name:            row.get(2)?,
      last_name:             row.get(3)?,
      date_of_birth:         row.get(4)?,
      gender:                row.get(5)?,
      is_primary_registrant: row.get(6)?,
      is_minor:              row.get(7)?,
    })
  }

  pub fn into_member(self) -> Result<HouseholdMember> {
    Ok(HouseholdMember {
      member_id:             Some(decode_uuid(&self.member_id)?),
      linked_registrant_id:  decode_opt_uuid(self.registrant_id)?,
      first_name:            self.first_name,
      last_name:             self.last_name,
      date_of_birth:         self
        .date_of_birth
        .as_deref()
        .map(decode_date)
        .transpose()?,
      gender:                self.gender,
      is_primary_registrant: self.is_primary_registrant,
      is_minor:              self.is_minor,
    })
  }
}

pub struct RawNote {
  pub note_id:     String,
  pub content:     String,
  pub added_by_id: Option<String>,
  pub is_hidden:   bool,
  pub created_at:  String,
}

impl RawNote {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      note_id:     row.get(0)?,
      content:     row.get(1)?,
      added_by_id: row.get(2)?,
      is_hidden:   row.get(3)?,
      created_at:  row.get(4)?,
    })
  }

  pub fn into_note(self) -> Result<Note> {
    Ok(Note {
      note_id:     Some(decode_uuid(&self.note_id)?),
      content:     self.content,
      added_by_id: decode_opt_uuid(self.added_by_id)?,
      is_hidden:   self.is_hidden,
      created_at:  Some(decode_dt(&self.created_at)?),
    })
  }
}

pub struct RawSupport {
  pub support_key:         String,
  pub support_number:      i64,
  pub file_number:         i64,
  pub needs_assessment_id: String,
  pub category:            String,
  pub method:              String,
  pub status:              String,
  pub valid_from:          String,
  pub valid_to:            String,
  pub amount_cents:        Option<i64>,
  pub supplier_id:         Option<String>,
  pub payee_id:            Option<String>,
  pub group_lodging_city:  Option<String>,
  pub issued_by_id:        Option<String>,
  pub manual_referral_id:  Option<String>,
  pub void_reason:         Option<String>,
  pub created_at:          String,
}

impl RawSupport {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      support_key:         row.get(0)?,
      support_number:      row.get(1)?,
      file_number:         row.get(2)?,
      needs_assessment_id: row.get(3)?,
      category:            row.get(4)?,
      method:              row.get(5)?,
      status:              row.get(6)?,
      valid_from:          row.get(7)?,
      valid_to:            row.get(8)?,
      amount_cents:        row.get(9)?,
      supplier_id:         row.get(10)?,
      payee_id:            row.get(11)?,
      group_lodging_city:  row.get(12)?,
      issued_by_id:        row.get(13)?,
      manual_referral_id:  row.get(14)?,
      void_reason:         row.get(15)?,
      created_at:          row.get(16)?,
    })
  }

  /// Returns the support key alongside the support; beneficiaries and flags
  /// are left empty for the caller to hydrate.
  pub fn into_support(self) -> Result<(Uuid, Support)> {
    let support = Support {
      id:                   Some(self.support_number.to_string()),
      file_id:              Some(self.file_number.to_string()),
      needs_assessment_id:  Some(decode_uuid(&self.needs_assessment_id)?),
      category:             decode_enum("support category", &self.category)?,
      method:               decode_enum("support method", &self.method)?,
      status:               decode_enum("support status", &self.status)?,
      valid_from:           decode_dt(&self.valid_from)?,
      valid_to:             decode_dt(&self.valid_to)?,
      amount_cents:         self.amount_cents,
      supplier_id:          decode_opt_uuid(self.supplier_id)?,
      payee_id:             decode_opt_uuid(self.payee_id)?,
      group_lodging_city:   self.group_lodging_city,
      issued_by_id:         decode_opt_uuid(self.issued_by_id)?,
      manual_referral_id:   self.manual_referral_id,
      household_member_ids: Vec::new(),
      flags:                Vec::new(),
      void_reason:          self
        .void_reason
        .as_deref()
        .map(|r| decode_enum("void reason", r))
        .transpose()?,
      created_at:           Some(decode_dt(&self.created_at)?),
    };
    Ok((decode_uuid(&self.support_key)?, support))
  }
}
