//! The evacuation-file aggregate.
//!
//! A file is the case record for one evacuated household. It is written as a
//! whole (file, needs assessment, household members, pets) and read back with
//! its notes and supports attached.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

use crate::{Error, Result, support::Support};

// ─── Status ──────────────────────────────────────────────────────────────────

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
  Serialize,
  Deserialize,
  AsRefStr,
  Display,
  EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EvacuationFileStatus {
  Pending,
  #[default]
  Active,
  Expired,
  Completed,
  /// Set when the file is deactivated; files are never physically deleted.
  Inactive,
}

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
  Serialize,
  Deserialize,
  AsRefStr,
  Display,
  EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum InsuranceOption {
  Yes,
  No,
  #[default]
  Unsure,
  Unknown,
}

// ─── Household ───────────────────────────────────────────────────────────────

/// A member of the evacuated household.
///
/// `member_id` is `None` for members that have not been persisted yet; the
/// writer creates those and updates the rest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HouseholdMember {
  pub member_id:             Option<Uuid>,
  /// Registrant profile this member is linked to, if any.
  pub linked_registrant_id:  Option<Uuid>,
  pub first_name:            String,
  pub last_name:             String,
  pub date_of_birth:         Option<NaiveDate>,
  pub gender:                Option<String>,
  #[serde(default)]
  pub is_primary_registrant: bool,
  #[serde(default)]
  pub is_minor:              bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pet {
  /// Free-text animal type, e.g. "dog".
  pub kind:     String,
  pub quantity: u32,
}

// ─── Needs assessment ────────────────────────────────────────────────────────

/// The current snapshot of a household's assessed needs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Needs {
  #[serde(default)]
  pub shelter:        bool,
  #[serde(default)]
  pub food:           bool,
  #[serde(default)]
  pub clothing:       bool,
  #[serde(default)]
  pub incidentals:    bool,
  #[serde(default)]
  pub transportation: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NeedsAssessment {
  /// Assigned by the store; ignored on write.
  pub needs_assessment_id: Option<Uuid>,
  pub jurisdiction:        Option<String>,
  pub reviewed_by_id:      Option<Uuid>,
  #[serde(default)]
  pub needs:               Needs,
  #[serde(default)]
  pub insurance:           InsuranceOption,
  #[serde(default)]
  pub household_members:   Vec<HouseholdMember>,
  pub created_at:          Option<DateTime<Utc>>,
}

// ─── Notes ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
  pub note_id:      Option<Uuid>,
  pub content:      String,
  pub added_by_id:  Option<Uuid>,
  #[serde(default)]
  pub is_hidden:    bool,
  pub created_at:   Option<DateTime<Utc>>,
}

// ─── File ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvacuationFile {
  /// Human-readable file number; `None` until the store assigns one.
  pub id:                    Option<String>,
  #[serde(default)]
  pub status:                EvacuationFileStatus,
  pub primary_registrant_id: Option<Uuid>,
  pub task_id:               Option<String>,
  pub evacuated_from:        Option<String>,
  pub security_phrase:       Option<String>,
  /// On update the stored phrase is only overwritten when this is set, so a
  /// masked phrase read back from the store is never written over the real
  /// one.
  #[serde(default)]
  pub security_phrase_changed: bool,
  pub created_at:            Option<DateTime<Utc>>,
  pub needs_assessment:      Option<NeedsAssessment>,
  /// Members linked to the file itself. On write, only members that already
  /// have an id are considered; new members arrive through the needs
  /// assessment.
  #[serde(default)]
  pub household_members:     Vec<HouseholdMember>,
  #[serde(default)]
  pub pets:                  Vec<Pet>,
  /// Read-only; written through [`crate::store::CaseStore::create_note`].
  #[serde(default)]
  pub notes:                 Vec<Note>,
  /// Read-only; written through [`crate::store::CaseStore::save_supports`].
  #[serde(default)]
  pub supports:              Vec<Support>,
}

/// The parts of a file that its invariants guarantee to be present.
#[derive(Debug, Clone, Copy)]
pub struct CheckedFile<'a> {
  pub primary_registrant_id: Uuid,
  pub needs_assessment:      &'a NeedsAssessment,
}

impl EvacuationFile {
  /// Check the write preconditions of the aggregate.
  ///
  /// A new file (no `id`) must carry exactly one primary-registrant household
  /// member in its needs assessment; an existing one at most one.
  pub fn verify_invariants(&self) -> Result<CheckedFile<'_>> {
    let Some(primary_registrant_id) = self.primary_registrant_id else {
      return Err(Error::InvariantViolation(
        "the file has no associated primary registrant".into(),
      ));
    };
    let Some(assessment) = &self.needs_assessment else {
      return Err(Error::InvariantViolation(format!(
        "file {} must have a needs assessment",
        self.display_id()
      )));
    };

    let primaries = assessment
      .household_members
      .iter()
      .filter(|m| m.is_primary_registrant)
      .count();

    match &self.id {
      None if primaries != 1 => Err(Error::InvariantViolation(
        "a new file must have a single primary registrant household member"
          .into(),
      )),
      Some(id) if primaries > 1 => Err(Error::InvariantViolation(format!(
        "file {id} can not have multiple primary registrant household members"
      ))),
      _ => Ok(CheckedFile {
        primary_registrant_id,
        needs_assessment: assessment,
      }),
    }
  }

  /// Replace the security phrase with its masked form.
  pub fn mask_security_phrase(&mut self) {
    if let Some(phrase) = self.security_phrase.as_mut() {
      *phrase = mask(phrase);
    }
  }

  fn display_id(&self) -> &str { self.id.as_deref().unwrap_or("<new>") }
}

/// Keep the first character and hide the rest behind a fixed-width mask, so
/// the length of the phrase is not revealed either.
fn mask(phrase: &str) -> String {
  match phrase.chars().next() {
    Some(first) => format!("{first}*****"),
    None => String::new(),
  }
}
