//! Query types for files and supports, and the backend-independent parts of
//! file query resolution: strategy selection and the post-load refinement
//! pass.

use std::{cmp::Ordering, collections::HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error, Result, file::EvacuationFileStatus, support::SupportStatus,
};

// ─── Evacuation files ────────────────────────────────────────────────────────

/// Parameters for [`crate::store::CaseStore::query_files`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvacuationFilesQuery {
  pub file_id:                Option<String>,
  pub needs_assessment_id:    Option<Uuid>,
  pub primary_registrant_id:  Option<Uuid>,
  pub linked_registrant_id:   Option<Uuid>,
  pub household_member_id:    Option<Uuid>,
  pub registration_date_from: Option<DateTime<Utc>>,
  pub registration_date_to:   Option<DateTime<Utc>>,
  /// Empty means any status.
  #[serde(default)]
  pub include_statuses:       Vec<EvacuationFileStatus>,
  pub limit:                  Option<usize>,
  #[serde(default = "mask_default")]
  pub mask_security_phrase:   bool,
}

fn mask_default() -> bool { true }

impl Default for EvacuationFilesQuery {
  fn default() -> Self {
    Self {
      file_id:                None,
      needs_assessment_id:    None,
      primary_registrant_id:  None,
      linked_registrant_id:   None,
      household_member_id:    None,
      registration_date_from: None,
      registration_date_to:   None,
      include_statuses:       Vec::new(),
      limit:                  None,
      mask_security_phrase:   true,
    }
  }
}

/// How the candidate files for a query are found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileQueryStrategy {
  /// Load the file owning one specific needs assessment, presenting that
  /// assessment as the file's assessment.
  ByNeedsAssessment(Uuid),
  /// Filter files by number and registration date.
  ByFile,
  /// Find household members by id or linked registrant, then their files.
  ByHouseholdMember,
}

/// The columns of a file row the refinement pass looks at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSummary {
  pub file_key:            Uuid,
  pub file_number:         String,
  pub status:              EvacuationFileStatus,
  pub active:              bool,
  pub created_at:          DateTime<Utc>,
  /// For [`FileQueryStrategy::ByNeedsAssessment`] this is the requested
  /// assessment, not necessarily the current one.
  pub needs_assessment_id: Option<Uuid>,
}

impl EvacuationFilesQuery {
  /// Pick the single strategy that serves this query. Order matters: the
  /// strategies overlap and the first applicable one wins.
  pub fn strategy(&self) -> Option<FileQueryStrategy> {
    if let Some(id) = self.needs_assessment_id {
      return Some(FileQueryStrategy::ByNeedsAssessment(id));
    }
    if self.file_id.is_some()
      || self.registration_date_from.is_some()
      || self.registration_date_to.is_some()
    {
      return Some(FileQueryStrategy::ByFile);
    }
    if self.primary_registrant_id.is_some()
      || self.linked_registrant_id.is_some()
      || self.household_member_id.is_some()
    {
      return Some(FileQueryStrategy::ByHouseholdMember);
    }
    None
  }

  fn admits(&self, file: &FileSummary) -> bool {
    if let Some(id) = &self.file_id
      && &file.file_number != id
    {
      return false;
    }
    if let Some(from) = self.registration_date_from
      && file.created_at < from
    {
      return false;
    }
    if let Some(to) = self.registration_date_to
      && file.created_at > to
    {
      return false;
    }
    self.include_statuses.is_empty()
      || self.include_statuses.contains(&file.status)
  }

  /// Re-apply the file-level predicates to whatever the strategy returned
  /// (backends may apply them only partially), keep active files that have a
  /// needs assessment, drop duplicates, and apply the limit.
  pub fn refine(&self, candidates: Vec<FileSummary>) -> Vec<FileSummary> {
    let mut seen = HashSet::new();
    let mut files: Vec<FileSummary> = candidates
      .into_iter()
      .filter(|f| self.admits(f))
      .filter(|f| f.active && f.needs_assessment_id.is_some())
      .filter(|f| seen.insert(f.file_key))
      .collect();

    if let Some(limit) = self.limit {
      files.sort_by(|a, b| compare_file_numbers(b, a));
      files.truncate(limit);
    }
    files
  }
}

/// File numbers are unpadded decimal strings: a longer number is a later one.
fn compare_file_numbers(a: &FileSummary, b: &FileSummary) -> Ordering {
  a.file_number
    .len()
    .cmp(&b.file_number.len())
    .then_with(|| a.file_number.cmp(&b.file_number))
}

// ─── Supports ────────────────────────────────────────────────────────────────

/// Parameters for [`crate::store::CaseStore::search_supports`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupportQuery {
  pub by_id:                 Option<String>,
  pub by_manual_referral_id: Option<String>,
  pub by_file_id:            Option<String>,
  pub by_status:             Option<SupportStatus>,
  /// Ignored for file-scoped searches.
  pub limit:                 Option<usize>,
}

impl SupportQuery {
  pub fn validate(&self) -> Result<()> {
    if self.by_id.is_none()
      && self.by_manual_referral_id.is_none()
      && self.by_file_id.is_none()
      && self.by_status.is_none()
    {
      return Err(Error::InvariantViolation(
        "supports query must have at least one criteria".into(),
      ));
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use chrono::{Duration, TimeZone};

  use super::*;

  fn summary(number: &str, key: Uuid) -> FileSummary {
    FileSummary {
      file_key:            key,
      file_number:         number.into(),
      status:              EvacuationFileStatus::Active,
      active:              true,
      created_at:          Utc.with_ymd_and_hms(2024, 7, 1, 12, 0, 0).unwrap(),
      needs_assessment_id: Some(Uuid::new_v4()),
    }
  }

  #[test]
  fn needs_assessment_strategy_wins_over_file_id() {
    let na = Uuid::new_v4();
    let q = EvacuationFilesQuery {
      file_id: Some("100001".into()),
      needs_assessment_id: Some(na),
      primary_registrant_id: Some(Uuid::new_v4()),
      ..Default::default()
    };
    assert_eq!(q.strategy(), Some(FileQueryStrategy::ByNeedsAssessment(na)));
  }

  #[test]
  fn file_strategy_wins_over_household_members() {
    let q = EvacuationFilesQuery {
      registration_date_from: Some(Utc::now()),
      linked_registrant_id: Some(Uuid::new_v4()),
      ..Default::default()
    };
    assert_eq!(q.strategy(), Some(FileQueryStrategy::ByFile));

    let q = EvacuationFilesQuery {
      household_member_id: Some(Uuid::new_v4()),
      ..Default::default()
    };
    assert_eq!(q.strategy(), Some(FileQueryStrategy::ByHouseholdMember));
  }

  #[test]
  fn empty_query_has_no_strategy() {
    assert_eq!(EvacuationFilesQuery::default().strategy(), None);
  }

  #[test]
  fn refine_deduplicates_by_key() {
    let key = Uuid::new_v4();
    let q = EvacuationFilesQuery {
      file_id: Some("100001".into()),
      ..Default::default()
    };
    let refined =
      q.refine(vec![summary("100001", key), summary("100001", key)]);
    assert_eq!(refined.len(), 1);
  }

  #[test]
  fn refine_drops_inactive_and_unassessed_files() {
    let mut inactive = summary("100001", Uuid::new_v4());
    inactive.active = false;
    let mut unassessed = summary("100002", Uuid::new_v4());
    unassessed.needs_assessment_id = None;
    let kept = summary("100003", Uuid::new_v4());

    let refined = EvacuationFilesQuery::default()
      .refine(vec![inactive, unassessed, kept.clone()]);
    assert_eq!(refined, vec![kept]);
  }

  #[test]
  fn refine_reapplies_dates_and_statuses() {
    let mut early = summary("100001", Uuid::new_v4());
    early.created_at -= Duration::days(10);
    let mut expired = summary("100002", Uuid::new_v4());
    expired.status = EvacuationFileStatus::Expired;
    let kept = summary("100003", Uuid::new_v4());

    let q = EvacuationFilesQuery {
      registration_date_from: Some(kept.created_at - Duration::days(1)),
      include_statuses: vec![EvacuationFileStatus::Active],
      ..Default::default()
    };
    assert_eq!(q.refine(vec![early, expired, kept.clone()]), vec![kept]);
  }

  #[test]
  fn limit_keeps_the_highest_file_numbers() {
    let q = EvacuationFilesQuery { limit: Some(2), ..Default::default() };
    let refined = q.refine(vec![
      summary("99999", Uuid::new_v4()),
      summary("100010", Uuid::new_v4()),
      summary("100002", Uuid::new_v4()),
    ]);
    let numbers: Vec<_> =
      refined.iter().map(|f| f.file_number.as_str()).collect();
    assert_eq!(numbers, ["100010", "100002"]);
  }

  #[test]
  fn support_query_requires_a_criterion() {
    assert!(SupportQuery::default().validate().is_err());
    let q = SupportQuery {
      by_status: Some(SupportStatus::PendingApproval),
      ..Default::default()
    };
    assert!(q.validate().is_ok());
  }
}
