//! Evacuee supports and their lifecycle policy.
//!
//! A support is a benefit issued under a file and the file's current needs
//! assessment. Its status moves through a small explicit table
//! ([`plan_status_change`]); approval routing is decided by its flags
//! ([`Queue::for_flags`]).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::{Uuid, uuid};

use crate::{Error, Result};

// ─── Enumerations ────────────────────────────────────────────────────────────

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  AsRefStr,
  Display,
  EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SupportCategory {
  FoodGroceries,
  FoodRestaurant,
  LodgingHotel,
  LodgingBilleting,
  LodgingGroup,
  Clothing,
  Incidentals,
  TransportationTaxi,
  TransportationOther,
}

/// How the support reaches the evacuee.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  AsRefStr,
  Display,
  EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SupportMethod {
  /// A printed referral redeemed at a supplier.
  Referral,
  /// An interac e-transfer to a payee.
  #[serde(rename = "etransfer")]
  #[strum(serialize = "etransfer")]
  ETransfer,
  Unknown,
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
pub enum SupportStatus {
  Draft,
  #[default]
  Active,
  Expired,
  Void,
  PendingApproval,
  Approved,
  Paid,
  Cancelled,
  UnderReview,
}

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  AsRefStr,
  Display,
  EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum SupportVoidReason {
  ErrorOnPrintedReferral,
  NewSupplierRequired,
  SupplierCouldNotMeetNeed,
}

// ─── Flags ───────────────────────────────────────────────────────────────────

/// A typed annotation attached when a support is submitted for approval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SupportFlag {
  /// The support looks like a duplicate of another, already-issued support.
  Duplicate { duplicated_support_id: String },
  AmountOverridden { approver_notes: String },
  EligibilityConcern { description: String },
}

impl SupportFlag {
  /// The discriminant string stored in the `kind` column.
  pub fn discriminant(&self) -> &'static str {
    match self {
      Self::Duplicate { .. } => "duplicate",
      Self::AmountOverridden { .. } => "amount_overridden",
      Self::EligibilityConcern { .. } => "eligibility_concern",
    }
  }

  /// The other support this flag points at, if it is a duplicate flag.
  pub fn duplicated_support_id(&self) -> Option<&str> {
    match self {
      Self::Duplicate { duplicated_support_id } => Some(duplicated_support_id),
      _ => None,
    }
  }
}

// ─── Support ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Support {
  /// Human-readable support id; `None` means "create".
  pub id:                   Option<String>,
  /// Owning file number. Read-only.
  pub file_id:              Option<String>,
  /// Needs assessment the support was issued under. Read-only.
  pub needs_assessment_id:  Option<Uuid>,
  pub category:             SupportCategory,
  pub method:               SupportMethod,
  #[serde(default)]
  pub status:               SupportStatus,
  pub valid_from:           DateTime<Utc>,
  pub valid_to:             DateTime<Utc>,
  pub amount_cents:         Option<i64>,
  pub supplier_id:          Option<Uuid>,
  /// E-transfer recipient; must be an active registrant.
  pub payee_id:             Option<Uuid>,
  pub group_lodging_city:   Option<String>,
  pub issued_by_id:         Option<Uuid>,
  pub manual_referral_id:   Option<String>,
  /// Beneficiaries.
  #[serde(default)]
  pub household_member_ids: Vec<Uuid>,
  /// Read-only; written through approval submission.
  #[serde(default)]
  pub flags:                Vec<SupportFlag>,
  pub void_reason:          Option<SupportVoidReason>,
  pub created_at:           Option<DateTime<Utc>>,
}

// ─── Status policy ───────────────────────────────────────────────────────────

/// One entry of a status-change batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupportStatusChange {
  pub support_id: String,
  pub to_status:  SupportStatus,
  pub reason:     Option<String>,
}

/// The field changes a backend applies for an accepted status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusUpdate {
  pub status:      SupportStatus,
  /// Whether the record's state flips to inactive.
  pub deactivate:  bool,
  pub void_reason: Option<SupportVoidReason>,
}

/// Decide what a status change does to a support with the given delivery
/// method.
///
/// | target      | method     | effect                                |
/// |-------------|------------|---------------------------------------|
/// | `Void`      | `Referral` | deactivate, record the void reason    |
/// | `Void`      | other      | [`Error::UnsupportedTransition`]      |
/// | `Cancelled` | `ETransfer`| deactivate                            |
/// | `Cancelled` | other      | [`Error::UnsupportedTransition`]      |
/// | anything    | any        | plain status set                      |
pub fn plan_status_change(
  support_id: &str,
  method: SupportMethod,
  to: SupportStatus,
  reason: Option<&str>,
) -> Result<StatusUpdate> {
  let unsupported = || Error::UnsupportedTransition {
    support_id: support_id.to_owned(),
    method,
    to,
  };

  match (to, method) {
    (SupportStatus::Void, SupportMethod::Referral) => {
      let raw = reason.unwrap_or_default();
      let void_reason = raw
        .parse::<SupportVoidReason>()
        .map_err(|_| Error::UnknownVoidReason(raw.to_owned()))?;
      Ok(StatusUpdate {
        status:      to,
        deactivate:  true,
        void_reason: Some(void_reason),
      })
    }
    (SupportStatus::Void, _) => Err(unsupported()),
    (SupportStatus::Cancelled, SupportMethod::ETransfer) => Ok(StatusUpdate {
      status:      to,
      deactivate:  true,
      void_reason: None,
    }),
    (SupportStatus::Cancelled, _) => Err(unsupported()),
    _ => Ok(StatusUpdate { status: to, deactivate: false, void_reason: None }),
  }
}

/// The status a new support is written with. Later changes go through
/// [`plan_status_change`]; a save never changes the status of an existing
/// support.
pub fn initial_status(status: SupportStatus) -> Result<SupportStatus> {
  match status {
    SupportStatus::Draft | SupportStatus::Active => Ok(status),
    other => Err(Error::InvariantViolation(format!(
      "a new support starts as draft or active, not {other}"
    ))),
  }
}

// ─── Beneficiary diff ────────────────────────────────────────────────────────

/// Link changes needed to move a support's beneficiaries from one set to
/// another. Members present in both sets appear in neither list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemberDiff {
  pub added:   Vec<Uuid>,
  pub removed: Vec<Uuid>,
}

impl MemberDiff {
  pub fn between(current: &[Uuid], desired: &[Uuid]) -> Self {
    let mut added = Vec::new();
    for id in desired {
      if !current.contains(id) && !added.contains(id) {
        added.push(*id);
      }
    }
    let removed = current
      .iter()
      .filter(|id| !desired.contains(id))
      .copied()
      .collect();
    Self { added, removed }
  }

  pub fn is_empty(&self) -> bool {
    self.added.is_empty() && self.removed.is_empty()
  }
}

// ─── Approval routing ────────────────────────────────────────────────────────

/// Object type code stamped on queue items that point at a support.
pub const SUPPORT_OBJECT_TYPE_CODE: i32 = 10056;

/// The two work queues supports are routed to on submission.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  AsRefStr,
  Display,
  EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Queue {
  Approval,
  Review,
}

impl Queue {
  pub const APPROVAL_ID: Uuid = uuid!("a4f0fbbe-89a1-ec11-b831-00505683fbf4");
  pub const REVIEW_ID: Uuid = uuid!("e969aae7-8aa1-ec11-b831-00505683fbf4");

  pub const fn id(self) -> Uuid {
    match self {
      Self::Approval => Self::APPROVAL_ID,
      Self::Review => Self::REVIEW_ID,
    }
  }

  /// Flagged supports need a human review first.
  pub fn for_flags(flags: &[SupportFlag]) -> Self {
    if flags.is_empty() { Self::Approval } else { Self::Review }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueItem {
  pub queue_item_id:    Uuid,
  pub queue:            Queue,
  pub object_type_code: i32,
  pub support_id:       String,
  pub created_at:       DateTime<Utc>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn void_referral_deactivates_with_reason() {
    let update = plan_status_change(
      "D1",
      SupportMethod::Referral,
      SupportStatus::Void,
      Some("new_supplier_required"),
    )
    .unwrap();
    assert_eq!(update.status, SupportStatus::Void);
    assert!(update.deactivate);
    assert_eq!(update.void_reason, Some(SupportVoidReason::NewSupplierRequired));
  }

  #[test]
  fn void_etransfer_is_unsupported() {
    let err = plan_status_change(
      "D1",
      SupportMethod::ETransfer,
      SupportStatus::Void,
      Some("new_supplier_required"),
    )
    .unwrap_err();
    assert!(matches!(err, Error::UnsupportedTransition { .. }));
  }

  #[test]
  fn void_referral_with_unknown_reason_fails() {
    let err = plan_status_change(
      "D1",
      SupportMethod::Referral,
      SupportStatus::Void,
      Some("because"),
    )
    .unwrap_err();
    assert!(matches!(err, Error::UnknownVoidReason(_)));
  }

  #[test]
  fn cancel_etransfer_deactivates() {
    let update = plan_status_change(
      "D1",
      SupportMethod::ETransfer,
      SupportStatus::Cancelled,
      None,
    )
    .unwrap();
    assert!(update.deactivate);
    assert_eq!(update.void_reason, None);
  }

  #[test]
  fn cancel_referral_is_unsupported() {
    let err = plan_status_change(
      "D1",
      SupportMethod::Referral,
      SupportStatus::Cancelled,
      None,
    )
    .unwrap_err();
    assert!(matches!(err, Error::UnsupportedTransition { .. }));
  }

  #[test]
  fn other_targets_are_plain_sets() {
    for method in [SupportMethod::Referral, SupportMethod::ETransfer] {
      let update =
        plan_status_change("D1", method, SupportStatus::Approved, None).unwrap();
      assert_eq!(
        update,
        StatusUpdate {
          status:      SupportStatus::Approved,
          deactivate:  false,
          void_reason: None,
        }
      );
    }
  }

  #[test]
  fn new_supports_start_as_draft_or_active() {
    assert_eq!(initial_status(SupportStatus::Draft).unwrap(), SupportStatus::Draft);
    assert_eq!(initial_status(SupportStatus::Active).unwrap(), SupportStatus::Active);
    for status in [SupportStatus::Void, SupportStatus::Cancelled, SupportStatus::Paid] {
      assert!(matches!(
        initial_status(status),
        Err(Error::InvariantViolation(_))
      ));
    }
  }

  #[test]
  fn member_diff_only_emits_changes() {
    let kept = Uuid::new_v4();
    let gone = Uuid::new_v4();
    let new = Uuid::new_v4();

    let diff = MemberDiff::between(&[kept, gone], &[kept, new, new]);
    assert_eq!(diff.added, vec![new]);
    assert_eq!(diff.removed, vec![gone]);
    assert!(!diff.added.contains(&kept) && !diff.removed.contains(&kept));
  }

  #[test]
  fn member_diff_of_identical_sets_is_empty() {
    let a = Uuid::new_v4();
    let b = Uuid::new_v4();
    assert!(MemberDiff::between(&[a, b], &[b, a]).is_empty());
  }

  #[test]
  fn routing_depends_on_flags() {
    assert_eq!(Queue::for_flags(&[]), Queue::Approval);
    let flags = [SupportFlag::EligibilityConcern {
      description: "address mismatch".into(),
    }];
    assert_eq!(Queue::for_flags(&flags), Queue::Review);
    assert_eq!(Queue::Review.id(), Queue::REVIEW_ID);
  }

  #[test]
  fn etransfer_round_trips_through_strum_and_serde() {
    assert_eq!(SupportMethod::ETransfer.as_ref(), "etransfer");
    assert_eq!(
      "etransfer".parse::<SupportMethod>().unwrap(),
      SupportMethod::ETransfer
    );
    assert_eq!(
      serde_json::to_string(&SupportMethod::ETransfer).unwrap(),
      "\"etransfer\""
    );
  }
}
