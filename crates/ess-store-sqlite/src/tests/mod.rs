//! Integration tests for `SqliteStore` against an in-memory database.

mod files;

use chrono::{Duration, NaiveDate, Utc};
use ess_core::{
  ErrorKind, StoreError,
  file::{
    EvacuationFile, EvacuationFileStatus, HouseholdMember, InsuranceOption,
    Needs, NeedsAssessment, Pet,
  },
  query::EvacuationFilesQuery,
  reference::{Registrant, Supplier, Task, TeamMember},
  store::CaseStore,
  support::{Support, SupportCategory, SupportMethod, SupportStatus},
};
use uuid::Uuid;

use crate::SqliteStore;

/// An in-memory store seeded with the reference data a file needs.
struct Fixture {
  store:      SqliteStore,
  registrant: Uuid,
  reviewer:   Uuid,
  supplier:   Uuid,
  task:       String,
}

async fn fixture() -> Fixture {
  let store = SqliteStore::open_in_memory()
    .await
    .expect("in-memory store");

  let registrant = Uuid::new_v4();
  store
    .upsert_registrant(Registrant {
      registrant_id: registrant,
      first_name:    "Sam".into(),
      last_name:     "Rivers".into(),
      date_of_birth: NaiveDate::from_ymd_opt(1980, 3, 14),
      active:        true,
    })
    .await
    .unwrap();

  let reviewer = Uuid::new_v4();
  store
    .upsert_team_member(TeamMember {
      team_member_id: reviewer,
      display_name:   "Jordan Ames".into(),
      active:         true,
    })
    .await
    .unwrap();

  let supplier = Uuid::new_v4();
  store
    .upsert_supplier(Supplier {
      supplier_id: supplier,
      name:        "Valley Grocers".into(),
      active:      true,
    })
    .await
    .unwrap();

  let task = "T-2024-001".to_owned();
  store
    .upsert_task(Task {
      task_number: task.clone(),
      community:   Some("Kamloops".into()),
      active:      true,
    })
    .await
    .unwrap();

  Fixture { store, registrant, reviewer, supplier, task }
}

fn member(first_name: &str, primary: bool) -> HouseholdMember {
  HouseholdMember {
    member_id:             None,
    linked_registrant_id:  None,
    first_name:            first_name.into(),
    last_name:             "Rivers".into(),
    date_of_birth:         None,
    gender:                None,
    is_primary_registrant: primary,
    is_minor:              false,
  }
}

impl Fixture {
  /// A new file with a primary member and one dependant.
  fn new_file(&self) -> EvacuationFile {
    EvacuationFile {
      id:                      None,
      status:                  EvacuationFileStatus::Active,
      primary_registrant_id:   Some(self.registrant),
      task_id:                 Some(self.task.clone()),
      evacuated_from:          Some("kamloops".into()),
      security_phrase:         Some("blue heron".into()),
      security_phrase_changed: false,
      created_at:              None,
      needs_assessment:        Some(NeedsAssessment {
        needs_assessment_id: None,
        jurisdiction:        Some("kamloops".into()),
        reviewed_by_id:      Some(self.reviewer),
        needs:               Needs { food: true, shelter: true, ..Needs::default() },
        insurance:           InsuranceOption::No,
        household_members:   vec![member("Sam", true), member("Riley", false)],
        created_at:          None,
      }),
      household_members:       vec![],
      pets:                    vec![Pet { kind: "dog".into(), quantity: 1 }],
      notes:                   vec![],
      supports:                vec![],
    }
  }

  async fn create_file(&self) -> String {
    self.store.create_file(self.new_file()).await.unwrap()
  }

  /// Read a file back with its security phrase unmasked.
  async fn load(&self, file_id: &str) -> EvacuationFile {
    let files = self
      .store
      .query_files(&EvacuationFilesQuery {
        file_id: Some(file_id.into()),
        mask_security_phrase: false,
        ..Default::default()
      })
      .await
      .unwrap();
    assert_eq!(files.len(), 1, "expected exactly one file {file_id}");
    files.into_iter().next().unwrap()
  }

  fn support(&self, method: SupportMethod, members: Vec<Uuid>) -> Support {
    let now = Utc::now();
    Support {
      id:                   None,
      file_id:              None,
      needs_assessment_id:  None,
      category:             SupportCategory::FoodGroceries,
      method,
      status:               SupportStatus::Active,
      valid_from:           now,
      valid_to:             now + Duration::days(3),
      amount_cents:         Some(12_500),
      supplier_id:          (method == SupportMethod::Referral).then_some(self.supplier),
      payee_id:             (method == SupportMethod::ETransfer).then_some(self.registrant),
      group_lodging_city:   None,
      issued_by_id:         Some(self.reviewer),
      manual_referral_id:   None,
      household_member_ids: members,
      flags:                vec![],
      void_reason:          None,
      created_at:           None,
    }
  }
}

fn kind(err: &crate::Error) -> ErrorKind { err.kind() }
