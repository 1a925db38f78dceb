use ess_core::{file::Note, reference::Registrant};

use super::*;

// ─── Create ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_assigns_sequential_file_numbers() {
  let f = fixture().await;
  assert_eq!(f.create_file().await, "100001");
  assert_eq!(f.create_file().await, "100002");
}

#[tokio::test]
async fn create_reads_back_the_whole_aggregate() {
  let f = fixture().await;
  let id = f.create_file().await;

  let file = f.load(&id).await;
  assert_eq!(file.id.as_deref(), Some(id.as_str()));
  assert_eq!(file.primary_registrant_id, Some(f.registrant));
  assert_eq!(file.task_id.as_deref(), Some("T-2024-001"));
  assert_eq!(file.security_phrase.as_deref(), Some("blue heron"));
  assert_eq!(file.pets, vec![Pet { kind: "dog".into(), quantity: 1 }]);
  assert!(file.created_at.is_some());

  let assessment = file.needs_assessment.expect("current needs assessment");
  assert!(assessment.needs_assessment_id.is_some());
  assert_eq!(assessment.reviewed_by_id, Some(f.reviewer));
  assert!(assessment.needs.food && assessment.needs.shelter);
  assert!(!assessment.needs.clothing);
  assert_eq!(assessment.insurance, InsuranceOption::No);
  assert_eq!(assessment.household_members.len(), 2);

  // Assessment members are also members of the file.
  assert_eq!(file.household_members.len(), 2);
  assert!(file.household_members.iter().all(|m| m.member_id.is_some()));
}

#[tokio::test]
async fn primary_member_takes_identity_from_registrant() {
  let f = fixture().await;
  let mut file = f.new_file();
  if let Some(na) = file.needs_assessment.as_mut() {
    na.household_members[0].first_name = "Typo".into();
  }
  let id = f.store.create_file(file).await.unwrap();

  let file = f.load(&id).await;
  let members = file.needs_assessment.unwrap().household_members;
  let primary = members
    .iter()
    .find(|m| m.is_primary_registrant)
    .expect("primary member");
  assert_eq!(primary.linked_registrant_id, Some(f.registrant));
  assert_eq!(primary.first_name, "Sam");
  assert_eq!(primary.date_of_birth, NaiveDate::from_ymd_opt(1980, 3, 14));
}

#[tokio::test]
async fn create_without_primary_member_fails() {
  let f = fixture().await;
  let mut file = f.new_file();
  if let Some(na) = file.needs_assessment.as_mut() {
    na.household_members = vec![member("Riley", false)];
  }
  let err = f.store.create_file(file).await.unwrap_err();
  assert_eq!(kind(&err), ErrorKind::InvariantViolation);
}

#[tokio::test]
async fn create_with_two_primary_members_fails() {
  let f = fixture().await;
  let mut file = f.new_file();
  if let Some(na) = file.needs_assessment.as_mut() {
    na.household_members = vec![member("Sam", true), member("Alex", true)];
  }
  let err = f.store.create_file(file).await.unwrap_err();
  assert_eq!(kind(&err), ErrorKind::InvariantViolation);
}

#[tokio::test]
async fn create_resolves_references() {
  let f = fixture().await;

  let mut unknown_registrant = f.new_file();
  unknown_registrant.primary_registrant_id = Some(Uuid::new_v4());
  let err = f.store.create_file(unknown_registrant).await.unwrap_err();
  assert_eq!(kind(&err), ErrorKind::NotFound);

  let mut unknown_task = f.new_file();
  unknown_task.task_id = Some("T-missing".into());
  let err = f.store.create_file(unknown_task).await.unwrap_err();
  assert_eq!(kind(&err), ErrorKind::NotFound);

  let mut unknown_reviewer = f.new_file();
  if let Some(na) = unknown_reviewer.needs_assessment.as_mut() {
    na.reviewed_by_id = Some(Uuid::new_v4());
  }
  let err = f.store.create_file(unknown_reviewer).await.unwrap_err();
  assert_eq!(kind(&err), ErrorKind::NotFound);

  let mut unknown_link = f.new_file();
  if let Some(na) = unknown_link.needs_assessment.as_mut() {
    na.household_members[1].linked_registrant_id = Some(Uuid::new_v4());
  }
  let err = f.store.create_file(unknown_link).await.unwrap_err();
  assert_eq!(kind(&err), ErrorKind::NotFound);

  // Nothing was written by the failed attempts.
  assert_eq!(f.create_file().await, "100001");
}

#[tokio::test]
async fn create_with_inactive_registrant_fails() {
  let f = fixture().await;
  f.store
    .upsert_registrant(Registrant {
      registrant_id: f.registrant,
      first_name:    "Sam".into(),
      last_name:     "Rivers".into(),
      date_of_birth: None,
      active:        false,
    })
    .await
    .unwrap();

  let err = f.store.create_file(f.new_file()).await.unwrap_err();
  assert_eq!(kind(&err), ErrorKind::NotFound);
}

// ─── Update ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn update_with_two_primary_members_fails() {
  let f = fixture().await;
  let id = f.create_file().await;

  let mut file = f.load(&id).await;
  if let Some(na) = file.needs_assessment.as_mut() {
    for m in &mut na.household_members {
      m.is_primary_registrant = true;
    }
  }
  let err = f.store.update_file(file).await.unwrap_err();
  assert_eq!(kind(&err), ErrorKind::InvariantViolation);
}

#[tokio::test]
async fn update_of_unknown_file_fails() {
  let f = fixture().await;
  let mut file = f.new_file();
  file.id = Some("999999".into());
  let err = f.store.update_file(file).await.unwrap_err();
  assert_eq!(kind(&err), ErrorKind::NotFound);
}

#[tokio::test]
async fn update_replaces_pets_and_snapshots_the_assessment() {
  let f = fixture().await;
  let id = f.create_file().await;

  let mut file = f.load(&id).await;
  let first_assessment = file
    .needs_assessment
    .as_ref()
    .and_then(|na| na.needs_assessment_id)
    .unwrap();
  file.pets = vec![
    Pet { kind: "cat".into(), quantity: 2 },
    Pet { kind: "bird".into(), quantity: 1 },
  ];
  if let Some(na) = file.needs_assessment.as_mut() {
    na.needs.clothing = true;
  }
  assert_eq!(f.store.update_file(file).await.unwrap(), id);

  let file = f.load(&id).await;
  assert_eq!(file.pets.len(), 2);
  assert!(file.pets.iter().all(|p| p.kind != "dog"));

  let current = file.needs_assessment.unwrap();
  assert_ne!(current.needs_assessment_id, Some(first_assessment));
  assert!(current.needs.clothing);
  // Members carrying ids were updated, not duplicated.
  assert_eq!(current.household_members.len(), 2);
  assert_eq!(file.household_members.len(), 2);

  // The earlier snapshot is still reachable by id.
  let earlier = f
    .store
    .query_files(&EvacuationFilesQuery {
      needs_assessment_id: Some(first_assessment),
      ..Default::default()
    })
    .await
    .unwrap();
  assert_eq!(earlier.len(), 1);
  let earlier = earlier[0].needs_assessment.as_ref().unwrap();
  assert_eq!(earlier.needs_assessment_id, Some(first_assessment));
  assert!(!earlier.needs.clothing);
}

#[tokio::test]
async fn update_adds_new_members() {
  let f = fixture().await;
  let id = f.create_file().await;

  let mut file = f.load(&id).await;
  if let Some(na) = file.needs_assessment.as_mut() {
    na.household_members.push(member("Casey", false));
  }
  f.store.update_file(file).await.unwrap();

  let file = f.load(&id).await;
  assert_eq!(file.needs_assessment.unwrap().household_members.len(), 3);
  assert_eq!(file.household_members.len(), 3);
}

#[tokio::test]
async fn members_stay_with_their_file() {
  let f = fixture().await;
  let first = f.create_file().await;
  let second = f.create_file().await;
  let dependant = f
    .load(&first)
    .await
    .household_members
    .into_iter()
    .find(|m| !m.is_primary_registrant)
    .expect("dependant");

  let mut other = f.load(&second).await;
  if let Some(na) = other.needs_assessment.as_mut() {
    na.household_members.push(dependant.clone());
  }
  let err = f.store.update_file(other).await.unwrap_err();
  assert_eq!(kind(&err), ErrorKind::InvariantViolation);

  let mut copy = f.new_file();
  if let Some(na) = copy.needs_assessment.as_mut() {
    na.household_members[1] = dependant.clone();
  }
  let err = f.store.create_file(copy).await.unwrap_err();
  assert_eq!(kind(&err), ErrorKind::InvariantViolation);

  let owners = f
    .store
    .query_files(&EvacuationFilesQuery {
      household_member_id: dependant.member_id,
      ..Default::default()
    })
    .await
    .unwrap();
  assert_eq!(owners.len(), 1);
  assert_eq!(owners[0].id.as_deref(), Some(first.as_str()));
  assert_eq!(f.load(&second).await.household_members.len(), 2);
}

#[tokio::test]
async fn padded_file_ids_do_not_match() {
  let f = fixture().await;
  let id = f.create_file().await;

  let mut file = f.load(&id).await;
  file.id = Some(format!("0{id}"));
  let err = f.store.update_file(file).await.unwrap_err();
  assert_eq!(kind(&err), ErrorKind::NotFound);

  for padded in [format!("0{id}"), format!("+{id}"), format!(" {id}")] {
    let found = f
      .store
      .query_files(&EvacuationFilesQuery { file_id: Some(padded), ..Default::default() })
      .await
      .unwrap();
    assert!(found.is_empty());
  }
}

#[tokio::test]
async fn security_phrase_changes_only_when_flagged() {
  let f = fixture().await;
  let id = f.create_file().await;

  let mut file = f.load(&id).await;
  file.security_phrase = Some("b*****".into());
  f.store.update_file(file).await.unwrap();
  assert_eq!(f.load(&id).await.security_phrase.as_deref(), Some("blue heron"));

  let mut file = f.load(&id).await;
  file.security_phrase = Some("red kite".into());
  file.security_phrase_changed = true;
  f.store.update_file(file).await.unwrap();
  assert_eq!(f.load(&id).await.security_phrase.as_deref(), Some("red kite"));
}

// ─── Deactivate ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn deactivated_files_are_not_returned() {
  let f = fixture().await;
  let id = f.create_file().await;

  assert_eq!(f.store.deactivate_file(id.clone()).await.unwrap(), id);

  let files = f
    .store
    .query_files(&EvacuationFilesQuery {
      primary_registrant_id: Some(f.registrant),
      ..Default::default()
    })
    .await
    .unwrap();
  assert!(files.is_empty());
}

#[tokio::test]
async fn deactivating_unknown_file_is_not_an_error() {
  let f = fixture().await;
  assert_eq!(
    f.store.deactivate_file("424242".into()).await.unwrap(),
    "424242"
  );
}

// ─── Notes ───────────────────────────────────────────────────────────────────

fn note(content: &str, author: Option<Uuid>) -> Note {
  Note {
    note_id:     None,
    content:     content.into(),
    added_by_id: author,
    is_hidden:   false,
    created_at:  None,
  }
}

#[tokio::test]
async fn notes_are_created_and_updated() {
  let f = fixture().await;
  let id = f.create_file().await;

  let note_id = f
    .store
    .create_note(id.clone(), note("called family", Some(f.reviewer)))
    .await
    .unwrap();

  let mut updated = note("called family twice", None);
  updated.note_id = Some(note_id);
  updated.is_hidden = true;
  assert_eq!(f.store.update_note(id.clone(), updated).await.unwrap(), note_id);

  let notes = f.load(&id).await.notes;
  assert_eq!(notes.len(), 1);
  assert_eq!(notes[0].note_id, Some(note_id));
  assert_eq!(notes[0].content, "called family twice");
  assert!(notes[0].is_hidden);
  assert_eq!(notes[0].added_by_id, Some(f.reviewer));
}

#[tokio::test]
async fn note_with_unknown_author_drops_the_author() {
  let f = fixture().await;
  let id = f.create_file().await;

  f.store
    .create_note(id.clone(), note("walk-in", Some(Uuid::new_v4())))
    .await
    .unwrap();

  let notes = f.load(&id).await.notes;
  assert_eq!(notes.len(), 1);
  assert_eq!(notes[0].added_by_id, None);
}

#[tokio::test]
async fn note_writes_need_existing_file_and_note() {
  let f = fixture().await;
  let id = f.create_file().await;

  let err = f
    .store
    .create_note("999999".into(), note("lost", None))
    .await
    .unwrap_err();
  assert_eq!(kind(&err), ErrorKind::NotFound);

  let mut missing = note("lost", None);
  missing.note_id = Some(Uuid::new_v4());
  let err = f.store.update_note(id, missing).await.unwrap_err();
  assert_eq!(kind(&err), ErrorKind::NotFound);
}
