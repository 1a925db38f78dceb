//! Evacuation-file aggregate writer and file notes.
//!
//! A file write is two units of work: the file row with its pets and
//! file-member links, then the new needs-assessment snapshot with its members
//! and links. The second sets the snapshot current. All reference lookups run
//! before either transaction opens.

use chrono::Utc;
use ess_core::file::{
  CheckedFile, EvacuationFile, EvacuationFileStatus, HouseholdMember,
  NeedsAssessment, Note, Pet,
};
use rusqlite::{Connection, OptionalExtension as _};
use tracing::debug;
use uuid::Uuid;

use crate::{
  Result,
  encode::{Role, decode_opt_uuid, decode_uuid, encode_date, encode_dt, encode_uuid, parse_number},
  store::{SqliteStore, lookup},
};

/// File and support numbers start above this value.
pub(crate) const NUMBER_BASE: i64 = 100_000;

/// The internal key of a file and its current needs assessment.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FileRef {
  pub file_key:           Uuid,
  pub current_assessment: Option<Uuid>,
}

// ─── Row encoding ────────────────────────────────────────────────────────────

/// A household member encoded for `household_members`.
struct MemberRow {
  member_id:     String,
  registrant_id: Option<String>,
  first_name:    String,
  last_name:     String,
  date_of_birth: Option<String>,
  gender:        Option<String>,
  is_primary:    bool,
  is_minor:      bool,
}

impl MemberRow {
  /// The primary member is linked to the file's primary registrant unless it
  /// already names one.
  fn new(member_id: Uuid, member: &HouseholdMember, primary_registrant: Uuid) -> Self {
    let registrant = member.linked_registrant_id.or(
      member.is_primary_registrant.then_some(primary_registrant),
    );
    Self {
      member_id:     encode_uuid(member_id),
      registrant_id: registrant.map(encode_uuid),
      first_name:    member.first_name.clone(),
      last_name:     member.last_name.clone(),
      date_of_birth: member.date_of_birth.map(encode_date),
      gender:        member.gender.clone(),
      is_primary:    member.is_primary_registrant,
      is_minor:      member.is_minor,
    }
  }
}

/// The scalar columns of a file write.
struct FileRow {
  status:                String,
  primary_registrant_id: String,
  task_number:           Option<String>,
  evacuated_from:        Option<String>,
  security_phrase:       Option<String>,
  phrase_changed:        bool,
}

impl FileRow {
  fn new(file: &EvacuationFile, checked: CheckedFile<'_>) -> Self {
    Self {
      status:                file.status.as_ref().to_owned(),
      primary_registrant_id: encode_uuid(checked.primary_registrant_id),
      task_number:           file.task_id.clone(),
      evacuated_from:        file.evacuated_from.clone(),
      security_phrase:       file.security_phrase.clone(),
      phrase_changed:        file.security_phrase_changed,
    }
  }
}

/// File-level members that already carry an id; new members only enter a
/// file through its needs assessment.
fn known_file_members(
  file: &EvacuationFile,
  primary_registrant: Uuid,
) -> Vec<MemberRow> {
  file
    .household_members
    .iter()
    .filter_map(|m| m.member_id.map(|id| MemberRow::new(id, m, primary_registrant)))
    .collect()
}

fn upsert_member(conn: &Connection, m: &MemberRow) -> rusqlite::Result<()> {
  conn.execute(
    "INSERT INTO household_members (
       member_id, registrant_id, first_name, last_name, date_of_birth,
       gender, is_primary_registrant, is_minor
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
     ON CONFLICT (member_id) DO UPDATE SET
       registrant_id = excluded.registrant_id,
       first_name = excluded.first_name,
       last_name = excluded.last_name,
       date_of_birth = excluded.date_of_birth,
       gender = excluded.gender,
       is_primary_registrant = excluded.is_primary_registrant,
       is_minor = excluded.is_minor",
    rusqlite::params![
      m.member_id,
      m.registrant_id,
      m.first_name,
      m.last_name,
      m.date_of_birth,
      m.gender,
      m.is_primary,
      m.is_minor,
    ],
  )?;
  Ok(())
}

pub(crate) fn link_member(
  conn: &Connection,
  member_id: &str,
  role: Role,
  owner_id: &str,
) -> rusqlite::Result<()> {
  conn.execute(
    "INSERT OR IGNORE INTO member_links (member_id, role, owner_id)
     VALUES (?1, ?2, ?3)",
    rusqlite::params![member_id, role.as_str(), owner_id],
  )?;
  Ok(())
}

fn insert_pets(conn: &Connection, file_key: &str, pets: &[Pet]) -> rusqlite::Result<()> {
  for pet in pets {
    conn.execute(
      "INSERT INTO pets (pet_id, file_key, kind, quantity) VALUES (?1, ?2, ?3, ?4)",
      rusqlite::params![encode_uuid(Uuid::new_v4()), file_key, pet.kind, pet.quantity],
    )?;
  }
  Ok(())
}

// ─── Writer ──────────────────────────────────────────────────────────────────

impl SqliteStore {
  /// Look up a file by its human-readable number.
  pub(crate) async fn find_file(&self, file_id: &str) -> Result<Option<FileRef>> {
    let Some(number) = parse_number(file_id) else {
      return Ok(None);
    };

    let raw: Option<(String, Option<String>)> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT file_key, current_needs_assessment_id
               FROM evacuation_files WHERE file_number = ?1",
              [number],
              |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .optional()?,
        )
      })
      .await?;

    raw
      .map(|(key, assessment)| {
        Ok(FileRef {
          file_key:           decode_uuid(&key)?,
          current_assessment: decode_opt_uuid(assessment)?,
        })
      })
      .transpose()
  }

  pub(crate) async fn require_file(&self, file_id: &str) -> Result<FileRef> {
    self
      .find_file(file_id)
      .await?
      .ok_or_else(|| ess_core::Error::not_found("evacuation file", file_id).into())
  }

  /// Resolve every reference the aggregate makes before anything is written.
  /// `file_key` is `None` for a file that does not exist yet.
  async fn resolve_file_references(
    &self,
    file: &EvacuationFile,
    checked: CheckedFile<'_>,
    file_key: Option<Uuid>,
  ) -> Result<()> {
    self
      .require(
        lookup::ACTIVE_REGISTRANT,
        "registrant",
        encode_uuid(checked.primary_registrant_id),
      )
      .await?;

    if let Some(task) = &file.task_id {
      self.require(lookup::TASK, "task", task.clone()).await?;
    }

    let linked = file
      .household_members
      .iter()
      .filter(|m| m.member_id.is_some())
      .chain(&checked.needs_assessment.household_members)
      .filter_map(|m| m.linked_registrant_id);
    for registrant in linked {
      self
        .require(lookup::REGISTRANT, "registrant", encode_uuid(registrant))
        .await?;
    }

    if let Some(reviewer) = checked.needs_assessment.reviewed_by_id {
      self
        .require(lookup::TEAM_MEMBER, "team member", encode_uuid(reviewer))
        .await?;
    }

    self.check_member_ownership(file, checked, file_key).await
  }

  /// A household member belongs to at most one file. A new file may not name
  /// existing members; an update may only name members of its own file or
  /// members of none.
  async fn check_member_ownership(
    &self,
    file: &EvacuationFile,
    checked: CheckedFile<'_>,
    file_key: Option<Uuid>,
  ) -> Result<()> {
    let ids = file
      .household_members
      .iter()
      .chain(&checked.needs_assessment.household_members)
      .filter_map(|m| m.member_id);

    for member in ids {
      let member = encode_uuid(member);
      let taken = match file_key {
        None => self.exists(lookup::HOUSEHOLD_MEMBER, [member.clone()]).await?,
        Some(key) => {
          self
            .exists(lookup::MEMBER_OF_OTHER_FILE, [member.clone(), encode_uuid(key)])
            .await?
        }
      };
      if taken {
        return Err(
          ess_core::Error::InvariantViolation(format!(
            "household member {member} belongs to another file"
          ))
          .into(),
        );
      }
    }
    Ok(())
  }

  pub(crate) async fn write_new_file(&self, file: EvacuationFile) -> Result<String> {
    let checked = file.verify_invariants()?;
    self.resolve_file_references(&file, checked, None).await?;

    let file_key   = Uuid::new_v4();
    let key_str    = encode_uuid(file_key);
    let row        = FileRow::new(&file, checked);
    let members    = known_file_members(&file, checked.primary_registrant_id);
    let pets       = file.pets.clone();
    let created_at = encode_dt(Utc::now());
    let assessment = checked.needs_assessment.clone();
    let primary    = checked.primary_registrant_id;

    let file_number: i64 = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let number: i64 = tx.query_row(
          "SELECT COALESCE(MAX(file_number), ?1) + 1 FROM evacuation_files",
          [NUMBER_BASE],
          |r| r.get(0),
        )?;
        tx.execute(
          "INSERT INTO evacuation_files (
             file_key, file_number, status, active, primary_registrant_id,
             task_number, evacuated_from, security_phrase, created_at
           ) VALUES (?1, ?2, ?3, 1, ?4, ?5, ?6, ?7, ?8)",
          rusqlite::params![
            key_str,
            number,
            row.status,
            row.primary_registrant_id,
            row.task_number,
            row.evacuated_from,
            row.security_phrase,
            created_at,
          ],
        )?;
        insert_pets(&tx, &key_str, &pets)?;
        for m in &members {
          upsert_member(&tx, m)?;
          link_member(&tx, &m.member_id, Role::File, &key_str)?;
        }
        tx.commit()?;
        Ok(number)
      })
      .await?;

    let assessment_id =
      self.attach_needs_assessment(file_key, primary, assessment).await?;
    debug!(file_number, %assessment_id, "created evacuation file");
    Ok(file_number.to_string())
  }

  pub(crate) async fn write_existing_file(&self, file: EvacuationFile) -> Result<String> {
    let Some(file_id) = file.id.clone() else {
      return Err(
        ess_core::Error::InvariantViolation("an update needs a file id".into()).into(),
      );
    };
    let checked = file.verify_invariants()?;
    let existing = self.require_file(&file_id).await?;
    self
      .resolve_file_references(&file, checked, Some(existing.file_key))
      .await?;

    let key_str    = encode_uuid(existing.file_key);
    let row        = FileRow::new(&file, checked);
    let members    = known_file_members(&file, checked.primary_registrant_id);
    let pets       = file.pets.clone();
    let assessment = checked.needs_assessment.clone();
    let primary    = checked.primary_registrant_id;

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "UPDATE evacuation_files SET
             status = ?2,
             primary_registrant_id = ?3,
             task_number = ?4,
             evacuated_from = ?5,
             security_phrase = CASE WHEN ?6 THEN ?7 ELSE security_phrase END
           WHERE file_key = ?1",
          rusqlite::params![
            key_str,
            row.status,
            row.primary_registrant_id,
            row.task_number,
            row.evacuated_from,
            row.phrase_changed,
            row.security_phrase,
          ],
        )?;
        tx.execute("DELETE FROM pets WHERE file_key = ?1", [&key_str])?;
        insert_pets(&tx, &key_str, &pets)?;
        for m in &members {
          upsert_member(&tx, m)?;
          link_member(&tx, &m.member_id, Role::File, &key_str)?;
        }
        tx.commit()?;
        Ok(())
      })
      .await?;

    let assessment_id = self
      .attach_needs_assessment(existing.file_key, primary, assessment)
      .await?;
    debug!(%file_id, %assessment_id, "updated evacuation file");
    Ok(file_id)
  }

  /// Append a needs-assessment snapshot to a file and make it current. Its
  /// members are upserted and linked to both the file and the snapshot.
  async fn attach_needs_assessment(
    &self,
    file_key: Uuid,
    primary_registrant: Uuid,
    assessment: NeedsAssessment,
  ) -> Result<Uuid> {
    let assessment_id = Uuid::new_v4();
    let na_str        = encode_uuid(assessment_id);
    let key_str       = encode_uuid(file_key);
    let needs_json    = serde_json::to_string(&assessment.needs)?;
    let insurance     = assessment.insurance.as_ref().to_owned();
    let reviewer      = assessment.reviewed_by_id.map(encode_uuid);
    let jurisdiction  = assessment.jurisdiction.clone();
    let created_at    = encode_dt(Utc::now());
    let members: Vec<MemberRow> = assessment
      .household_members
      .iter()
      .map(|m| {
        MemberRow::new(m.member_id.unwrap_or_else(Uuid::new_v4), m, primary_registrant)
      })
      .collect();

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "INSERT INTO needs_assessments (
             needs_assessment_id, file_key, jurisdiction, reviewed_by_id,
             needs, insurance, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
          rusqlite::params![
            na_str,
            key_str,
            jurisdiction,
            reviewer,
            needs_json,
            insurance,
            created_at,
          ],
        )?;
        for m in &members {
          upsert_member(&tx, m)?;
          link_member(&tx, &m.member_id, Role::File, &key_str)?;
          link_member(&tx, &m.member_id, Role::NeedsAssessment, &na_str)?;
        }
        tx.execute(
          "UPDATE evacuation_files SET current_needs_assessment_id = ?2
           WHERE file_key = ?1",
          rusqlite::params![key_str, na_str],
        )?;
        tx.commit()?;
        Ok(())
      })
      .await?;
    Ok(assessment_id)
  }

  /// Logical delete. An unknown file id is returned unchanged.
  pub(crate) async fn deactivate(&self, file_id: String) -> Result<String> {
    let Some(existing) = self.find_file(&file_id).await? else {
      debug!(%file_id, "deactivation of unknown file ignored");
      return Ok(file_id);
    };

    let key_str = encode_uuid(existing.file_key);
    let status  = EvacuationFileStatus::Inactive.as_ref().to_owned();
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE evacuation_files SET active = 0, status = ?2 WHERE file_key = ?1",
          rusqlite::params![key_str, status],
        )?;
        Ok(())
      })
      .await?;
    debug!(%file_id, "deactivated evacuation file");
    Ok(file_id)
  }

  // ── Notes ─────────────────────────────────────────────────────────────────

  /// An author that is not a known team member is dropped from the note.
  async fn known_author(&self, author: Option<Uuid>) -> Result<Option<String>> {
    let Some(author) = author.map(encode_uuid) else {
      return Ok(None);
    };
    Ok(
      self
        .exists(lookup::TEAM_MEMBER, [author.clone()])
        .await?
        .then_some(author),
    )
  }

  pub(crate) async fn insert_note(&self, file_id: String, note: Note) -> Result<Uuid> {
    let file   = self.require_file(&file_id).await?;
    let author = self.known_author(note.added_by_id).await?;

    let note_id    = Uuid::new_v4();
    let id_str     = encode_uuid(note_id);
    let key_str    = encode_uuid(file.file_key);
    let created_at = encode_dt(note.created_at.unwrap_or_else(Utc::now));

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO notes (note_id, file_key, content, added_by_id, is_hidden, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![
            id_str,
            key_str,
            note.content,
            author,
            note.is_hidden,
            created_at,
          ],
        )?;
        Ok(())
      })
      .await?;
    debug!(%file_id, %note_id, "added note");
    Ok(note_id)
  }

  pub(crate) async fn rewrite_note(&self, file_id: String, note: Note) -> Result<Uuid> {
    let Some(note_id) = note.note_id else {
      return Err(
        ess_core::Error::InvariantViolation("a note update needs a note id".into()).into(),
      );
    };
    let file   = self.require_file(&file_id).await?;
    let author = self.known_author(note.added_by_id).await?;

    let id_str  = encode_uuid(note_id);
    let key_str = encode_uuid(file.file_key);

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE notes SET
             content = ?3,
             added_by_id = COALESCE(?4, added_by_id),
             is_hidden = ?5
           WHERE note_id = ?1 AND file_key = ?2",
          rusqlite::params![id_str, key_str, note.content, author, note.is_hidden],
        )?)
      })
      .await?;

    if changed == 0 {
      return Err(ess_core::Error::not_found("note", note_id).into());
    }
    debug!(%file_id, %note_id, "updated note");
    Ok(note_id)
  }
}
