//! [`SqliteStore`]: the SQLite implementation of [`CaseStore`].
//!
//! The aggregate writer lives in [`crate::files`], the support lifecycle in
//! [`crate::supports`] and the query assembler in [`crate::read`]; this module
//! owns the connection, reference-data upserts and the trait wiring.

use std::path::Path;

use ess_core::{
  file::{EvacuationFile, Note},
  query::{EvacuationFilesQuery, SupportQuery},
  reference::{Registrant, Supplier, Task, TeamMember},
  store::{CaseStore, QueueAssignment},
  support::{QueueItem, Support, SupportFlag, SupportStatusChange},
};
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use crate::{
  Result,
  encode::{encode_date, encode_uuid},
  schema::SCHEMA,
};

// ─── Lookups ─────────────────────────────────────────────────────────────────

/// Existence checks used to resolve references before a write. Each takes a
/// single key parameter unless noted.
pub(crate) mod lookup {
  pub const REGISTRANT: &str =
    "SELECT 1 FROM registrants WHERE registrant_id = ?1";
  pub const ACTIVE_REGISTRANT: &str =
    "SELECT 1 FROM registrants WHERE registrant_id = ?1 AND active = 1";
  pub const TASK: &str = "SELECT 1 FROM tasks WHERE task_number = ?1";
  pub const TEAM_MEMBER: &str =
    "SELECT 1 FROM team_members WHERE team_member_id = ?1";
  pub const ACTIVE_SUPPLIER: &str =
    "SELECT 1 FROM suppliers WHERE supplier_id = ?1 AND active = 1";
  pub const HOUSEHOLD_MEMBER: &str =
    "SELECT 1 FROM household_members WHERE member_id = ?1";
  /// Member `?1` linked to file `?2`.
  pub const MEMBER_OF_FILE: &str = "SELECT 1 FROM member_links
     WHERE member_id = ?1 AND role = 'file' AND owner_id = ?2";
  /// Member `?1` linked to any file other than `?2`.
  pub const MEMBER_OF_OTHER_FILE: &str = "SELECT 1 FROM member_links
     WHERE member_id = ?1 AND role = 'file' AND owner_id <> ?2";
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A case store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  pub(crate) conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Run one of the [`lookup`] queries.
  pub(crate) async fn exists<const N: usize>(
    &self,
    sql: &'static str,
    keys: [String; N],
  ) -> Result<bool> {
    let found = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(sql, rusqlite::params_from_iter(keys.iter()), |_| Ok(())).optional()?.is_some())
      })
      .await?;
    Ok(found)
  }

  /// Like [`Self::exists`], failing with not-found when there is no row.
  pub(crate) async fn require(
    &self,
    sql: &'static str,
    entity: &'static str,
    key: String,
  ) -> Result<()> {
    if self.exists(sql, [key.clone()]).await? {
      Ok(())
    } else {
      Err(ess_core::Error::not_found(entity, key).into())
    }
  }
}

// ─── CaseStore impl ──────────────────────────────────────────────────────────

impl CaseStore for SqliteStore {
  type Error = crate::Error;

  // ── Reference data ────────────────────────────────────────────────────────

  async fn upsert_registrant(&self, registrant: Registrant) -> Result<()> {
    let id  = encode_uuid(registrant.registrant_id);
    let dob = registrant.date_of_birth.map(encode_date);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO registrants (registrant_id, first_name, last_name, date_of_birth, active)
           VALUES (?1, ?2, ?3, ?4, ?5)
           ON CONFLICT (registrant_id) DO UPDATE SET
             first_name = excluded.first_name,
             last_name = excluded.last_name,
             date_of_birth = excluded.date_of_birth,
             active = excluded.active",
          rusqlite::params![
            id,
            registrant.first_name,
            registrant.last_name,
            dob,
            registrant.active,
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn upsert_team_member(&self, member: TeamMember) -> Result<()> {
    let id = encode_uuid(member.team_member_id);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO team_members (team_member_id, display_name, active)
           VALUES (?1, ?2, ?3)
           ON CONFLICT (team_member_id) DO UPDATE SET
             display_name = excluded.display_name,
             active = excluded.active",
          rusqlite::params![id, member.display_name, member.active],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn upsert_task(&self, task: Task) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO tasks (task_number, community, active)
           VALUES (?1, ?2, ?3)
           ON CONFLICT (task_number) DO UPDATE SET
             community = excluded.community,
             active = excluded.active",
          rusqlite::params![task.task_number, task.community, task.active],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn upsert_supplier(&self, supplier: Supplier) -> Result<()> {
    let id = encode_uuid(supplier.supplier_id);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO suppliers (supplier_id, name, active)
           VALUES (?1, ?2, ?3)
           ON CONFLICT (supplier_id) DO UPDATE SET
             name = excluded.name,
             active = excluded.active",
          rusqlite::params![id, supplier.name, supplier.active],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Evacuation files ──────────────────────────────────────────────────────

  async fn create_file(&self, file: EvacuationFile) -> Result<String> {
    self.write_new_file(file).await
  }

  async fn update_file(&self, file: EvacuationFile) -> Result<String> {
    self.write_existing_file(file).await
  }

  async fn deactivate_file(&self, file_id: String) -> Result<String> {
    self.deactivate(file_id).await
  }

  async fn create_note(&self, file_id: String, note: Note) -> Result<Uuid> {
    self.insert_note(file_id, note).await
  }

  async fn update_note(&self, file_id: String, note: Note) -> Result<Uuid> {
    self.rewrite_note(file_id, note).await
  }

  async fn query_files(
    &self,
    query: &EvacuationFilesQuery,
  ) -> Result<Vec<EvacuationFile>> {
    self.assemble_files(query).await
  }

  // ── Supports ──────────────────────────────────────────────────────────────

  async fn save_supports(
    &self,
    file_id: String,
    supports: Vec<Support>,
  ) -> Result<Vec<Support>> {
    self.write_supports(file_id, supports).await
  }

  async fn change_support_status(
    &self,
    items: Vec<SupportStatusChange>,
  ) -> Result<Vec<String>> {
    self.apply_status_changes(items).await
  }

  async fn submit_support_for_approval(
    &self,
    support_id: String,
    flags: Vec<SupportFlag>,
  ) -> Result<QueueAssignment> {
    self.enqueue_for_approval(support_id, flags).await
  }

  async fn search_supports(&self, query: &SupportQuery) -> Result<Vec<Support>> {
    self.find_supports(query).await
  }

  async fn queue_items(&self, support_id: String) -> Result<Vec<QueueItem>> {
    self.read_queue_items(support_id).await
  }
}
