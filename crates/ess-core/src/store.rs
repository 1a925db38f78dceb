//! The `CaseStore` trait.
//!
//! The trait is implemented by storage backends (e.g. `ess-store-sqlite`).
//! Higher layers (`ess-api`, the command dispatcher) depend on this
//! abstraction, not on any concrete backend.

use std::future::Future;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  StoreError,
  file::{EvacuationFile, Note},
  query::{EvacuationFilesQuery, SupportQuery},
  reference::{Registrant, Supplier, Task, TeamMember},
  support::{Queue, QueueItem, Support, SupportFlag, SupportStatusChange},
};

/// Outcome of [`CaseStore::submit_support_for_approval`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueAssignment {
  pub support_id:    String,
  pub queue_item_id: Uuid,
  pub queue:         Queue,
}

/// Abstraction over an evacuee-support case store.
///
/// Every write is its own unit of work; nothing is held open between calls.
/// Deletion is logical only.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait CaseStore: Send + Sync {
  type Error: StoreError;

  // ── Reference data ────────────────────────────────────────────────────

  fn upsert_registrant(
    &self,
    registrant: Registrant,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn upsert_team_member(
    &self,
    member: TeamMember,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn upsert_task(
    &self,
    task: Task,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn upsert_supplier(
    &self,
    supplier: Supplier,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Evacuation files ──────────────────────────────────────────────────

  /// Persist a new file aggregate and return its assigned file number.
  ///
  /// Fails with an invariant violation unless the needs assessment holds
  /// exactly one primary registrant, and with not-found if the primary
  /// registrant, the task, a linked registrant or the reviewer is missing.
  fn create_file(
    &self,
    file: EvacuationFile,
  ) -> impl Future<Output = Result<String, Self::Error>> + Send + '_;

  /// Overwrite an existing file aggregate. Pets are replaced wholesale and a
  /// new needs-assessment snapshot becomes current.
  fn update_file(
    &self,
    file: EvacuationFile,
  ) -> impl Future<Output = Result<String, Self::Error>> + Send + '_;

  /// Logically delete a file. Missing files are not an error.
  fn deactivate_file(
    &self,
    file_id: String,
  ) -> impl Future<Output = Result<String, Self::Error>> + Send + '_;

  /// Add a note to a file and return the note id.
  fn create_note(
    &self,
    file_id: String,
    note: Note,
  ) -> impl Future<Output = Result<Uuid, Self::Error>> + Send + '_;

  fn update_note(
    &self,
    file_id: String,
    note: Note,
  ) -> impl Future<Output = Result<Uuid, Self::Error>> + Send + '_;

  /// Resolve, refine and hydrate the files matching `query`.
  fn query_files<'a>(
    &'a self,
    query: &'a EvacuationFilesQuery,
  ) -> impl Future<Output = Result<Vec<EvacuationFile>, Self::Error>> + Send + 'a;

  // ── Supports ──────────────────────────────────────────────────────────

  /// Create or update each support under `file_id`, keyed by whether it
  /// carries an id. Returns the supports with their assigned ids.
  fn save_supports(
    &self,
    file_id: String,
    supports: Vec<Support>,
  ) -> impl Future<Output = Result<Vec<Support>, Self::Error>> + Send + '_;

  /// Apply a batch of status changes; either all of them or none are
  /// written. Returns the ids of the changed supports.
  fn change_support_status(
    &self,
    items: Vec<SupportStatusChange>,
  ) -> impl Future<Output = Result<Vec<String>, Self::Error>> + Send + '_;

  /// Attach `flags` to a support and route it to the review queue (if
  /// flagged) or the approval queue.
  fn submit_support_for_approval(
    &self,
    support_id: String,
    flags: Vec<SupportFlag>,
  ) -> impl Future<Output = Result<QueueAssignment, Self::Error>> + Send + '_;

  fn search_supports<'a>(
    &'a self,
    query: &'a SupportQuery,
  ) -> impl Future<Output = Result<Vec<Support>, Self::Error>> + Send + 'a;

  /// Queue items pointing at a support, oldest first.
  fn queue_items(
    &self,
    support_id: String,
  ) -> impl Future<Output = Result<Vec<QueueItem>, Self::Error>> + Send + '_;
}
