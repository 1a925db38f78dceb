//! Closed sets of commands and queries, dispatched against any
//! [`CaseStore`].
//!
//! Callers that speak a request/response protocol serialise these enums
//! directly; the variant name is the `type` tag.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  file::{EvacuationFile, Note},
  query::{EvacuationFilesQuery, SupportQuery},
  store::{CaseStore, QueueAssignment},
  support::{Support, SupportFlag, SupportStatusChange},
};

// ─── Commands ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Command {
  /// Create when the file has no id, update otherwise.
  SaveEvacuationFile(EvacuationFile),
  DeactivateEvacuationFile {
    file_id: String,
  },
  SaveNote {
    file_id: String,
    note:    Note,
  },
  SaveSupports {
    file_id:  String,
    supports: Vec<Support>,
  },
  ChangeSupportStatus {
    items: Vec<SupportStatusChange>,
  },
  SubmitSupportForApproval {
    support_id: String,
    #[serde(default)]
    flags:      Vec<SupportFlag>,
  },
}

impl Command {
  /// Stable name used in logs.
  pub fn name(&self) -> &'static str {
    match self {
      Self::SaveEvacuationFile(_) => "save_evacuation_file",
      Self::DeactivateEvacuationFile { .. } => "deactivate_evacuation_file",
      Self::SaveNote { .. } => "save_note",
      Self::SaveSupports { .. } => "save_supports",
      Self::ChangeSupportStatus { .. } => "change_support_status",
      Self::SubmitSupportForApproval { .. } => "submit_support_for_approval",
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum CommandReply {
  /// The id of the file or note that was written.
  Id(String),
  Supports(Vec<Support>),
  Ids(Vec<String>),
  Queued(QueueAssignment),
}

/// Run `command` against `store`.
pub async fn execute<S: CaseStore>(
  store: &S,
  command: Command,
) -> Result<CommandReply, S::Error> {
  let reply = match command {
    Command::SaveEvacuationFile(file) => {
      let id = if file.id.is_none() {
        store.create_file(file).await?
      } else {
        store.update_file(file).await?
      };
      CommandReply::Id(id)
    }
    Command::DeactivateEvacuationFile { file_id } => {
      CommandReply::Id(store.deactivate_file(file_id).await?)
    }
    Command::SaveNote { file_id, note } => {
      let id: Uuid = if note.note_id.is_none() {
        store.create_note(file_id, note).await?
      } else {
        store.update_note(file_id, note).await?
      };
      CommandReply::Id(id.to_string())
    }
    Command::SaveSupports { file_id, supports } => {
      CommandReply::Supports(store.save_supports(file_id, supports).await?)
    }
    Command::ChangeSupportStatus { items } => {
      CommandReply::Ids(store.change_support_status(items).await?)
    }
    Command::SubmitSupportForApproval { support_id, flags } => {
      CommandReply::Queued(
        store.submit_support_for_approval(support_id, flags).await?,
      )
    }
  };
  Ok(reply)
}

// ─── Queries ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Query {
  EvacuationFiles(EvacuationFilesQuery),
  Supports(SupportQuery),
}

impl Query {
  pub fn name(&self) -> &'static str {
    match self {
      Self::EvacuationFiles(_) => "evacuation_files",
      Self::Supports(_) => "supports",
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum QueryReply {
  EvacuationFiles(Vec<EvacuationFile>),
  Supports(Vec<Support>),
}

/// Run `query` against `store`.
pub async fn ask<S: CaseStore>(
  store: &S,
  query: Query,
) -> Result<QueryReply, S::Error> {
  Ok(match query {
    Query::EvacuationFiles(q) => {
      QueryReply::EvacuationFiles(store.query_files(&q).await?)
    }
    Query::Supports(q) => QueryReply::Supports(store.search_supports(&q).await?),
  })
}
