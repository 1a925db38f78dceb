//! Handlers for `/files` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/files` | Query params, see [`ListParams`]; no criteria returns `[]` |
//! | `POST`   | `/files` | Body: [`EvacuationFile`] without `id`; returns 201 + `{"id"}` |
//! | `PUT`    | `/files/{id}` | Body: [`EvacuationFile`]; the path id wins |
//! | `DELETE` | `/files/{id}` | Logical delete |
//! | `POST`   | `/files/{id}/notes` | Body: [`Note`]; returns 201 + `{"id"}` |
//! | `PUT`    | `/files/{id}/notes/{note_id}` | Body: [`Note`] |
//! | `POST`   | `/files/{id}/supports` | Body: `[Support]`; returns the saved supports |

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use chrono::{DateTime, Utc};
use ess_core::{
  file::{EvacuationFile, EvacuationFileStatus, Note},
  query::EvacuationFilesQuery,
  store::CaseStore,
  support::Support,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{error::ApiError, messaging::MessagingClient};

#[derive(Debug, Serialize)]
pub struct Written {
  pub id: String,
}

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
  pub file_id:                Option<String>,
  pub needs_assessment_id:    Option<Uuid>,
  pub primary_registrant_id:  Option<Uuid>,
  pub linked_registrant_id:   Option<Uuid>,
  pub household_member_id:    Option<Uuid>,
  pub registration_date_from: Option<DateTime<Utc>>,
  pub registration_date_to:   Option<DateTime<Utc>>,
  /// A single status to restrict to.
  pub status:                 Option<EvacuationFileStatus>,
  pub limit:                  Option<usize>,
  /// Defaults to `true`.
  pub mask_security_phrase:   Option<bool>,
}

impl From<ListParams> for EvacuationFilesQuery {
  fn from(p: ListParams) -> Self {
    Self {
      file_id:                p.file_id,
      needs_assessment_id:    p.needs_assessment_id,
      primary_registrant_id:  p.primary_registrant_id,
      linked_registrant_id:   p.linked_registrant_id,
      household_member_id:    p.household_member_id,
      registration_date_from: p.registration_date_from,
      registration_date_to:   p.registration_date_to,
      include_statuses:       p.status.into_iter().collect(),
      limit:                  p.limit,
      mask_security_phrase:   p.mask_security_phrase.unwrap_or(true),
    }
  }
}

/// `GET /files[?file_id=...][&primary_registrant_id=...][...]`
pub async fn list<S: CaseStore>(
  State(client): State<MessagingClient<S>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<EvacuationFile>>, ApiError> {
  let query = EvacuationFilesQuery::from(params);
  let files = client
    .run("query_files", client.store().query_files(&query))
    .await?;
  Ok(Json(files))
}

// ─── Write ────────────────────────────────────────────────────────────────────

/// `POST /files`
pub async fn create<S: CaseStore>(
  State(client): State<MessagingClient<S>>,
  Json(file): Json<EvacuationFile>,
) -> Result<impl IntoResponse, ApiError> {
  if file.id.is_some() {
    return Err(ApiError::BadRequest(
      "a new file must not carry an id; use PUT /files/{id}".into(),
    ));
  }
  let id = client
    .run("create_file", client.store().create_file(file))
    .await?;
  Ok((StatusCode::CREATED, Json(Written { id })))
}

/// `PUT /files/{id}`
pub async fn update<S: CaseStore>(
  State(client): State<MessagingClient<S>>,
  Path(id): Path<String>,
  Json(mut file): Json<EvacuationFile>,
) -> Result<Json<Written>, ApiError> {
  file.id = Some(id);
  let id = client
    .run("update_file", client.store().update_file(file))
    .await?;
  Ok(Json(Written { id }))
}

/// `DELETE /files/{id}`
pub async fn deactivate<S: CaseStore>(
  State(client): State<MessagingClient<S>>,
  Path(id): Path<String>,
) -> Result<Json<Written>, ApiError> {
  let id = client
    .run("deactivate_file", client.store().deactivate_file(id))
    .await?;
  Ok(Json(Written { id }))
}

// ─── Notes ────────────────────────────────────────────────────────────────────

/// `POST /files/{id}/notes`
pub async fn create_note<S: CaseStore>(
  State(client): State<MessagingClient<S>>,
  Path(file_id): Path<String>,
  Json(mut note): Json<Note>,
) -> Result<impl IntoResponse, ApiError> {
  note.note_id = None;
  let id = client
    .run("create_note", client.store().create_note(file_id, note))
    .await?;
  Ok((StatusCode::CREATED, Json(Written { id: id.to_string() })))
}

/// `PUT /files/{id}/notes/{note_id}`
pub async fn update_note<S: CaseStore>(
  State(client): State<MessagingClient<S>>,
  Path((file_id, note_id)): Path<(String, Uuid)>,
  Json(mut note): Json<Note>,
) -> Result<Json<Written>, ApiError> {
  note.note_id = Some(note_id);
  let id = client
    .run("update_note", client.store().update_note(file_id, note))
    .await?;
  Ok(Json(Written { id: id.to_string() }))
}

// ─── Supports ─────────────────────────────────────────────────────────────────

/// `POST /files/{id}/supports`
pub async fn save_supports<S: CaseStore>(
  State(client): State<MessagingClient<S>>,
  Path(file_id): Path<String>,
  Json(supports): Json<Vec<Support>>,
) -> Result<Json<Vec<Support>>, ApiError> {
  let saved = client
    .run("save_supports", client.store().save_supports(file_id, supports))
    .await?;
  Ok(Json(saved))
}
