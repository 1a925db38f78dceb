//! Handlers for `/supports` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/supports` | `?by_id`, `by_manual_referral_id`, `by_file_id`, `by_status`, `limit`; one criterion required |
//! | `POST` | `/supports/status` | Body: `[SupportStatusChange]`; all or nothing |
//! | `POST` | `/supports/{id}/submit` | Body: `{"flags":[...]}` |
//! | `GET`  | `/supports/{id}/queue-items` | |

use axum::{
  Json,
  extract::{Path, Query, State},
};
use ess_core::{
  query::SupportQuery,
  store::{CaseStore, QueueAssignment},
  support::{QueueItem, Support, SupportFlag, SupportStatusChange},
};
use serde::Deserialize;

use crate::{error::ApiError, messaging::MessagingClient};

/// `GET /supports`
pub async fn search<S: CaseStore>(
  State(client): State<MessagingClient<S>>,
  Query(query): Query<SupportQuery>,
) -> Result<Json<Vec<Support>>, ApiError> {
  let supports = client
    .run("search_supports", client.store().search_supports(&query))
    .await?;
  Ok(Json(supports))
}

/// `POST /supports/status`
pub async fn change_status<S: CaseStore>(
  State(client): State<MessagingClient<S>>,
  Json(items): Json<Vec<SupportStatusChange>>,
) -> Result<Json<Vec<String>>, ApiError> {
  let ids = client
    .run("change_support_status", client.store().change_support_status(items))
    .await?;
  Ok(Json(ids))
}

#[derive(Debug, Default, Deserialize)]
pub struct SubmitBody {
  #[serde(default)]
  pub flags: Vec<SupportFlag>,
}

/// `POST /supports/{id}/submit`
pub async fn submit<S: CaseStore>(
  State(client): State<MessagingClient<S>>,
  Path(id): Path<String>,
  Json(body): Json<SubmitBody>,
) -> Result<Json<QueueAssignment>, ApiError> {
  let assignment = client
    .run(
      "submit_support_for_approval",
      client.store().submit_support_for_approval(id, body.flags),
    )
    .await?;
  Ok(Json(assignment))
}

/// `GET /supports/{id}/queue-items`
pub async fn queue_items<S: CaseStore>(
  State(client): State<MessagingClient<S>>,
  Path(id): Path<String>,
) -> Result<Json<Vec<QueueItem>>, ApiError> {
  let items = client
    .run("queue_items", client.store().queue_items(id))
    .await?;
  Ok(Json(items))
}
