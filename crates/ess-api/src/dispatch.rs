//! Message endpoints: a tagged [`Command`] or [`Query`] in, its reply out.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/commands` | Body: `{"type":"save_note","data":{...}}` |
//! | `POST` | `/queries`  | Body: `{"type":"supports","data":{...}}`; `null` when nothing was found |

use axum::{Json, extract::State};
use ess_core::{
  command::{Command, CommandReply, Query, QueryReply},
  store::CaseStore,
};

use crate::{error::ApiError, messaging::MessagingClient};

/// `POST /commands`
pub async fn command<S: CaseStore>(
  State(client): State<MessagingClient<S>>,
  Json(command): Json<Command>,
) -> Result<Json<CommandReply>, ApiError> {
  Ok(Json(client.send(command).await?))
}

/// `POST /queries`
pub async fn query<S: CaseStore>(
  State(client): State<MessagingClient<S>>,
  Json(query): Json<Query>,
) -> Result<Json<Option<QueryReply>>, ApiError> {
  Ok(Json(client.ask(query).await?))
}
