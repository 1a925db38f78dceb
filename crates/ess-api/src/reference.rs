//! Reference-data upserts. The path carries the key; the body the rest.

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
};
use chrono::NaiveDate;
use ess_core::{
  reference::{Registrant, Supplier, Task, TeamMember},
  store::CaseStore,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{error::ApiError, messaging::MessagingClient};

fn active_default() -> bool { true }

#[derive(Debug, Deserialize)]
pub struct RegistrantBody {
  pub first_name:    String,
  pub last_name:     String,
  pub date_of_birth: Option<NaiveDate>,
  #[serde(default = "active_default")]
  pub active:        bool,
}

/// `PUT /registrants/{id}`
pub async fn put_registrant<S: CaseStore>(
  State(client): State<MessagingClient<S>>,
  Path(id): Path<Uuid>,
  Json(body): Json<RegistrantBody>,
) -> Result<StatusCode, ApiError> {
  let registrant = Registrant {
    registrant_id: id,
    first_name:    body.first_name,
    last_name:     body.last_name,
    date_of_birth: body.date_of_birth,
    active:        body.active,
  };
  client
    .run("upsert_registrant", client.store().upsert_registrant(registrant))
    .await?;
  Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct TeamMemberBody {
  pub display_name: String,
  #[serde(default = "active_default")]
  pub active:       bool,
}

/// `PUT /team-members/{id}`
pub async fn put_team_member<S: CaseStore>(
  State(client): State<MessagingClient<S>>,
  Path(id): Path<Uuid>,
  Json(body): Json<TeamMemberBody>,
) -> Result<StatusCode, ApiError> {
  let member = TeamMember {
    team_member_id: id,
    display_name:   body.display_name,
    active:         body.active,
  };
  client
    .run("upsert_team_member", client.store().upsert_team_member(member))
    .await?;
  Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct TaskBody {
  pub community: Option<String>,
  #[serde(default = "active_default")]
  pub active:    bool,
}

/// `PUT /tasks/{id}`
pub async fn put_task<S: CaseStore>(
  State(client): State<MessagingClient<S>>,
  Path(task_number): Path<String>,
  Json(body): Json<TaskBody>,
) -> Result<StatusCode, ApiError> {
  let task = Task { task_number, community: body.community, active: body.active };
  client
    .run("upsert_task", client.store().upsert_task(task))
    .await?;
  Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct SupplierBody {
  pub name:   String,
  #[serde(default = "active_default")]
  pub active: bool,
}

/// `PUT /suppliers/{id}`
pub async fn put_supplier<S: CaseStore>(
  State(client): State<MessagingClient<S>>,
  Path(id): Path<Uuid>,
  Json(body): Json<SupplierBody>,
) -> Result<StatusCode, ApiError> {
  let supplier = Supplier { supplier_id: id, name: body.name, active: body.active };
  client
    .run("upsert_supplier", client.store().upsert_supplier(supplier))
    .await?;
  Ok(StatusCode::NO_CONTENT)
}
