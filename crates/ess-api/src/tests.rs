//! Router tests against an in-memory store.

use std::sync::Arc;

use axum::{
  Router,
  body::Body,
  http::{Method, Request, StatusCode, header::CONTENT_TYPE},
};
use ess_store_sqlite::SqliteStore;
use serde_json::{Value, json};
use tower::ServiceExt as _;
use uuid::Uuid;

use crate::api_router;

async fn app() -> Router {
  let store = SqliteStore::open_in_memory()
    .await
    .expect("in-memory store");
  api_router(Arc::new(store))
}

async fn call(
  app: &Router,
  method: Method,
  uri: &str,
  body: Option<Value>,
) -> (StatusCode, Value) {
  let request = Request::builder()
    .method(method)
    .uri(uri)
    .header(CONTENT_TYPE, "application/json")
    .body(body.map_or_else(Body::empty, |b| Body::from(b.to_string())))
    .unwrap();
  let response = app.clone().oneshot(request).await.unwrap();
  let status = response.status();
  let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
    .await
    .unwrap();
  let value = if bytes.is_empty() {
    Value::Null
  } else {
    serde_json::from_slice(&bytes).unwrap()
  };
  (status, value)
}

/// Seed reference data; returns the registrant id.
async fn seed(app: &Router) -> Uuid {
  let registrant = Uuid::new_v4();
  let (status, _) = call(
    app,
    Method::PUT,
    &format!("/registrants/{registrant}"),
    Some(json!({ "first_name": "Sam", "last_name": "Rivers" })),
  )
  .await;
  assert_eq!(status, StatusCode::NO_CONTENT);

  let (status, _) = call(
    app,
    Method::PUT,
    "/tasks/T-1",
    Some(json!({ "community": "Kamloops" })),
  )
  .await;
  assert_eq!(status, StatusCode::NO_CONTENT);

  registrant
}

fn file_body(registrant: Uuid, primaries: usize) -> Value {
  let members: Vec<Value> = (0..primaries.max(1))
    .map(|i| {
      json!({
        "first_name": "Sam",
        "last_name": "Rivers",
        "is_primary_registrant": i < primaries,
      })
    })
    .collect();
  json!({
    "primary_registrant_id": registrant,
    "task_id": "T-1",
    "security_phrase": "blue heron",
    "needs_assessment": {
      "needs": { "food": true },
      "household_members": members,
    },
  })
}

#[tokio::test]
async fn file_lifecycle_over_http() {
  let app = app().await;
  let registrant = seed(&app).await;

  let (status, body) =
    call(&app, Method::POST, "/files", Some(file_body(registrant, 1))).await;
  assert_eq!(status, StatusCode::CREATED);
  assert_eq!(body["id"], "100001");

  let (status, body) = call(&app, Method::GET, "/files?file_id=100001", None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body.as_array().map(Vec::len), Some(1));
  assert_eq!(body[0]["security_phrase"], "b*****");

  let (status, _) = call(&app, Method::DELETE, "/files/100001", None).await;
  assert_eq!(status, StatusCode::OK);

  let (_, body) = call(&app, Method::GET, "/files?file_id=100001", None).await;
  assert_eq!(body, json!([]));
}

#[tokio::test]
async fn invariant_violations_are_422() {
  let app = app().await;
  let registrant = seed(&app).await;

  let (status, body) =
    call(&app, Method::POST, "/files", Some(file_body(registrant, 2))).await;
  assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
  assert!(body["error"].is_string());

  let (status, _) = call(&app, Method::GET, "/supports", None).await;
  assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn missing_entities_are_404() {
  let app = app().await;
  let registrant = seed(&app).await;

  let (status, _) = call(
    &app,
    Method::PUT,
    "/files/999999",
    Some(file_body(registrant, 1)),
  )
  .await;
  assert_eq!(status, StatusCode::NOT_FOUND);

  let (status, _) =
    call(&app, Method::GET, "/supports/999999/queue-items", None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn support_lifecycle_over_http() {
  let app = app().await;
  let registrant = seed(&app).await;
  call(&app, Method::POST, "/files", Some(file_body(registrant, 1))).await;

  let (_, files) = call(
    &app,
    Method::GET,
    "/files?file_id=100001&mask_security_phrase=false",
    None,
  )
  .await;
  assert_eq!(files[0]["security_phrase"], "blue heron");
  let member = files[0]["household_members"][0]["member_id"].clone();

  let (status, saved) = call(
    &app,
    Method::POST,
    "/files/100001/supports",
    Some(json!([{
      "category": "food_groceries",
      "method": "etransfer",
      "valid_from": "2024-07-01T00:00:00Z",
      "valid_to": "2024-07-04T00:00:00Z",
      "amount_cents": 5000,
      "payee_id": registrant,
      "household_member_ids": [member],
    }])),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(saved[0]["id"], "100001");

  let (status, _) = call(
    &app,
    Method::POST,
    "/supports/status",
    Some(json!([{
      "support_id": "100001",
      "to_status": "void",
      "reason": "new_supplier_required",
    }])),
  )
  .await;
  assert_eq!(status, StatusCode::CONFLICT);

  let (status, assignment) =
    call(&app, Method::POST, "/supports/100001/submit", Some(json!({}))).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(assignment["queue"], "approval");

  let (_, items) = call(&app, Method::GET, "/supports/100001/queue-items", None).await;
  assert_eq!(items.as_array().map(Vec::len), Some(1));
  assert_eq!(items[0]["object_type_code"], 10056);

  let (_, found) = call(&app, Method::GET, "/supports?by_status=pending_approval", None).await;
  assert_eq!(found.as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn commands_and_queries_are_dispatched() {
  let app = app().await;
  let registrant = seed(&app).await;

  let (status, reply) = call(
    &app,
    Method::POST,
    "/commands",
    Some(json!({
      "type": "save_evacuation_file",
      "data": file_body(registrant, 1),
    })),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(reply, json!({ "type": "id", "data": "100001" }));

  let (status, reply) = call(
    &app,
    Method::POST,
    "/queries",
    Some(json!({ "type": "supports", "data": { "by_file_id": "100001" } })),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(reply, json!({ "type": "supports", "data": [] }));

  let (status, _) = call(
    &app,
    Method::POST,
    "/queries",
    Some(json!({ "type": "supports", "data": {} })),
  )
  .await;
  assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}
