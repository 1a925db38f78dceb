//! JSON REST API for the evacuee-support case store.
//!
//! Exposes an axum [`Router`] backed by any [`ess_core::store::CaseStore`].
//! Auth, TLS, and transport concerns are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", ess_api::api_router(store.clone()))
//! ```

pub mod dispatch;
pub mod error;
pub mod files;
pub mod messaging;
pub mod reference;
pub mod supports;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post, put},
};
use ess_core::store::CaseStore;

pub use error::ApiError;
pub use messaging::MessagingClient;

/// Build a fully-materialised API router for `store`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(store: Arc<S>) -> Router<()>
where
  S: CaseStore + 'static,
{
  Router::new()
    // Messages
    .route("/commands", post(dispatch::command::<S>))
    .route("/queries", post(dispatch::query::<S>))
    // Files
    .route("/files", get(files::list::<S>).post(files::create::<S>))
    .route(
      "/files/{id}",
      put(files::update::<S>).delete(files::deactivate::<S>),
    )
    .route("/files/{id}/notes", post(files::create_note::<S>))
    .route("/files/{id}/notes/{note_id}", put(files::update_note::<S>))
    .route("/files/{id}/supports", post(files::save_supports::<S>))
    // Supports
    .route("/supports", get(supports::search::<S>))
    .route("/supports/status", post(supports::change_status::<S>))
    .route("/supports/{id}/submit", post(supports::submit::<S>))
    .route("/supports/{id}/queue-items", get(supports::queue_items::<S>))
    // Reference data
    .route("/registrants/{id}", put(reference::put_registrant::<S>))
    .route("/team-members/{id}", put(reference::put_team_member::<S>))
    .route("/tasks/{id}", put(reference::put_task::<S>))
    .route("/suppliers/{id}", put(reference::put_supplier::<S>))
    .with_state(MessagingClient::new(store))
}

#[cfg(test)]
mod tests;
