//! [`MessagingClient`]: the single boundary where store calls are dispatched
//! and their failures are logged.

use std::{future::Future, sync::Arc};

use ess_core::{
  ErrorKind, StoreError,
  command::{self, Command, CommandReply, Query, QueryReply},
  store::CaseStore,
};
use tracing::{debug, error};
use uuid::Uuid;

use crate::error::ApiError;

/// Dispatches commands and queries against a store.
///
/// Every failure is logged exactly once here with a fresh correlation id;
/// callers only see the classified [`ApiError`].
pub struct MessagingClient<S> {
  store: Arc<S>,
}

impl<S> Clone for MessagingClient<S> {
  fn clone(&self) -> Self { Self { store: Arc::clone(&self.store) } }
}

impl<S: CaseStore> MessagingClient<S> {
  pub fn new(store: Arc<S>) -> Self { Self { store } }

  pub fn store(&self) -> &S { &self.store }

  /// Await one store operation, logging and classifying its failure.
  pub async fn run<T, F>(&self, operation: &'static str, fut: F) -> Result<T, ApiError>
  where
    F: Future<Output = Result<T, S::Error>>,
  {
    match fut.await {
      Ok(value) => {
        debug!(operation, "handled");
        Ok(value)
      }
      Err(err) => Err(Self::failure(operation, &err)),
    }
  }

  pub async fn send(&self, command: Command) -> Result<CommandReply, ApiError> {
    let operation = command.name();
    self
      .run(operation, command::execute(self.store.as_ref(), command))
      .await
  }

  /// Like [`Self::send`], but a missing entity is an empty answer rather than
  /// an error.
  pub async fn ask(&self, query: Query) -> Result<Option<QueryReply>, ApiError> {
    let operation = query.name();
    match command::ask(self.store.as_ref(), query).await {
      Ok(reply) => Ok(Some(reply)),
      Err(err) if err.kind() == ErrorKind::NotFound => {
        debug!(operation, error = %err, "query found nothing");
        Ok(None)
      }
      Err(err) => Err(Self::failure(operation, &err)),
    }
  }

  fn failure(operation: &'static str, err: &S::Error) -> ApiError {
    let correlation_id = Uuid::new_v4();
    error!(
      %correlation_id,
      operation,
      kind = ?err.kind(),
      error = %err,
      "store operation failed"
    );
    ApiError::from_store(err, correlation_id)
  }
}
