//! Error types for `ess-core`.

use thiserror::Error;

use crate::support::{SupportMethod, SupportStatus};

#[derive(Debug, Error)]
pub enum Error {
  #[error("{entity} {id} not found")]
  NotFound { entity: &'static str, id: String },

  #[error("invariant violation: {0}")]
  InvariantViolation(String),

  #[error(
    "support {support_id}: transition to {to} is not supported for \
     {method} supports"
  )]
  UnsupportedTransition {
    support_id: String,
    method:     SupportMethod,
    to:         SupportStatus,
  },

  #[error("unknown void reason: {0:?}")]
  UnknownVoidReason(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

impl Error {
  pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
    Self::NotFound { entity, id: id.to_string() }
  }

  pub fn kind(&self) -> ErrorKind {
    match self {
      Self::NotFound { .. } => ErrorKind::NotFound,
      Self::InvariantViolation(_) | Self::UnknownVoidReason(_) => {
        ErrorKind::InvariantViolation
      }
      Self::UnsupportedTransition { .. } => ErrorKind::UnsupportedTransition,
      Self::Serialization(_) => ErrorKind::Server,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

// ─── Classification ──────────────────────────────────────────────────────────

/// Coarse classification used by outer layers to pick a response without
/// knowing the concrete backend error type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  /// A referenced entity (file, registrant, task, supplier, support, ...) is
  /// missing.
  NotFound,
  InvariantViolation,
  UnsupportedTransition,
  /// Opaque backing-store failure.
  Server,
}

/// Implemented by every [`crate::store::CaseStore`] error type.
pub trait StoreError: std::error::Error + Send + Sync + 'static {
  fn kind(&self) -> ErrorKind;
}

impl StoreError for Error {
  fn kind(&self) -> ErrorKind { Error::kind(self) }
}
