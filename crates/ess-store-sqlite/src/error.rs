//! Error type for `ess-store-sqlite`.

use ess_core::{ErrorKind, StoreError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// A domain rule was violated or a referenced record is missing.
  #[error(transparent)]
  Core(#[from] ess_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// A stored discriminant did not match any known variant.
  #[error("unknown {what}: {value:?}")]
  Decode { what: &'static str, value: String },
}

impl StoreError for Error {
  fn kind(&self) -> ErrorKind {
    match self {
      Self::Core(e) => e.kind(),
      _ => ErrorKind::Server,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
