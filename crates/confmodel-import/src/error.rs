//! Error types for the import pipeline.

use confmodel_core::validate::ValidationErrors;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// The input is not JSON, or lacks the `model`/`data` keys.
  #[error("JSON parse error: {0}")]
  MalformedInput(#[source] serde_json::Error),

  #[error("unknown configuration entity type: {0:?}")]
  UnknownEntityType(String),

  /// An explicitly named acting user does not exist.
  #[error("no user matches username {0:?}")]
  UnknownUser(String),

  #[error("validation failed: {0}")]
  ValidationFailed(ValidationErrors),

  #[error("core error: {0}")]
  Core(confmodel_core::Error),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  pub(crate) fn store<E>(err: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(err))
  }
}

impl From<confmodel_core::Error> for Error {
  fn from(err: confmodel_core::Error) -> Self {
    match err {
      confmodel_core::Error::UnknownEntityType(name) => {
        Self::UnknownEntityType(name)
      }
      other => Self::Core(other),
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
