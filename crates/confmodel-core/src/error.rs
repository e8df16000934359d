//! Error types for `confmodel-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("unknown configuration entity type: {0:?}")]
  UnknownEntityType(String),

  #[error("configuration entity type {0:?} is already registered")]
  DuplicateEntityType(String),

  #[error("invalid schema {entity:?}: {reason}")]
  InvalidSchema { entity: String, reason: String },

  #[error("invalid key for {entity:?}: {reason}")]
  InvalidKey { entity: String, reason: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
