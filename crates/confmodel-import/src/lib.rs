//! JSON import for versioned configuration models.
//!
//! Turns an untrusted JSON document into validated, attributed configuration
//! rows. Parsing fails before any schema lookup; validation covers the whole
//! batch before any row is written.
//!
//! # Quick start
//!
//! ```no_run
//! # async fn run(store: confmodel_store_sqlite::SqliteStore) -> confmodel_import::Result<()> {
//! use confmodel_core::{FieldSpec, Registry, Schema};
//!
//! let registry = Registry::from_schemas([Schema::new(
//!   "config_models.exampledeserializeconfig",
//!   vec![FieldSpec::text("name"), FieldSpec::integer("int_field").with_default(10)],
//!   ["name"],
//! )?])?;
//!
//! let input = br#"{"model": "config_models.exampledeserializeconfig", "data": [{"name": "dino"}]}"#;
//! let created = confmodel_import::deserialize_json(&input[..], &registry, &store, None).await?;
//! assert_eq!(created, 1);
//! # Ok(())
//! # }
//! ```

mod document;
mod ingest;

pub mod error;

use std::io::Read;

use confmodel_core::{
  Registry,
  store::{ConfigStore, IdentityStore},
};
pub use document::ImportDocument;
pub use error::{Error, Result};
pub use ingest::ingest;
use tracing::debug;

/// Parse `reader` as an import document, resolve its `model` in `registry`,
/// and ingest its `data` into `store`.
pub async fn deserialize_json<R, S>(
  reader: R,
  registry: &Registry,
  store: &S,
  acting_username: Option<&str>,
) -> Result<usize>
where
  R: Read,
  S: ConfigStore + IdentityStore,
{
  let document = ImportDocument::from_reader(reader)?;
  let schema = registry.resolve(&document.model)?;

  debug!(
    model = %document.model,
    entity = schema.name(),
    records = document.data.len(),
    "resolved configuration entity"
  );

  ingest(store, &schema, &document.data, acting_username).await
}
