//! The entity registry: type name → schema.
//!
//! Populated once at startup and read-only afterwards. Names are matched
//! case-insensitively so hand-written import files keep working whatever
//! capitalisation they use.

use std::{collections::BTreeMap, sync::Arc};

use crate::{Error, Result, schema::Schema};

#[derive(Debug, Clone, Default)]
pub struct Registry {
  schemas: BTreeMap<String, Arc<Schema>>,
}

impl Registry {
  pub fn new() -> Self { Self::default() }

  /// Build a registry from an iterator of schemas, failing on the first
  /// duplicate name.
  pub fn from_schemas<I>(schemas: I) -> Result<Self>
  where
    I: IntoIterator<Item = Schema>,
  {
    let mut registry = Self::new();
    for schema in schemas {
      registry.register(schema)?;
    }
    Ok(registry)
  }

  pub fn register(&mut self, schema: Schema) -> Result<()> {
    // `Schema::new` has already lower-cased the name.
    let name = schema.name().to_owned();
    if self.schemas.contains_key(&name) {
      return Err(Error::DuplicateEntityType(name));
    }
    self.schemas.insert(name, Arc::new(schema));
    Ok(())
  }

  /// Look up the schema registered under `type_name`.
  ///
  /// The error carries `type_name` exactly as supplied.
  pub fn resolve(&self, type_name: &str) -> Result<Arc<Schema>> {
    self
      .schemas
      .get(&type_name.trim().to_lowercase())
      .cloned()
      .ok_or_else(|| Error::UnknownEntityType(type_name.to_owned()))
  }

  /// Registered schemas in name order.
  pub fn schemas(&self) -> impl Iterator<Item = &Schema> {
    self.schemas.values().map(|schema| &**schema)
  }

  pub fn len(&self) -> usize { self.schemas.len() }

  pub fn is_empty(&self) -> bool { self.schemas.is_empty() }
}
