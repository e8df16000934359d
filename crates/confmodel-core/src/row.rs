//! Configuration rows: immutable snapshots of one entity's values.
//!
//! Rows are never updated or deleted. The current value of a key is computed
//! at query time as the row with the greatest `change_date`, with the
//! store-assigned `row_id` breaking ties.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  identity::User,
  schema::{Key, Schema},
  value::FieldValue,
};

// ─── NewRow ──────────────────────────────────────────────────────────────────

/// Input to [`crate::store::ConfigStore::append_rows`].
/// `change_date` is always set by the store; it is not accepted from callers.
#[derive(Debug, Clone)]
pub struct NewRow {
  pub entity:     String,
  pub key:        Key,
  pub enabled:    bool,
  pub fields:     BTreeMap<String, FieldValue>,
  pub changed_by: Option<User>,
}

// ─── ConfigRow ───────────────────────────────────────────────────────────────

/// One persisted snapshot. Once written, no field is ever updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigRow {
  /// Store-assigned, strictly increasing in insertion order.
  pub row_id:      i64,
  pub entity:      String,
  pub key:         Key,
  pub enabled:     bool,
  pub fields:      BTreeMap<String, FieldValue>,
  /// Server-assigned timestamp; never changes after creation.
  pub change_date: DateTime<Utc>,
  /// `None` for unattributed changes.
  pub changed_by:  Option<User>,
}

// ─── CurrentConfig ───────────────────────────────────────────────────────────

/// The current value of one configuration key, computed at query time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CurrentConfig {
  /// The latest row recorded for the key.
  Configured(ConfigRow),
  /// No row exists for the key: schema defaults, disabled.
  Unconfigured {
    entity: String,
    key:    Key,
    fields: BTreeMap<String, FieldValue>,
  },
}

impl CurrentConfig {
  pub fn unconfigured(schema: &Schema, key: Key) -> Self {
    Self::Unconfigured {
      entity: schema.name().to_owned(),
      key,
      fields: schema.defaults(),
    }
  }

  pub fn is_configured(&self) -> bool { matches!(self, Self::Configured(_)) }

  pub fn row(&self) -> Option<&ConfigRow> {
    match self {
      Self::Configured(row) => Some(row),
      Self::Unconfigured { .. } => None,
    }
  }

  pub fn into_row(self) -> Option<ConfigRow> {
    match self {
      Self::Configured(row) => Some(row),
      Self::Unconfigured { .. } => None,
    }
  }

  pub fn enabled(&self) -> bool {
    self.row().is_some_and(|row| row.enabled)
  }

  pub fn fields(&self) -> &BTreeMap<String, FieldValue> {
    match self {
      Self::Configured(row) => &row.fields,
      Self::Unconfigured { fields, .. } => fields,
    }
  }

  pub fn get(&self, field: &str) -> Option<&FieldValue> {
    self.fields().get(field)
  }

  pub fn changed_by(&self) -> Option<&User> {
    self.row().and_then(|row| row.changed_by.as_ref())
  }

  pub fn change_date(&self) -> Option<DateTime<Utc>> {
    self.row().map(|row| row.change_date)
  }
}
