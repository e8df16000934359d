//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings with a fixed six-digit fraction,
//! so text order equals time order. Keys and field maps are stored as compact
//! JSON. UUIDs are stored as hyphenated lowercase strings.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, SubsecRound as _, Utc};
use confmodel_core::{
  FieldValue, Key,
  identity::User,
  row::ConfigRow,
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ────────────────────────────────────────────────────────────

/// The current instant at the precision the store keeps.
pub fn now() -> DateTime<Utc> { Utc::now().trunc_subsecs(6) }

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Key / fields ─────────────────────────────────────────────────────────────

pub fn encode_key(key: &Key) -> Result<String> { Ok(serde_json::to_string(key)?) }

pub fn decode_key(s: &str) -> Result<Key> { Ok(serde_json::from_str(s)?) }

pub fn encode_fields(fields: &BTreeMap<String, FieldValue>) -> Result<String> {
  Ok(serde_json::to_string(fields)?)
}

pub fn decode_fields(s: &str) -> Result<BTreeMap<String, FieldValue>> {
  Ok(serde_json::from_str(s)?)
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from a `users` row.
pub struct RawUser {
  pub user_id:    String,
  pub username:   String,
  pub created_at: String,
}

impl RawUser {
  pub fn into_user(self) -> Result<User> {
    Ok(User {
      user_id:    decode_uuid(&self.user_id)?,
      username:   self.username,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

/// Raw values read from a `config_rows` row left-joined with `users`.
pub struct RawRow {
  // config_rows columns
  pub row_id:          i64,
  pub entity:          String,
  pub key_json:        String,
  pub enabled:         bool,
  pub fields_json:     String,
  pub change_date:     String,
  // users join
  pub user_id:         Option<String>,
  pub username:        Option<String>,
  pub user_created_at: Option<String>,
}

impl RawRow {
  /// Column order expected by [`RawRow::read`].
  pub const COLUMNS: &'static str = "r.row_id, r.entity, r.key_json, r.enabled, \
     r.fields_json, r.change_date, u.user_id, u.username, u.created_at";

  pub fn read(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      row_id:          row.get(0)?,
      entity:          row.get(1)?,
      key_json:        row.get(2)?,
      enabled:         row.get(3)?,
      fields_json:     row.get(4)?,
      change_date:     row.get(5)?,
      user_id:         row.get(6)?,
      username:        row.get(7)?,
      user_created_at: row.get(8)?,
    })
  }

  pub fn into_row(self) -> Result<ConfigRow> {
    let changed_by = match (self.user_id, self.username, self.user_created_at) {
      (Some(user_id), Some(username), Some(created_at)) => Some(
        RawUser { user_id, username, created_at }.into_user()?,
      ),
      _ => None,
    };

    Ok(ConfigRow {
      row_id: self.row_id,
      entity: self.entity,
      key: decode_key(&self.key_json)?,
      enabled: self.enabled,
      fields: decode_fields(&self.fields_json)?,
      change_date: decode_dt(&self.change_date)?,
      changed_by,
    })
  }
}
