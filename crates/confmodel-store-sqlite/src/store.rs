//! [`SqliteStore`]: the SQLite implementation of [`ConfigStore`] and
//! [`IdentityStore`].

use std::{collections::HashMap, path::Path, sync::Arc};

use chrono::{DateTime, SubsecRound as _, Utc};
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use confmodel_core::{
  Key, Schema,
  identity::User,
  row::{ConfigRow, CurrentConfig, NewRow},
  store::{ConfigStore, IdentityStore},
};

use crate::{
  Error, Result,
  encode::{
    RawRow, RawUser, decode_dt, encode_dt, encode_fields, encode_key, encode_uuid, now,
  },
  schema::SCHEMA,
};

/// `config_rows` left-joined with the attributed user.
const ROW_SOURCE: &str =
  "config_rows r LEFT JOIN users u ON u.user_id = r.changed_by";

// ─── Store ───────────────────────────────────────────────────────────────────

/// Source of `change_date` and `created_at` readings.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// A configuration store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn:  tokio_rusqlite::Connection,
  clock: Clock,
}

/// A [`NewRow`] with its JSON columns already encoded, ready to move onto
/// the connection thread.
struct EncodedRow {
  entity:      String,
  key_json:    String,
  enabled:     bool,
  fields_json: String,
  changed_by:  Option<String>,
}

impl EncodedRow {
  fn encode(row: &NewRow) -> Result<Self> {
    Ok(Self {
      entity:      row.entity.clone(),
      key_json:    encode_key(&row.key)?,
      enabled:     row.enabled,
      fields_json: encode_fields(&row.fields)?,
      changed_by:  row.changed_by.as_ref().map(|u| encode_uuid(u.user_id)),
    })
  }
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn, clock: Arc::new(now) };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn, clock: Arc::new(now) };
    store.init_schema().await?;
    Ok(store)
  }

  /// Replace the system clock. Readings are truncated to microseconds.
  pub fn with_clock(
    mut self,
    clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static,
  ) -> Self {
    self.clock = Arc::new(clock);
    self
  }

  fn now(&self) -> DateTime<Utc> { (self.clock)().trunc_subsecs(6) }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Run a row query bound to positional text parameters and decode the rows.
  async fn query_rows(&self, sql: String, params: Vec<String>) -> Result<Vec<ConfigRow>> {
    let raws: Vec<RawRow> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params.iter()), RawRow::read)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawRow::into_row).collect()
  }
}

// ─── ConfigStore impl ────────────────────────────────────────────────────────

impl ConfigStore for SqliteStore {
  type Error = Error;

  async fn append_row(&self, row: NewRow) -> Result<ConfigRow> {
    let mut appended = self.append_rows(vec![row]).await?;
    // `append_rows` returns exactly one row per input.
    Ok(appended.remove(0))
  }

  async fn append_rows(&self, rows: Vec<NewRow>) -> Result<Vec<ConfigRow>> {
    if rows.is_empty() {
      return Ok(Vec::new());
    }

    let encoded = rows
      .iter()
      .map(EncodedRow::encode)
      .collect::<Result<Vec<_>>>()?;

    // A row is never stamped earlier than the newest row of its entity, so
    // `(change_date, row_id)` order is insertion order even if the clock
    // steps back.
    let clock = Arc::clone(&self.clock);
    let stamps = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut floors: HashMap<String, String> = HashMap::new();
        let mut stamps = Vec::with_capacity(encoded.len());
        {
          let mut newest = tx.prepare(
            "SELECT MAX(change_date) FROM config_rows WHERE entity = ?1",
          )?;
          let mut insert = tx.prepare(
            "INSERT INTO config_rows (
               entity, key_json, enabled, fields_json, change_date, changed_by
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          )?;
          for row in &encoded {
            let floor = match floors.get(&row.entity) {
              Some(floor) => Some(floor.clone()),
              None => newest.query_row(rusqlite::params![row.entity], |r| {
                r.get::<_, Option<String>>(0)
              })?,
            };
            let reading = encode_dt(clock().trunc_subsecs(6));
            let change_date = match floor {
              Some(floor) if floor > reading => floor,
              _ => reading,
            };

            insert.execute(rusqlite::params![
              row.entity,
              row.key_json,
              row.enabled,
              row.fields_json,
              change_date,
              row.changed_by,
            ])?;
            stamps.push((tx.last_insert_rowid(), change_date.clone()));
            floors.insert(row.entity.clone(), change_date);
          }
        }
        tx.commit()?;
        Ok(stamps)
      })
      .await?;

    rows
      .into_iter()
      .zip(stamps)
      .map(|(row, (row_id, change_date))| {
        Ok(ConfigRow {
          row_id,
          entity: row.entity,
          key: row.key,
          enabled: row.enabled,
          fields: row.fields,
          change_date: decode_dt(&change_date)?,
          changed_by: row.changed_by,
        })
      })
      .collect()
  }

  async fn query_current(&self, schema: &Schema, key: &Key) -> Result<CurrentConfig> {
    let sql = format!(
      "SELECT {} FROM {ROW_SOURCE}
       WHERE r.entity = ?1 AND r.key_json = ?2
       ORDER BY r.change_date DESC, r.row_id DESC
       LIMIT 1",
      RawRow::COLUMNS
    );
    let params = vec![schema.name().to_owned(), encode_key(key)?];

    let latest = self.query_rows(sql, params).await?.into_iter().next();
    Ok(match latest {
      Some(row) => CurrentConfig::Configured(row),
      None => CurrentConfig::unconfigured(schema, key.clone()),
    })
  }

  async fn list_current(&self, schema: &Schema) -> Result<Vec<ConfigRow>> {
    let sql = format!(
      "SELECT {} FROM (
         SELECT *, ROW_NUMBER() OVER (
           PARTITION BY key_json
           ORDER BY change_date DESC, row_id DESC
         ) AS rn
         FROM config_rows
         WHERE entity = ?1
       ) r
       LEFT JOIN users u ON u.user_id = r.changed_by
       WHERE r.rn = 1
       ORDER BY r.key_json",
      RawRow::COLUMNS
    );
    self.query_rows(sql, vec![schema.name().to_owned()]).await
  }

  async fn history(&self, entity: &str, key: Option<&Key>) -> Result<Vec<ConfigRow>> {
    let mut params = vec![entity.trim().to_lowercase()];
    let key_filter = match key {
      Some(key) => {
        params.push(encode_key(key)?);
        "AND r.key_json = ?2"
      }
      None => "",
    };
    let sql = format!(
      "SELECT {} FROM {ROW_SOURCE}
       WHERE r.entity = ?1 {key_filter}
       ORDER BY r.change_date ASC, r.row_id ASC",
      RawRow::COLUMNS
    );
    self.query_rows(sql, params).await
  }
}

// ─── IdentityStore impl ──────────────────────────────────────────────────────

impl IdentityStore for SqliteStore {
  type Error = Error;

  async fn add_user(&self, username: &str) -> Result<User> {
    if self.find_user_by_username(username).await?.is_some() {
      return Err(Error::UserExists(username.to_owned()));
    }

    let user = User {
      user_id:    Uuid::new_v4(),
      username:   username.to_owned(),
      created_at: self.now(),
    };

    let id_str   = encode_uuid(user.user_id);
    let name_str = user.username.clone();
    let at_str   = encode_dt(user.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO users (user_id, username, created_at) VALUES (?1, ?2, ?3)",
          rusqlite::params![id_str, name_str, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(user)
  }

  async fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
    let name_str = username.to_owned();

    let raw: Option<RawUser> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT user_id, username, created_at FROM users WHERE username = ?1",
              rusqlite::params![name_str],
              |row| {
                Ok(RawUser {
                  user_id:    row.get(0)?,
                  username:   row.get(1)?,
                  created_at: row.get(2)?,
                })
              },
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawUser::into_user).transpose()
  }
}
