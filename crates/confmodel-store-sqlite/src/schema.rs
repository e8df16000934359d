//! SQL schema for the configuration store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE ... IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS users (
    user_id     TEXT PRIMARY KEY,
    username    TEXT NOT NULL UNIQUE,
    created_at  TEXT NOT NULL
);

-- Configuration rows are strictly append-only.
-- No UPDATE or DELETE is ever issued against this table.
CREATE TABLE IF NOT EXISTS config_rows (
    row_id       INTEGER PRIMARY KEY AUTOINCREMENT,
    entity       TEXT NOT NULL,      -- lower-cased schema name
    key_json     TEXT NOT NULL,      -- JSON array of key-field values
    enabled      INTEGER NOT NULL,
    fields_json  TEXT NOT NULL,      -- JSON object of declared fields
    change_date  TEXT NOT NULL,      -- RFC 3339 UTC, fixed microseconds
    changed_by   TEXT REFERENCES users(user_id)
);

CREATE INDEX IF NOT EXISTS config_rows_current_idx
    ON config_rows(entity, key_json, change_date DESC, row_id DESC);

PRAGMA user_version = 1;
";
