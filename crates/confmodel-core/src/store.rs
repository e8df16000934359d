//! The `ConfigStore` and `IdentityStore` traits.
//!
//! Both are implemented by storage backends (e.g. `confmodel-store-sqlite`).
//! The import pipeline and the command-line tool depend on these
//! abstractions, not on any concrete backend.

use std::future::Future;

use crate::{
  identity::User,
  row::{ConfigRow, CurrentConfig, NewRow},
  schema::{Key, Schema},
};

// ─── Configuration rows ──────────────────────────────────────────────────────

/// Abstraction over an append-only configuration history.
///
/// There is no update or delete operation. All methods return `Send` futures
/// so the trait can be used from multi-threaded async runtimes.
pub trait ConfigStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Append one row; the store assigns `row_id` and `change_date`.
  fn append_row(
    &self,
    row: NewRow,
  ) -> impl Future<Output = Result<ConfigRow, Self::Error>> + Send + '_;

  /// Append every row as one unit: either all rows are committed or none
  /// are. Each row gets its own `change_date` reading.
  fn append_rows(
    &self,
    rows: Vec<NewRow>,
  ) -> impl Future<Output = Result<Vec<ConfigRow>, Self::Error>> + Send + '_;

  /// The current value of `key`: the row with the greatest `change_date`,
  /// ties broken by the greater `row_id`. A key with no rows yields
  /// [`CurrentConfig::Unconfigured`], never an error.
  fn query_current<'a>(
    &'a self,
    schema: &'a Schema,
    key: &'a Key,
  ) -> impl Future<Output = Result<CurrentConfig, Self::Error>> + Send + 'a;

  /// The current row of every key of `schema` that has at least one row.
  fn list_current<'a>(
    &'a self,
    schema: &'a Schema,
  ) -> impl Future<Output = Result<Vec<ConfigRow>, Self::Error>> + Send + 'a;

  /// Every row of `entity` (optionally restricted to one key), oldest first.
  fn history<'a>(
    &'a self,
    entity: &'a str,
    key: Option<&'a Key>,
  ) -> impl Future<Output = Result<Vec<ConfigRow>, Self::Error>> + Send + 'a;
}

// ─── Identities ──────────────────────────────────────────────────────────────

/// Abstraction over the store of users changes are attributed to.
pub trait IdentityStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Create a user. Fails if the username is taken.
  fn add_user<'a>(
    &'a self,
    username: &'a str,
  ) -> impl Future<Output = Result<User, Self::Error>> + Send + 'a;

  /// Exact, case-sensitive lookup. Returns `None` if no user matches.
  fn find_user_by_username<'a>(
    &'a self,
    username: &'a str,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + 'a;
}
