//! Batch ingestion: resolve the acting user, validate every record, then
//! append all rows in one unit.

use confmodel_core::{
  Schema,
  store::{ConfigStore, IdentityStore},
  validate::{Record, validate_batch},
};
use tracing::{info, warn};

use crate::{Error, Result};

/// Append one row per record to `schema`'s history, attributed to
/// `acting_username` (or to nobody when `None` or empty).
///
/// Nothing is written unless the user resolves and every record validates.
/// Returns the number of rows appended, which is `records.len()` on success.
pub async fn ingest<S>(
  store: &S,
  schema: &Schema,
  records: &[Record],
  acting_username: Option<&str>,
) -> Result<usize>
where
  S: ConfigStore + IdentityStore,
{
  let acting_username = acting_username.filter(|name| !name.is_empty());
  let changed_by = match acting_username {
    Some(username) => {
      let user = store
        .find_user_by_username(username)
        .await
        .map_err(Error::store)?;
      Some(user.ok_or_else(|| Error::UnknownUser(username.to_owned()))?)
    }
    None => None,
  };

  let validated = validate_batch(schema, records).map_err(|errors| {
    warn!(
      entity = schema.name(),
      records = errors.records.len(),
      errors = errors.error_count(),
      "rejecting import batch"
    );
    Error::ValidationFailed(errors)
  })?;

  if validated.is_empty() {
    info!(entity = schema.name(), "nothing to import");
    return Ok(0);
  }

  let rows = validated
    .into_iter()
    .map(|record| record.into_new_row(schema, changed_by.clone()))
    .collect();

  let appended = store.append_rows(rows).await.map_err(Error::store)?;

  info!(
    entity = schema.name(),
    rows = appended.len(),
    changed_by = acting_username.unwrap_or("-"),
    "appended configuration rows"
  );

  Ok(appended.len())
}
