//! Integration tests for `SqliteStore` against an in-memory database.

use std::{
  collections::BTreeMap,
  sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
  },
};

use chrono::{DateTime, Duration, TimeZone as _, Utc};

use confmodel_core::{
  FieldSpec, FieldValue, Key, Schema,
  identity::User,
  row::{CurrentConfig, NewRow},
  store::{ConfigStore, IdentityStore},
};
use uuid::Uuid;

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn keyed_schema() -> Schema {
  Schema::new(
    "config_models.exampledeserializeconfig",
    vec![
      FieldSpec::text("name"),
      FieldSpec::integer("int_field").with_default(10),
    ],
    ["name"],
  )
  .unwrap()
}

fn singleton_schema() -> Schema {
  Schema::new(
    "app.sitebanner",
    vec![FieldSpec::text("message").allow_null()],
    Vec::<String>::new(),
  )
  .unwrap()
}

/// A clock that returns `readings` in order, then repeats the last one.
fn scripted_clock(readings: Vec<DateTime<Utc>>) -> impl Fn() -> DateTime<Utc> {
  let next = Arc::new(AtomicUsize::new(0));
  move || {
    let i = next.fetch_add(1, Ordering::SeqCst);
    readings[i.min(readings.len() - 1)]
  }
}

fn noon() -> DateTime<Utc> { Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap() }

fn name_key(name: &str) -> Key { Key(vec![FieldValue::Text(name.into())]) }

fn row(
  name: &str,
  enabled: bool,
  int_field: i64,
  changed_by: Option<User>,
) -> NewRow {
  let fields = BTreeMap::from([
    ("name".to_owned(), FieldValue::Text(name.into())),
    ("int_field".to_owned(), FieldValue::Int(int_field)),
  ]);
  NewRow {
    entity: "config_models.exampledeserializeconfig".into(),
    key: name_key(name),
    enabled,
    fields,
    changed_by,
  }
}

// ─── Users ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn add_and_find_user() {
  let s = store().await;

  let user = s.add_user("test_worker").await.unwrap();
  assert_eq!(user.username, "test_worker");

  let found = s.find_user_by_username("test_worker").await.unwrap();
  assert_eq!(found, Some(user));
}

#[tokio::test]
async fn find_user_is_exact() {
  let s = store().await;
  s.add_user("test_worker").await.unwrap();

  assert!(s.find_user_by_username("Test_Worker").await.unwrap().is_none());
  assert!(s.find_user_by_username("test").await.unwrap().is_none());
}

#[tokio::test]
async fn duplicate_user_errors() {
  let s = store().await;
  s.add_user("ops").await.unwrap();

  let err = s.add_user("ops").await.unwrap_err();
  assert!(matches!(err, crate::Error::UserExists(ref n) if n == "ops"));
}

// ─── Appending ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn append_assigns_ids_and_dates() {
  let s = store().await;

  let rows = s
    .append_rows(vec![row("betty", true, 5, None), row("fred", false, 10, None)])
    .await
    .unwrap();

  assert_eq!(rows.len(), 2);
  assert!(rows[0].row_id < rows[1].row_id);
  assert!(rows[0].change_date <= rows[1].change_date);

  let history = s
    .history("config_models.exampledeserializeconfig", None)
    .await
    .unwrap();
  assert_eq!(history, rows);
}

#[tokio::test]
async fn append_empty_batch_is_a_no_op() {
  let s = store().await;
  assert!(s.append_rows(Vec::new()).await.unwrap().is_empty());
}

#[tokio::test]
async fn append_row_records_attribution() {
  let s = store().await;
  let user = s.add_user("test_worker").await.unwrap();

  let appended = s.append_row(row("betty", true, 5, Some(user.clone()))).await.unwrap();
  assert_eq!(appended.changed_by.as_ref(), Some(&user));

  let current = s.query_current(&keyed_schema(), &name_key("betty")).await.unwrap();
  assert_eq!(current.changed_by(), Some(&user));
  assert_eq!(current.row(), Some(&appended));
}

#[tokio::test]
async fn failed_batch_commits_nothing() {
  let s = store().await;

  // A `changed_by` that references no user violates the foreign key on the
  // second insert.
  let ghost = User {
    user_id:    Uuid::new_v4(),
    username:   "ghost".into(),
    created_at: chrono::Utc::now(),
  };

  let result = s
    .append_rows(vec![row("betty", true, 5, None), row("fred", true, 1, Some(ghost))])
    .await;
  assert!(matches!(result, Err(crate::Error::Database(_))));

  let history = s
    .history("config_models.exampledeserializeconfig", None)
    .await
    .unwrap();
  assert!(history.is_empty());
}

// ─── Current-row selection ───────────────────────────────────────────────────

#[tokio::test]
async fn current_is_latest_row_for_key() {
  let s = store().await;
  let schema = keyed_schema();

  s.append_row(row("betty", false, 1, None)).await.unwrap();
  s.append_row(row("fred", true, 2, None)).await.unwrap();
  let latest = s.append_row(row("betty", true, 3, None)).await.unwrap();

  let current = s.query_current(&schema, &name_key("betty")).await.unwrap();
  assert!(current.is_configured());
  assert!(current.enabled());
  assert_eq!(current.get("int_field"), Some(&FieldValue::Int(3)));
  assert_eq!(current.row().map(|r| r.row_id), Some(latest.row_id));
}

#[tokio::test]
async fn same_batch_duplicates_resolve_to_last() {
  let s = store().await;

  s.append_rows(vec![row("betty", false, 1, None), row("betty", true, 2, None)])
    .await
    .unwrap();

  let current = s
    .query_current(&keyed_schema(), &name_key("betty"))
    .await
    .unwrap();
  assert_eq!(current.get("int_field"), Some(&FieldValue::Int(2)));

  let history = s
    .history("config_models.exampledeserializeconfig", Some(&name_key("betty")))
    .await
    .unwrap();
  assert_eq!(history.len(), 2);
}

#[tokio::test]
async fn clock_stepping_back_within_a_batch_keeps_insertion_order() {
  let s = store()
    .await
    .with_clock(scripted_clock(vec![noon(), noon() - Duration::seconds(30)]));

  let rows = s
    .append_rows(vec![row("betty", false, 1, None), row("betty", true, 2, None)])
    .await
    .unwrap();
  assert_eq!(rows[0].change_date, noon());
  assert_eq!(rows[1].change_date, noon());

  let current = s
    .query_current(&keyed_schema(), &name_key("betty"))
    .await
    .unwrap();
  assert_eq!(current.get("int_field"), Some(&FieldValue::Int(2)));
  assert_eq!(current.row().map(|r| r.row_id), Some(rows[1].row_id));
}

#[tokio::test]
async fn clock_stepping_back_between_batches_keeps_insertion_order() {
  let s = store().await.with_clock(scripted_clock(vec![
    noon(),
    noon() - Duration::minutes(5),
    noon() + Duration::minutes(1),
  ]));
  let schema = keyed_schema();

  s.append_row(row("betty", false, 1, None)).await.unwrap();
  let rewound = s.append_row(row("betty", true, 2, None)).await.unwrap();
  assert_eq!(rewound.change_date, noon());

  let listed = s.list_current(&schema).await.unwrap();
  assert_eq!(listed.len(), 1);
  assert_eq!(listed[0].row_id, rewound.row_id);

  // Once the clock passes the floor again its own readings are used.
  let later = s.append_row(row("betty", true, 3, None)).await.unwrap();
  assert_eq!(later.change_date, noon() + Duration::minutes(1));

  let history = s
    .history("config_models.exampledeserializeconfig", Some(&name_key("betty")))
    .await
    .unwrap();
  let values: Vec<_> = history.iter().map(|r| r.fields["int_field"].clone()).collect();
  assert_eq!(values, [FieldValue::Int(1), FieldValue::Int(2), FieldValue::Int(3)]);
}

#[tokio::test]
async fn clock_floor_is_per_entity() {
  let s = store().await.with_clock(scripted_clock(vec![
    noon(),
    noon() - Duration::hours(1),
  ]));

  s.append_row(row("betty", true, 1, None)).await.unwrap();
  let other = s
    .append_row(NewRow {
      entity:     "app.sitebanner".into(),
      key:        Key::singleton(),
      enabled:    true,
      fields:     BTreeMap::new(),
      changed_by: None,
    })
    .await
    .unwrap();
  assert_eq!(other.change_date, noon() - Duration::hours(1));
}

#[tokio::test]
async fn unconfigured_key_returns_defaults() {
  let s = store().await;
  let schema = keyed_schema();

  let current = s.query_current(&schema, &name_key("nobody")).await.unwrap();
  assert!(matches!(current, CurrentConfig::Unconfigured { .. }));
  assert!(!current.enabled());
  assert_eq!(current.get("int_field"), Some(&FieldValue::Int(10)));
  assert!(current.changed_by().is_none());
}

#[tokio::test]
async fn singleton_entity_uses_empty_key() {
  let s = store().await;
  let schema = singleton_schema();

  s.append_row(NewRow {
    entity:     schema.name().to_owned(),
    key:        Key::singleton(),
    enabled:    true,
    fields:     BTreeMap::from([(
      "message".to_owned(),
      FieldValue::Text("maintenance tonight".into()),
    )]),
    changed_by: None,
  })
  .await
  .unwrap();

  let current = s.query_current(&schema, &Key::singleton()).await.unwrap();
  assert!(current.enabled());
  assert_eq!(
    current.get("message").and_then(FieldValue::as_str),
    Some("maintenance tonight")
  );
}

#[tokio::test]
async fn list_current_returns_one_row_per_key() {
  let s = store().await;

  s.append_row(row("betty", false, 1, None)).await.unwrap();
  s.append_row(row("fred", true, 2, None)).await.unwrap();
  s.append_row(row("betty", true, 3, None)).await.unwrap();

  let current = s.list_current(&keyed_schema()).await.unwrap();
  assert_eq!(current.len(), 2);

  let by_name: BTreeMap<String, i64> = current
    .iter()
    .map(|r| {
      (
        r.fields["name"].as_str().unwrap().to_owned(),
        r.fields["int_field"].as_i64().unwrap(),
      )
    })
    .collect();
  assert_eq!(by_name["betty"], 3);
  assert_eq!(by_name["fred"], 2);
}

#[tokio::test]
async fn history_is_scoped_to_entity() {
  let s = store().await;
  s.append_row(row("betty", true, 5, None)).await.unwrap();

  let other = s.history("app.sitebanner", None).await.unwrap();
  assert!(other.is_empty());

  let mixed_case = s
    .history("Config_Models.ExampleDeserializeConfig", None)
    .await
    .unwrap();
  assert_eq!(mixed_case.len(), 1);
}
