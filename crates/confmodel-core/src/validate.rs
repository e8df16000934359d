//! Record validation.
//!
//! Validation is a pure stage: it turns raw JSON records into typed
//! [`ValidatedRecord`]s or a structured error report, and never touches a
//! store. Persisting is a separate step, so an all-or-nothing batch is just
//! "validate everything, then append".

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::{
  identity::User,
  row::NewRow,
  schema::{ENABLED_FIELD, NULL_INVALID, SERVER_ASSIGNED_FIELDS, Schema},
  value::{BOOLEAN_INVALID, FieldValue, coerce_bool},
};

/// One raw input record: field name → JSON value.
pub type Record = Map<String, Value>;

const REQUIRED: &str = "This field is required.";
const UNKNOWN_FIELD: &str = "Unknown field.";
const SERVER_ASSIGNED: &str = "This field is assigned by the server.";

// ─── Error report ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
  pub field:   String,
  pub message: String,
}

impl FieldError {
  fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
    Self { field: field.into(), message: message.into() }
  }
}

/// Every problem found in one record, by its position in the batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordErrors {
  pub index:  usize,
  pub errors: Vec<FieldError>,
}

/// The consolidated report for a rejected batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Error)]
#[error("{}", self.summary())]
pub struct ValidationErrors {
  pub records: Vec<RecordErrors>,
}

impl ValidationErrors {
  /// Total number of field errors across all records.
  pub fn error_count(&self) -> usize {
    self.records.iter().map(|r| r.errors.len()).sum()
  }

  /// One `record {index}: {field}: {message}` entry per error, joined by
  /// `; `.
  fn summary(&self) -> String {
    self
      .records
      .iter()
      .flat_map(|record| {
        record.errors.iter().map(move |error| {
          format!("record {}: {}: {}", record.index, error.field, error.message)
        })
      })
      .collect::<Vec<_>>()
      .join("; ")
  }
}

// ─── Validated output ────────────────────────────────────────────────────────

/// A record whose every declared field holds a coerced value.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedRecord {
  pub enabled: bool,
  pub fields:  BTreeMap<String, FieldValue>,
}

impl ValidatedRecord {
  pub fn into_new_row(self, schema: &Schema, changed_by: Option<User>) -> NewRow {
    NewRow {
      entity: schema.name().to_owned(),
      key: schema.key_of(&self.fields),
      enabled: self.enabled,
      fields: self.fields,
      changed_by,
    }
  }
}

// ─── Validation ──────────────────────────────────────────────────────────────

/// Validate one record against `schema`, reporting every problem rather than
/// the first.
pub fn validate_record(
  schema: &Schema,
  record: &Record,
) -> Result<ValidatedRecord, Vec<FieldError>> {
  let mut errors = Vec::new();
  let mut enabled = false;

  for (name, raw) in record {
    if name == ENABLED_FIELD {
      match raw {
        Value::Null => errors.push(FieldError::new(name, NULL_INVALID)),
        raw => match coerce_bool(raw) {
          Some(b) => enabled = b,
          None => errors.push(FieldError::new(name, BOOLEAN_INVALID)),
        },
      }
    } else if SERVER_ASSIGNED_FIELDS.contains(&name.as_str()) {
      errors.push(FieldError::new(name, SERVER_ASSIGNED));
    } else if schema.field(name).is_none() {
      errors.push(FieldError::new(name, UNKNOWN_FIELD));
    }
  }

  let mut fields = BTreeMap::new();
  for spec in schema.fields() {
    let value = match record.get(&spec.name) {
      Some(raw) => spec.coerce(raw),
      None => spec.fallback().ok_or_else(|| REQUIRED.to_owned()),
    };
    match value {
      Ok(value) => {
        fields.insert(spec.name.clone(), value);
      }
      Err(message) => errors.push(FieldError::new(&spec.name, message)),
    }
  }

  if errors.is_empty() {
    Ok(ValidatedRecord { enabled, fields })
  } else {
    Err(errors)
  }
}

/// Validate a whole batch. Fails if any record fails, carrying the errors of
/// every failing record.
pub fn validate_batch(
  schema: &Schema,
  records: &[Record],
) -> Result<Vec<ValidatedRecord>, ValidationErrors> {
  let mut valid = Vec::with_capacity(records.len());
  let mut failures = Vec::new();

  for (index, record) in records.iter().enumerate() {
    match validate_record(schema, record) {
      Ok(validated) => valid.push(validated),
      Err(errors) => failures.push(RecordErrors { index, errors }),
    }
  }

  if failures.is_empty() {
    Ok(valid)
  } else {
    Err(ValidationErrors { records: failures })
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;
  use crate::schema::{FieldSpec, Key};

  fn schema() -> Schema {
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

  fn record(value: Value) -> Record {
    match value {
      Value::Object(map) => map,
      other => panic!("not an object: {other}"),
    }
  }

  #[test]
  fn applies_defaults_and_coerces() {
    let validated =
      validate_record(&schema(), &record(json!({ "name": "fred" }))).unwrap();
    assert!(!validated.enabled);
    assert_eq!(validated.fields["int_field"], FieldValue::Int(10));

    let validated = validate_record(
      &schema(),
      &record(json!({ "name": "betty", "enabled": "true", "int_field": "5" })),
    )
    .unwrap();
    assert!(validated.enabled);
    assert_eq!(validated.fields["int_field"], FieldValue::Int(5));
  }

  #[test]
  fn reports_every_problem_in_a_record() {
    let errors = validate_record(
      &schema(),
      &record(json!({ "nmae": "typo", "int_field": "x", "change_date": "now" })),
    )
    .unwrap_err();

    let by_field: BTreeMap<&str, &str> = errors
      .iter()
      .map(|e| (e.field.as_str(), e.message.as_str()))
      .collect();
    assert_eq!(by_field["nmae"], UNKNOWN_FIELD);
    assert_eq!(by_field["change_date"], SERVER_ASSIGNED);
    assert_eq!(by_field["int_field"], "A valid integer is required.");
    assert_eq!(by_field["name"], REQUIRED);
    assert_eq!(errors.len(), 4);
  }

  #[test]
  fn null_rejected_for_non_nullable() {
    let errors = validate_record(
      &schema(),
      &record(json!({ "name": null, "enabled": null })),
    )
    .unwrap_err();
    assert_eq!(errors.len(), 2);
    assert!(errors.iter().all(|e| e.message == NULL_INVALID));
  }

  #[test]
  fn batch_collects_all_failing_records() {
    let records = vec![
      record(json!({ "name": "a" })),
      record(json!({ "int_field": 3 })),
      record(json!({ "name": "c" })),
      record(json!({ "name": "d", "colour": "red" })),
    ];

    let report = validate_batch(&schema(), &records).unwrap_err();
    let indexes: Vec<usize> = report.records.iter().map(|r| r.index).collect();
    assert_eq!(indexes, [1, 3]);
    assert_eq!(report.error_count(), 2);
    assert_eq!(
      report.to_string(),
      "record 1: name: This field is required.; record 3: colour: Unknown field."
    );
  }

  #[test]
  fn report_is_a_std_error() {
    let records = vec![record(json!({ "name": "   " }))];
    let report = validate_batch(&schema(), &records).unwrap_err();

    let err: Box<dyn std::error::Error> = Box::new(report);
    assert!(err.source().is_none());
    assert_eq!(err.to_string(), "record 0: name: This field may not be blank.");
  }

  #[test]
  fn empty_batch_is_valid() {
    assert!(validate_batch(&schema(), &[]).unwrap().is_empty());
  }

  #[test]
  fn into_new_row_projects_key() {
    let validated =
      validate_record(&schema(), &record(json!({ "name": "dino" }))).unwrap();
    let row = validated.into_new_row(&schema(), None);
    assert_eq!(row.entity, "config_models.exampledeserializeconfig");
    assert_eq!(row.key, Key(vec![FieldValue::Text("dino".into())]));
    assert!(row.changed_by.is_none());
  }
}
