//! Configuration entity schemas.
//!
//! A [`Schema`] names one configuration type, declares its fields, and picks
//! the subset of fields (`key_fields`) that identify one logical
//! configuration target. Every entity also carries the implicit `enabled`,
//! `change_date` and `changed_by` fields; those are never declared here.

use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
  Error, Result,
  value::{FieldKind, FieldValue},
};

/// Implicit boolean switch present on every entity; defaults to `false`.
pub const ENABLED_FIELD: &str = "enabled";

/// Implicit fields whose values are always assigned by the store.
pub const SERVER_ASSIGNED_FIELDS: &[&str] = &["change_date", "changed_by", "id"];

pub(crate) const NULL_INVALID: &str = "This field may not be null.";

// ─── FieldSpec ───────────────────────────────────────────────────────────────

/// One declared field of a schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
  pub name:     String,
  #[serde(flatten)]
  pub kind:     FieldKind,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub default:  Option<FieldValue>,
  #[serde(default)]
  pub nullable: bool,
}

impl FieldSpec {
  pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
    Self { name: name.into(), kind, default: None, nullable: false }
  }

  pub fn boolean(name: impl Into<String>) -> Self {
    Self::new(name, FieldKind::Boolean)
  }

  pub fn integer(name: impl Into<String>) -> Self {
    Self::new(name, FieldKind::Integer)
  }

  pub fn float(name: impl Into<String>) -> Self {
    Self::new(name, FieldKind::Float)
  }

  pub fn text(name: impl Into<String>) -> Self {
    Self::new(name, FieldKind::text())
  }

  pub fn choice<I, S>(name: impl Into<String>, choices: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self::new(name, FieldKind::Choice {
      choices: choices.into_iter().map(Into::into).collect(),
    })
  }

  pub fn with_default(mut self, value: impl Into<FieldValue>) -> Self {
    self.default = Some(value.into());
    self
  }

  pub fn allow_null(mut self) -> Self {
    self.nullable = true;
    self
  }

  /// A field with neither a default nor `null` allowed must be supplied.
  pub fn is_required(&self) -> bool {
    self.default.is_none() && !self.nullable
  }

  /// The value used when an input record omits this field.
  pub fn fallback(&self) -> Option<FieldValue> {
    match (&self.default, self.nullable) {
      (Some(value), _) => Some(value.clone()),
      (None, true) => Some(FieldValue::Null),
      (None, false) => None,
    }
  }

  pub fn coerce(&self, raw: &Value) -> Result<FieldValue, String> {
    if raw.is_null() {
      return if self.nullable {
        Ok(FieldValue::Null)
      } else {
        Err(NULL_INVALID.to_owned())
      };
    }
    self.kind.coerce(raw)
  }
}

// ─── Key ─────────────────────────────────────────────────────────────────────

/// The ordered key-field values identifying one configuration target.
///
/// The empty key is the singleton of an entity with no key fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Key(pub Vec<FieldValue>);

impl Key {
  pub fn singleton() -> Self { Self(Vec::new()) }

  pub fn is_singleton(&self) -> bool { self.0.is_empty() }

  pub fn values(&self) -> &[FieldValue] { &self.0 }
}

impl From<Vec<FieldValue>> for Key {
  fn from(values: Vec<FieldValue>) -> Self { Self(values) }
}

impl fmt::Display for Key {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if self.0.is_empty() {
      return f.write_str("(singleton)");
    }
    let parts: Vec<String> = self.0.iter().map(ToString::to_string).collect();
    write!(f, "({})", parts.join(", "))
  }
}

// ─── Schema ──────────────────────────────────────────────────────────────────

/// Metadata for one configuration entity type.
///
/// Constructed through [`Schema::new`] (or deserialised, which runs the same
/// checks), so a `Schema` value is always internally consistent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SchemaDef", into = "SchemaDef")]
pub struct Schema {
  name:       String,
  fields:     Vec<FieldSpec>,
  key_fields: Vec<String>,
}

/// Wire shape of a schema, as written in settings files.
#[derive(Serialize, Deserialize)]
struct SchemaDef {
  name:       String,
  #[serde(default)]
  fields:     Vec<FieldSpec>,
  #[serde(default)]
  key_fields: Vec<String>,
}

impl TryFrom<SchemaDef> for Schema {
  type Error = Error;

  fn try_from(def: SchemaDef) -> Result<Self> {
    Self::new(def.name, def.fields, def.key_fields)
  }
}

impl From<Schema> for SchemaDef {
  fn from(schema: Schema) -> Self {
    Self {
      name:       schema.name,
      fields:     schema.fields,
      key_fields: schema.key_fields,
    }
  }
}

impl Schema {
  /// Build a schema. The name is normalised to lower case; field defaults
  /// are coerced to their field's kind.
  pub fn new<I, S>(
    name: impl Into<String>,
    fields: Vec<FieldSpec>,
    key_fields: I,
  ) -> Result<Self>
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    let name = name.into().trim().to_lowercase();
    let invalid = |reason: String| Error::InvalidSchema {
      entity: name.clone(),
      reason,
    };

    if name.is_empty() {
      return Err(invalid("entity type name is empty".into()));
    }

    let mut checked: Vec<FieldSpec> = Vec::with_capacity(fields.len());
    for mut field in fields {
      if field.name.is_empty() {
        return Err(invalid("field name is empty".into()));
      }
      if field.name == ENABLED_FIELD
        || SERVER_ASSIGNED_FIELDS.contains(&field.name.as_str())
      {
        return Err(invalid(format!(
          "field {:?} is implicit and cannot be declared",
          field.name
        )));
      }
      if checked.iter().any(|f| f.name == field.name) {
        return Err(invalid(format!("field {:?} is declared twice", field.name)));
      }
      if let Some(default) = &field.default {
        let coerced = field.coerce(&default.to_json()).map_err(|msg| {
          invalid(format!("default for {:?} is invalid: {msg}", field.name))
        })?;
        field.default = Some(coerced);
      }
      checked.push(field);
    }

    let mut keys: Vec<String> = Vec::new();
    for key in key_fields.into_iter().map(Into::into) {
      if !checked.iter().any(|f| f.name == key) {
        return Err(invalid(format!("key field {key:?} is not declared")));
      }
      if keys.contains(&key) {
        return Err(invalid(format!("key field {key:?} is listed twice")));
      }
      keys.push(key);
    }

    Ok(Self { name, fields: checked, key_fields: keys })
  }

  /// The lower-cased dotted type name.
  pub fn name(&self) -> &str { &self.name }

  pub fn fields(&self) -> &[FieldSpec] { &self.fields }

  pub fn field(&self, name: &str) -> Option<&FieldSpec> {
    self.fields.iter().find(|f| f.name == name)
  }

  pub fn key_fields(&self) -> &[String] { &self.key_fields }

  /// Project the key-field values of a validated field map.
  pub fn key_of(&self, fields: &BTreeMap<String, FieldValue>) -> Key {
    Key(
      self
        .key_fields
        .iter()
        .map(|name| fields.get(name).cloned().unwrap_or(FieldValue::Null))
        .collect(),
    )
  }

  /// Coerce caller-supplied key values (e.g. command-line strings) with the
  /// key fields' kinds.
  pub fn key_from_json(&self, values: &[Value]) -> Result<Key> {
    let invalid = |reason: String| Error::InvalidKey {
      entity: self.name.clone(),
      reason,
    };

    if values.len() != self.key_fields.len() {
      return Err(invalid(format!(
        "expected {} key value(s) ({}), got {}",
        self.key_fields.len(),
        self.key_fields.join(", "),
        values.len()
      )));
    }

    self
      .key_fields
      .iter()
      .zip(values)
      .map(|(name, raw)| {
        // Key fields are always declared; `Schema::new` checks it.
        let spec = self
          .field(name)
          .ok_or_else(|| invalid(format!("{name}: not declared")))?;
        spec.coerce(raw).map_err(|msg| invalid(format!("{name}: {msg}")))
      })
      .collect::<Result<Vec<_>>>()
      .map(Key)
  }

  /// The field values of a target that has never been configured. Required
  /// fields have no value and are absent.
  pub fn defaults(&self) -> BTreeMap<String, FieldValue> {
    self
      .fields
      .iter()
      .filter_map(|f| f.fallback().map(|v| (f.name.clone(), v)))
      .collect()
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  fn example() -> Schema {
    Schema::new(
      "Config_Models.ExampleDeserializeConfig",
      vec![
        FieldSpec::text("name"),
        FieldSpec::integer("int_field").with_default(10),
      ],
      ["name"],
    )
    .unwrap()
  }

  #[test]
  fn name_is_lowercased() {
    assert_eq!(example().name(), "config_models.exampledeserializeconfig");
  }

  #[test]
  fn rejects_implicit_field_names() {
    for name in ["enabled", "change_date", "changed_by", "id"] {
      let err =
        Schema::new("a.b", vec![FieldSpec::boolean(name)], Vec::<String>::new())
          .unwrap_err();
      assert!(matches!(err, Error::InvalidSchema { .. }), "{name}");
    }
  }

  #[test]
  fn rejects_undeclared_key_field() {
    let err = Schema::new("a.b", vec![FieldSpec::text("name")], ["missing"])
      .unwrap_err();
    assert!(err.to_string().contains("missing"));
  }

  #[test]
  fn rejects_duplicate_fields() {
    let err = Schema::new(
      "a.b",
      vec![FieldSpec::text("name"), FieldSpec::integer("name")],
      Vec::<String>::new(),
    )
    .unwrap_err();
    assert!(err.to_string().contains("declared twice"));
  }

  #[test]
  fn defaults_are_coerced_and_checked() {
    let schema = Schema::new(
      "a.b",
      vec![FieldSpec::integer("n").with_default("12")],
      Vec::<String>::new(),
    )
    .unwrap();
    assert_eq!(schema.field("n").unwrap().default, Some(FieldValue::Int(12)));

    let err = Schema::new(
      "a.b",
      vec![FieldSpec::integer("n").with_default("twelve")],
      Vec::<String>::new(),
    )
    .unwrap_err();
    assert!(matches!(err, Error::InvalidSchema { .. }));
  }

  #[test]
  fn defaults_skip_required_fields() {
    let defaults = example().defaults();
    assert_eq!(defaults.get("int_field"), Some(&FieldValue::Int(10)));
    assert!(!defaults.contains_key("name"));
  }

  #[test]
  fn key_from_json_coerces_and_checks_arity() {
    let schema = Schema::new(
      "a.b",
      vec![FieldSpec::integer("course"), FieldSpec::text("org")],
      ["course", "org"],
    )
    .unwrap();

    let key = schema.key_from_json(&[json!("7"), json!("acme")]).unwrap();
    assert_eq!(key, Key(vec![FieldValue::Int(7), FieldValue::Text("acme".into())]));

    assert!(matches!(
      schema.key_from_json(&[json!("7")]),
      Err(Error::InvalidKey { .. })
    ));
    assert!(matches!(
      schema.key_from_json(&[json!("seven"), json!("acme")]),
      Err(Error::InvalidKey { .. })
    ));
  }

  #[test]
  fn deserialises_from_settings_shape() {
    let schema: Schema = serde_json::from_value(json!({
      "name": "app.Colors",
      "key_fields": ["slot"],
      "fields": [
        { "name": "slot", "type": "integer" },
        { "name": "color", "type": "choice", "choices": ["red", "blue"], "default": "red" },
        { "name": "label", "type": "text", "max_length": 20, "nullable": true }
      ]
    }))
    .unwrap();

    assert_eq!(schema.name(), "app.colors");
    assert_eq!(schema.key_fields(), ["slot"]);
    assert!(schema.field("slot").unwrap().is_required());
    assert_eq!(
      schema.field("label").unwrap().kind,
      FieldKind::Text { max_length: Some(20), blank: false, trim: true }
    );
    assert_eq!(schema.defaults().get("label"), Some(&FieldValue::Null));
  }

  #[test]
  fn deserialising_an_invalid_schema_fails() {
    let result: std::result::Result<Schema, _> = serde_json::from_value(json!({
      "name": "app.broken",
      "key_fields": ["nope"],
      "fields": []
    }));
    assert!(result.is_err());
  }
}
