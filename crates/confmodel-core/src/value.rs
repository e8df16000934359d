//! Field kinds and the coerced values they produce.
//!
//! Input records arrive as loose JSON. Each [`FieldKind`] decides which JSON
//! shapes it accepts and turns them into a [`FieldValue`]; the rejection
//! messages are the ones surfaced to operators in a validation report.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub(crate) const BOOLEAN_INVALID: &str = "Must be a valid boolean.";
const INTEGER_INVALID: &str = "A valid integer is required.";
const FLOAT_INVALID: &str = "A valid number is required.";
const TEXT_INVALID: &str = "Not a valid string.";
const TEXT_BLANK: &str = "This field may not be blank.";

// ─── FieldValue ──────────────────────────────────────────────────────────────

/// A coerced field value as stored in a configuration row.
///
/// Serialised untagged, so a stored row reads as plain JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
  Null,
  Bool(bool),
  Int(i64),
  Float(f64),
  Text(String),
}

impl FieldValue {
  pub fn is_null(&self) -> bool { matches!(self, Self::Null) }

  pub fn as_bool(&self) -> Option<bool> {
    match self {
      Self::Bool(b) => Some(*b),
      _ => None,
    }
  }

  pub fn as_i64(&self) -> Option<i64> {
    match self {
      Self::Int(i) => Some(*i),
      _ => None,
    }
  }

  pub fn as_f64(&self) -> Option<f64> {
    match self {
      Self::Float(f) => Some(*f),
      Self::Int(i) => Some(*i as f64),
      _ => None,
    }
  }

  pub fn as_str(&self) -> Option<&str> {
    match self {
      Self::Text(s) => Some(s),
      _ => None,
    }
  }

  /// The plain JSON form of this value.
  pub fn to_json(&self) -> Value {
    match self {
      Self::Null => Value::Null,
      Self::Bool(b) => Value::Bool(*b),
      Self::Int(i) => Value::from(*i),
      Self::Float(f) => Value::from(*f),
      Self::Text(s) => Value::String(s.clone()),
    }
  }
}

impl fmt::Display for FieldValue {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Null => f.write_str("null"),
      Self::Bool(b) => write!(f, "{b}"),
      Self::Int(i) => write!(f, "{i}"),
      Self::Float(x) => write!(f, "{x}"),
      Self::Text(s) => f.write_str(s),
    }
  }
}

impl From<bool> for FieldValue {
  fn from(b: bool) -> Self { Self::Bool(b) }
}

impl From<i64> for FieldValue {
  fn from(i: i64) -> Self { Self::Int(i) }
}

impl From<f64> for FieldValue {
  fn from(f: f64) -> Self { Self::Float(f) }
}

impl From<&str> for FieldValue {
  fn from(s: &str) -> Self { Self::Text(s.to_owned()) }
}

impl From<String> for FieldValue {
  fn from(s: String) -> Self { Self::Text(s) }
}

// ─── FieldKind ───────────────────────────────────────────────────────────────

/// The semantic type of a declared field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(tag = "type", rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FieldKind {
  Boolean,
  Integer,
  Float,
  Text {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    max_length: Option<usize>,
    /// Whether the empty string is an acceptable value.
    #[serde(default)]
    blank:      bool,
    /// Strip leading and trailing whitespace before the blank check.
    #[serde(default = "default_trim")]
    trim:       bool,
  },
  Choice {
    choices: Vec<String>,
  },
}

impl FieldKind {
  /// Plain text with no length limit that rejects the empty string.
  pub fn text() -> Self {
    Self::Text { max_length: None, blank: false, trim: true }
  }

  /// Coerce a non-null JSON value into this kind.
  ///
  /// `null` handling belongs to the field, not the kind; see
  /// [`FieldSpec::coerce`](crate::schema::FieldSpec::coerce).
  pub fn coerce(&self, raw: &Value) -> Result<FieldValue, String> {
    match self {
      Self::Boolean => coerce_bool(raw)
        .map(FieldValue::Bool)
        .ok_or_else(|| BOOLEAN_INVALID.to_owned()),
      Self::Integer => coerce_int(raw)
        .map(FieldValue::Int)
        .ok_or_else(|| INTEGER_INVALID.to_owned()),
      Self::Float => coerce_float(raw)
        .map(FieldValue::Float)
        .ok_or_else(|| FLOAT_INVALID.to_owned()),
      Self::Text { max_length, blank, trim } => {
        let text = match raw {
          Value::String(s) if *trim => s.trim().to_owned(),
          Value::String(s) => s.clone(),
          Value::Number(n) => n.to_string(),
          _ => return Err(TEXT_INVALID.to_owned()),
        };
        if text.is_empty() && !blank {
          return Err(TEXT_BLANK.to_owned());
        }
        if let Some(max) = max_length
          && text.chars().count() > *max
        {
          return Err(format!(
            "Ensure this field has no more than {max} characters."
          ));
        }
        Ok(FieldValue::Text(text))
      }
      Self::Choice { choices } => {
        let text = choice_text(raw);
        if choices.iter().any(|c| *c == text) {
          Ok(FieldValue::Text(text))
        } else {
          Err(format!("\"{text}\" is not a valid choice."))
        }
      }
    }
  }
}

fn default_trim() -> bool { true }

/// The text a choice is matched on. Scalars compare by their display form,
/// with booleans spelled `True`/`False`.
fn choice_text(raw: &Value) -> String {
  match raw {
    Value::String(s) => s.clone(),
    Value::Bool(true) => "True".to_owned(),
    Value::Bool(false) => "False".to_owned(),
    other => other.to_string(),
  }
}

pub(crate) fn coerce_bool(raw: &Value) -> Option<bool> {
  match raw {
    Value::Bool(b) => Some(*b),
    Value::Number(n) => match n.as_i64() {
      Some(1) => Some(true),
      Some(0) => Some(false),
      _ => None,
    },
    Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
      "true" | "t" | "yes" | "y" | "on" | "1" => Some(true),
      "false" | "f" | "no" | "n" | "off" | "0" => Some(false),
      _ => None,
    },
    _ => None,
  }
}

fn coerce_int(raw: &Value) -> Option<i64> {
  match raw {
    Value::Number(n) => n.as_i64().or_else(|| {
      n.as_f64()
        .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
        .map(|f| f as i64)
    }),
    Value::String(s) => s.trim().parse().ok(),
    _ => None,
  }
}

fn coerce_float(raw: &Value) -> Option<f64> {
  match raw {
    Value::Number(n) => n.as_f64(),
    Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
    _ => None,
  }
}
