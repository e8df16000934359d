//! The import document: `{"model": "<type name>", "data": [ {...}, ... ]}`.

use std::io::Read;

use confmodel_core::validate::Record;
use serde::Deserialize;

use crate::{Error, Result};

/// A parsed import file. Unknown top-level keys are ignored; every element of
/// `data` must be a JSON object.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ImportDocument {
  /// Registered entity type name, matched case-insensitively.
  pub model: String,
  pub data:  Vec<Record>,
}

impl ImportDocument {
  pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
    serde_json::from_reader(reader).map_err(Error::MalformedInput)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn parse(bytes: &[u8]) -> Result<ImportDocument> { ImportDocument::from_reader(bytes) }

  #[test]
  fn parses_fixture() {
    let doc = parse(include_bytes!("../testdata/data.json"))
      .unwrap();
    assert_eq!(doc.model, "config_models.exampledeserializeconfig");
    assert_eq!(doc.data.len(), 2);
    assert_eq!(doc.data[0]["name"], "betty");
  }

  #[test]
  fn truncated_input_is_malformed() {
    let err = parse(
      br#"{"model": "config_models.exampledeserializeconfig", "data": [{"name": "dino""#,
    )
    .unwrap_err();
    assert!(matches!(err, Error::MalformedInput(_)));
    assert!(err.to_string().starts_with("JSON parse error"));
  }

  #[test]
  fn missing_keys_are_malformed() {
    for input in [
      &br#"{"data": []}"#[..],
      &br#"{"model": "a.b"}"#[..],
      &br#"[]"#[..],
    ] {
      let err = parse(input).unwrap_err();
      assert!(matches!(err, Error::MalformedInput(_)));
    }
  }

  #[test]
  fn non_object_records_are_malformed() {
    let err = parse(br#"{"model": "a.b", "data": [1]}"#)
      .unwrap_err();
    assert!(matches!(err, Error::MalformedInput(_)));
  }

  #[test]
  fn extra_top_level_keys_are_ignored() {
    let doc = parse(
      br#"{"model": "a.b", "data": [], "comment": "hand written"}"#,
    )
    .unwrap();
    assert!(doc.data.is_empty());
  }
}
