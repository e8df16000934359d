//! Core types and trait definitions for versioned configuration models.
//!
//! A configuration model is a named schema whose values are recorded as
//! immutable, attributed snapshots. This crate holds the schema and value
//! types, record validation, the entity registry, and the storage traits. It
//! is deliberately free of database and process dependencies.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod error;
pub mod identity;
pub mod registry;
pub mod row;
pub mod schema;
pub mod store;
pub mod validate;
pub mod value;

pub use error::{Error, Result};
pub use registry::Registry;
pub use schema::{FieldSpec, Key, Schema};
pub use value::{FieldKind, FieldValue};
