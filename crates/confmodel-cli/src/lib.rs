//! Command implementations for the `confmodel` binary.
//!
//! Kept out of `main.rs` so the commands can be exercised against an
//! in-memory store.

use std::{
  fmt::Write as _,
  fs::File,
  io::BufReader,
  path::{Path, PathBuf},
};

use anyhow::{Context as _, bail};
use clap::Args;
use confmodel_core::{
  Registry, Schema,
  identity::User,
  row::{ConfigRow, CurrentConfig},
  store::{ConfigStore, IdentityStore},
};
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

// ─── Settings ────────────────────────────────────────────────────────────────

/// Process-wide settings, deserialised from `config.toml` and `CONFMODEL_*`
/// environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
  #[serde(default = "default_store_path")]
  pub store_path:              PathBuf,
  /// Acting user for imports that do not name one.
  #[serde(default)]
  pub service_worker_username: Option<String>,
  /// Configuration entity schemas to register at startup.
  #[serde(default)]
  pub models:                  Vec<Schema>,
}

fn default_store_path() -> PathBuf { PathBuf::from("confmodel.db") }

impl Default for Settings {
  fn default() -> Self {
    Self {
      store_path:              default_store_path(),
      service_worker_username: None,
      models:                  Vec::new(),
    }
  }
}

impl Settings {
  /// Load settings from `path` (optional) layered under the environment.
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    let settings = config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(config::Environment::with_prefix("CONFMODEL"))
      .build()
      .context("failed to read config file")?;

    settings
      .try_deserialize()
      .context("failed to deserialise Settings")
  }

  /// Register every configured model.
  pub fn registry(&self) -> anyhow::Result<Registry> {
    Registry::from_schemas(self.models.iter().cloned())
      .context("failed to register configuration models")
  }

  /// The store path with a leading `~` expanded.
  pub fn store_path(&self) -> PathBuf { expand_tilde(&self.store_path) }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

// ─── populate-model ──────────────────────────────────────────────────────────

/// Append configuration rows from a JSON file. Existing rows are never
/// changed or removed.
#[derive(Args, Debug, Default)]
pub struct PopulateArgs {
  /// JSON file to import configuration model data from.
  #[arg(short, long, value_name = "JSON_FILE")]
  pub file:     Option<PathBuf>,

  /// Who is executing the command; defaults to `service_worker_username`.
  #[arg(short, long, value_name = "USERNAME")]
  pub username: Option<String>,
}

pub async fn populate_model<S>(
  store: &S,
  registry: &Registry,
  settings: &Settings,
  args: &PopulateArgs,
) -> anyhow::Result<usize>
where
  S: ConfigStore + IdentityStore,
{
  let Some(path) = args.file.as_deref() else {
    bail!("A file containing JSON must be specified.");
  };
  if !path.exists() {
    bail!("File {} does not exist", path.display());
  }

  let username = non_empty(args.username.as_deref())
    .or(non_empty(settings.service_worker_username.as_deref()));

  println!("Importing JSON data from file {}", path.display());
  let file = File::open(path)
    .with_context(|| format!("failed to open {}", path.display()))?;

  let created =
    confmodel_import::deserialize_json(BufReader::new(file), registry, store, username)
      .await?;

  info!(file = %path.display(), rows = created, "import complete");
  println!("Import complete");
  Ok(created)
}

fn non_empty(name: Option<&str>) -> Option<&str> {
  name.filter(|name| !name.is_empty())
}

// ─── Queries ─────────────────────────────────────────────────────────────────

fn parse_key(schema: &Schema, key: &[String]) -> anyhow::Result<confmodel_core::Key> {
  let values: Vec<Value> = key.iter().cloned().map(Value::String).collect();
  Ok(schema.key_from_json(&values)?)
}

/// The current configuration of `model` for `key` (one value per key field).
pub async fn current<S: ConfigStore>(
  store: &S,
  registry: &Registry,
  model: &str,
  key: &[String],
) -> anyhow::Result<CurrentConfig> {
  let schema = registry.resolve(model)?;
  let key = parse_key(&schema, key)?;
  Ok(store.query_current(&schema, &key).await?)
}

/// Every row of `model`, or of one key when `key` is non-empty.
pub async fn history<S: ConfigStore>(
  store: &S,
  registry: &Registry,
  model: &str,
  key: &[String],
) -> anyhow::Result<Vec<ConfigRow>> {
  let schema = registry.resolve(model)?;
  let key = if key.is_empty() && !schema.key_fields().is_empty() {
    None
  } else {
    Some(parse_key(&schema, key)?)
  };
  Ok(store.history(schema.name(), key.as_ref()).await?)
}

/// The current row of every configured key of `model`.
pub async fn list_current<S: ConfigStore>(
  store: &S,
  registry: &Registry,
  model: &str,
) -> anyhow::Result<Vec<ConfigRow>> {
  let schema = registry.resolve(model)?;
  Ok(store.list_current(&schema).await?)
}

pub async fn add_user<S: IdentityStore>(store: &S, username: &str) -> anyhow::Result<User> {
  let user = store.add_user(username).await?;
  info!(username, user_id = %user.user_id, "created user");
  Ok(user)
}

/// Human-readable summary of every registered model.
pub fn describe_models(registry: &Registry) -> String {
  let mut out = String::new();
  for schema in registry.schemas() {
    let _ = writeln!(out, "{}", schema.name());
    if !schema.key_fields().is_empty() {
      let _ = writeln!(out, "  key: {}", schema.key_fields().join(", "));
    }
    for field in schema.fields() {
      let mut line = format!("  {}: {}", field.name, field.kind);
      if let Some(default) = &field.default {
        let _ = write!(line, " = {}", default.to_json());
      }
      if field.nullable {
        line.push_str(" (nullable)");
      }
      let _ = writeln!(out, "{line}");
    }
  }
  out
}
