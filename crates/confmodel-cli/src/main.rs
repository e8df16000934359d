//! `confmodel` command-line tool.
//!
//! Reads `config.toml` (or the path given with `--config`), registers the
//! configured models, opens the SQLite store, and runs one subcommand.
//!
//! ```text
//! confmodel add-user test_management_worker
//! confmodel populate-model -f data.json -u test_management_worker
//! confmodel current config_models.exampledeserializeconfig betty
//! ```

use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use confmodel_cli::{PopulateArgs, Settings};
use confmodel_store_sqlite::SqliteStore;
use serde::Serialize;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Versioned configuration model tool")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Populate configuration model data from a JSON file.
  PopulateModel(PopulateArgs),
  /// Show the current configuration for one key of a model.
  Current {
    model: String,
    /// One value per key field, in declaration order.
    key:   Vec<String>,
  },
  /// Show the current configuration of every configured key of a model.
  List { model: String },
  /// Show every row ever written for a model, oldest first.
  History {
    model: String,
    /// Restrict to one key; one value per key field.
    key:   Vec<String>,
  },
  /// Register a user that imports can be attributed to.
  AddUser { username: String },
  /// List the registered configuration models.
  Models,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Logs go to stderr so stdout stays machine-readable.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .with_writer(std::io::stderr)
    .init();

  let cli = Cli::parse();

  let settings = Settings::load(&cli.config)?;
  let registry = settings.registry()?;

  match cli.command {
    Command::Models => {
      print!("{}", confmodel_cli::describe_models(&registry));
    }
    Command::PopulateModel(args) => {
      let store = open_store(&settings).await?;
      confmodel_cli::populate_model(&store, &registry, &settings, &args).await?;
    }
    Command::Current { model, key } => {
      let store = open_store(&settings).await?;
      print_json(&confmodel_cli::current(&store, &registry, &model, &key).await?)?;
    }
    Command::List { model } => {
      let store = open_store(&settings).await?;
      print_json(&confmodel_cli::list_current(&store, &registry, &model).await?)?;
    }
    Command::History { model, key } => {
      let store = open_store(&settings).await?;
      print_json(&confmodel_cli::history(&store, &registry, &model, &key).await?)?;
    }
    Command::AddUser { username } => {
      let store = open_store(&settings).await?;
      print_json(&confmodel_cli::add_user(&store, &username).await?)?;
    }
  }

  Ok(())
}

/// Open the store, creating its parent directory on first use.
async fn open_store(settings: &Settings) -> anyhow::Result<SqliteStore> {
  let store_path = settings.store_path();
  if let Some(parent) = store_path.parent()
    && !parent.as_os_str().is_empty()
  {
    std::fs::create_dir_all(parent)
      .with_context(|| format!("failed to create {parent:?}"))?;
  }
  SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
  println!("{}", serde_json::to_string_pretty(value)?);
  Ok(())
}
