//! Layered configuration: defaults, then the TOML file, then `KINDRED_*`
//! environment variables.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use kindred_core::privacy::PrivacyConfig;
use kindred_graph::{GraphBackend, GraphConfig, ProjectionConfig};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
  /// SQLite file holding the fact ledger.
  pub ledger_path: PathBuf,
  pub graph:       GraphConfig,
  pub privacy:     PrivacyConfig,
  pub projection:  ProjectionConfig,
}

impl Default for Settings {
  fn default() -> Self {
    Self {
      ledger_path: PathBuf::from("kindred-ledger.db"),
      graph:       GraphConfig {
        backend: GraphBackend::Sqlite,
        path:    Some(PathBuf::from("kindred-graph.db")),
      },
      privacy:     PrivacyConfig::default(),
      projection:  ProjectionConfig::default(),
    }
  }
}

impl Settings {
  /// Read `file` (if present) and the environment. Nested keys use `__`,
  /// e.g. `KINDRED_GRAPH__BACKEND=kv`.
  pub fn load(file: &Path) -> anyhow::Result<Self> {
    let settings = config::Config::builder()
      .add_source(config::File::from(file).required(false))
      .add_source(
        config::Environment::with_prefix("KINDRED")
          .prefix_separator("_")
          .separator("__"),
      )
      .build()
      .with_context(|| format!("failed to read config file {}", file.display()))?;

    let mut settings: Self = settings
      .try_deserialize()
      .context("failed to deserialise settings")?;
    settings.ledger_path = expand_tilde(&settings.ledger_path);
    settings.graph.path = settings.graph.path.as_deref().map(expand_tilde);
    settings.validate()?;
    Ok(settings)
  }

  /// Reject a `kv` graph that would share the ledger's key space.
  pub fn validate(&self) -> anyhow::Result<()> {
    if self.graph.backend == GraphBackend::Kv
      && self.graph.path.as_deref() == Some(self.ledger_path.as_path())
    {
      anyhow::bail!(
        "graph.path must differ from ledger_path when graph.backend = \"kv\" (both are {})",
        self.ledger_path.display()
      );
    }
    Ok(())
  }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
