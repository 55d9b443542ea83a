//! `kindred`: command-line access to the fact ledger and its graph
//! projection.
//!
//! # Usage
//!
//! ```
//! kindred append facts.json
//! kindred sync
//! kindred ancestors p-0042 --generations 4
//! kindred kinship p-0042 p-0107
//! ```

mod commands;
mod settings;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use kindred_core::{fact::FactStatus, graph::NodeType};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use crate::settings::Settings;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "kindred", version, about = "Genealogical fact ledger and pedigree queries")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, value_name = "FILE", default_value = "kindred.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Append the fact (or array of facts) in a JSON file to the ledger.
  Append { file: PathBuf },

  /// Every stored version of a fact, oldest first.
  History { fact_id: Uuid },

  /// Latest version of every fact.
  Facts {
    #[arg(long, value_parser = parse_status)]
    status: Option<FactStatus>,
  },

  /// Rebuild the graph projection from the ledger.
  Sync,

  /// Nodes of the projection matching a type and property filters.
  Query {
    #[arg(long = "type", value_parser = parse_node_type)]
    node_type: Option<NodeType>,
    /// `key=value`; the value is parsed as JSON when it can be.
    #[arg(long = "prop", value_name = "KEY=VALUE", value_parser = parse_property)]
    properties: Vec<(String, serde_json::Value)>,
    #[arg(long, default_value_t = 100)]
    limit: usize,
    #[arg(long, default_value_t = 0)]
    offset: usize,
  },

  Ancestors {
    person_id:      String,
    #[arg(long, default_value_t = 10)]
    generations:    u32,
    #[arg(long, default_value_t = 0.0)]
    min_confidence: f64,
  },

  Descendants {
    person_id:      String,
    #[arg(long, default_value_t = 10)]
    generations:    u32,
    #[arg(long, default_value_t = 0.0)]
    min_confidence: f64,
  },

  /// How two people are related.
  Kinship {
    a:           String,
    b:           String,
    #[arg(long, default_value_t = 20)]
    generations: u32,
  },

  /// Parents, spouses, children and siblings of a person.
  Family { person_id: String },

  /// Apply the 100-year rule to a pair of life dates.
  Classify {
    #[arg(long)]
    birth: Option<i32>,
    #[arg(long)]
    death: Option<i32>,
  },
}

fn parse_status(s: &str) -> Result<FactStatus, String> {
  serde_json::from_value(serde_json::Value::String(s.to_owned()))
    .map_err(|_| format!("unknown status {s:?} (proposed, accepted, rejected, incomplete)"))
}

fn parse_node_type(s: &str) -> Result<NodeType, String> {
  s.parse().map_err(|_| format!("unknown node type {s:?}"))
}

fn parse_property(s: &str) -> Result<(String, serde_json::Value), String> {
  let (key, raw) = s
    .split_once('=')
    .ok_or_else(|| format!("expected KEY=VALUE, got {s:?}"))?;
  let value =
    serde_json::from_str(raw).unwrap_or_else(|_| serde_json::Value::String(raw.to_owned()));
  Ok((key.to_owned(), value))
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
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
  commands::run(cli.command, &settings).await
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn property_values_prefer_json() {
    assert_eq!(parse_property("birth_year=1901").unwrap().1, serde_json::json!(1901));
    assert_eq!(parse_property("surname=Lind").unwrap().1, serde_json::json!("Lind"));
    assert_eq!(parse_property("a=b=c").unwrap(), ("a".into(), serde_json::json!("b=c")));
    assert!(parse_property("nokey").is_err());
  }

  #[test]
  fn statuses_and_types_parse_from_snake_case() {
    assert_eq!(parse_status("accepted").unwrap(), FactStatus::Accepted);
    assert!(parse_status("Accepted").is_err());
    assert_eq!(parse_node_type("assertion").unwrap(), NodeType::Assertion);
  }

  #[test]
  fn cli_definition_is_consistent() {
    use clap::CommandFactory;
    Cli::command().debug_assert();
  }
}
