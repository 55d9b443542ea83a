//! Subcommand implementations. Each opens what it needs, runs one library
//! operation and prints the result as pretty JSON on stdout.

use std::path::Path;

use anyhow::{Context, Result, bail};
use kindred_core::{
  fact::Fact,
  graph::Node,
  privacy::PrivacyClassifier,
  store::{GraphSource, NodeQuery},
};
use kindred_graph::{AnyGraphStore, FamilyUnitOptions, Pedigree, Projection};
use kindred_ledger::Ledger;
use kindred_store_sqlite::SqliteKv;
use serde::{Deserialize, Serialize};

use crate::{Command, settings::Settings};

/// `kindred append` accepts one fact or a list.
#[derive(Deserialize)]
#[serde(untagged)]
enum FactFile {
  One(Box<Fact>),
  Many(Vec<Fact>),
}

fn print<T: Serialize + ?Sized>(value: &T) -> Result<()> {
  println!("{}", serde_json::to_string_pretty(value).context("failed to serialise output")?);
  Ok(())
}

async fn open_ledger(settings: &Settings) -> Result<Ledger<SqliteKv>> {
  let path = &settings.ledger_path;
  let kv = SqliteKv::open(path)
    .await
    .with_context(|| format!("failed to open ledger at {}", path.display()))?;
  Ok(Ledger::new(kv))
}

async fn open_graph(settings: &Settings) -> Result<AnyGraphStore> {
  AnyGraphStore::open(&settings.graph)
    .await
    .with_context(|| format!("failed to open {:?} graph store", settings.graph.backend))
}

fn read_facts(path: &Path) -> Result<Vec<Fact>> {
  let raw = std::fs::read_to_string(path)
    .with_context(|| format!("reading fact file {}", path.display()))?;
  let parsed: FactFile = serde_json::from_str(&raw)
    .with_context(|| format!("parsing fact file {}", path.display()))?;
  Ok(match parsed {
    FactFile::One(fact) => vec![*fact],
    FactFile::Many(facts) => facts,
  })
}

/// The projected person node for an external person id.
async fn resolve<G: GraphSource>(pedigree: &Pedigree<'_, G>, person_id: &str) -> Result<Node> {
  match pedigree.resolve_person(person_id).await? {
    Some(node) => Ok(node),
    None => bail!("no person {person_id:?} in the projection (run `kindred sync` first?)"),
  }
}

pub(crate) async fn run(command: Command, settings: &Settings) -> Result<()> {
  let classifier = PrivacyClassifier::new(settings.privacy);

  match command {
    Command::Append { file } => {
      let ledger = open_ledger(settings).await?;
      let mut keys = Vec::new();
      for fact in read_facts(&file)? {
        let fact_id = fact.fact_id;
        let key = ledger
          .append(fact)
          .await
          .with_context(|| format!("failed to append fact {fact_id}"))?;
        keys.push(key);
      }
      tracing::info!(count = keys.len(), "appended facts");
      print(&keys)
    }

    Command::History { fact_id } => {
      let ledger = open_ledger(settings).await?;
      let versions = ledger.get_all_versions(fact_id).await?;
      if versions.is_empty() {
        bail!("no fact {fact_id} in the ledger");
      }
      print(&versions)
    }

    Command::Facts { status } => {
      let ledger = open_ledger(settings).await?;
      let facts = ledger
        .iter_all_facts(status)
        .await?
        .collect::<kindred_core::Result<Vec<_>>>()
        .context("ledger holds an undecodable fact")?;
      print(&facts)
    }

    Command::Sync => {
      let ledger = open_ledger(settings).await?;
      let graph = open_graph(settings).await?;
      let projection = Projection::new(ledger, graph, classifier, settings.projection);
      let metadata = projection.sync(true).await.context("projection sync failed")?;
      print(&metadata)
    }

    Command::Query { node_type, properties, limit, offset } => {
      let graph = open_graph(settings).await?;
      let mut query = NodeQuery { node_type, ..NodeQuery::default() }.page(limit, offset);
      query.properties.extend(properties);
      print(&graph.query(&query).await?)
    }

    Command::Ancestors { person_id, generations, min_confidence } => {
      let graph = open_graph(settings).await?;
      let pedigree = Pedigree::new(&graph);
      let root = resolve(&pedigree, &person_id).await?;
      print(&pedigree.get_ancestors(root.id, generations, min_confidence).await?)
    }

    Command::Descendants { person_id, generations, min_confidence } => {
      let graph = open_graph(settings).await?;
      let pedigree = Pedigree::new(&graph);
      let root = resolve(&pedigree, &person_id).await?;
      print(&pedigree.get_descendants(root.id, generations, min_confidence).await?)
    }

    Command::Kinship { a, b, generations } => {
      let graph = open_graph(settings).await?;
      let pedigree = Pedigree::new(&graph);
      let a = resolve(&pedigree, &a).await?;
      let b = resolve(&pedigree, &b).await?;
      print(&pedigree.find_kinship(a.id, b.id, generations).await?)
    }

    Command::Family { person_id } => {
      let graph = open_graph(settings).await?;
      let pedigree = Pedigree::new(&graph);
      let person = resolve(&pedigree, &person_id).await?;
      print(&pedigree.get_family_unit(person.id, FamilyUnitOptions::default()).await?)
    }

    Command::Classify { birth, death } => print(&classifier.classify(birth, death)),
  }
}
