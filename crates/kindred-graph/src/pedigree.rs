//! Pedigree traversal over any [`GraphSource`]: ancestors, descendants,
//! kinship and family units.
//!
//! Parents are reached through outgoing `CHILD_OF` edges and children through
//! outgoing `PARENT_OF` edges. Every walk is breadth-first with one visited
//! set, so pedigree collapse (the same ancestor through two lines) reports
//! each person once, at the nearest generation.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use kindred_core::{
  Result,
  graph::{Direction, Edge, EdgeType, Node, NodeType},
  store::{GraphSource, NodeQuery},
};

// ─── Results ─────────────────────────────────────────────────────────────────

/// Which side of the family a branch descends through, fixed at the first
/// hop from the root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lineage {
  Paternal,
  Maternal,
  Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PedigreeMember {
  pub node:              Node,
  /// 1 for parents (or children), 2 for grandparents, …
  pub generation:        u32,
  pub lineage:           Lineage,
  /// Hop labels from the root, e.g. `["father", "mother"]`.
  pub relationship_path: Vec<String>,
  /// Ahnentafel number (root 1, father 2n, mother 2n+1). Ancestors only, and
  /// only while every role on the path is known.
  pub ahnentafel:        Option<u64>,
  /// Lowest edge confidence along the path.
  pub confidence:        f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PedigreeResult {
  pub root:           Option<Node>,
  pub members:        Vec<PedigreeMember>,
  pub max_generation: u32,
  /// Some member at the generation cap still had a qualifying next hop to
  /// someone not already in the result.
  pub truncated:      bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KinshipResult {
  pub person_a:                    Uuid,
  pub person_b:                    Uuid,
  /// Nearest common ancestor (smallest id among equally near ones).
  pub common_ancestor:             Uuid,
  /// Every common ancestor within range, ascending by id.
  pub common_ancestors:            Vec<Uuid>,
  pub generation_a:                u32,
  pub generation_b:                u32,
  pub relationship:                String,
  /// `0.5^(generation_a + generation_b)`. Counts one common ancestor only,
  /// so full siblings get 0.25 rather than 0.5.
  pub coefficient_of_relationship: f64,
  pub degree_of_relationship:      u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FamilyUnitOptions {
  pub include_parents:  bool,
  pub include_spouses:  bool,
  pub include_children: bool,
  pub include_siblings: bool,
}

impl Default for FamilyUnitOptions {
  fn default() -> Self {
    Self {
      include_parents:  true,
      include_spouses:  true,
      include_children: true,
      include_siblings: true,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FamilyUnit {
  pub person:        Node,
  pub father:        Option<Node>,
  pub mother:        Option<Node>,
  /// Parents beyond one father and one mother, or with no known role.
  pub other_parents: Vec<Node>,
  pub spouses:       Vec<Node>,
  pub children:      Vec<Node>,
  pub siblings:      Vec<Node>,
}

// ─── Roles ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
  Male,
  Female,
}

fn gender_role(node: &Node) -> Option<Role> {
  match node.str_property("gender") {
    Some("male") => Some(Role::Male),
    Some("female") => Some(Role::Female),
    _ => None,
  }
}

/// A parent's role: the edge's `parent_role`, else the parent's gender.
fn parent_role(edge: &Edge, parent: &Node) -> Option<Role> {
  match edge.str_property("parent_role") {
    Some("father") => Some(Role::Male),
    Some("mother") => Some(Role::Female),
    _ => gender_role(parent),
  }
}

fn lineage_of(role: Option<Role>) -> Lineage {
  match role {
    Some(Role::Male) => Lineage::Paternal,
    Some(Role::Female) => Lineage::Maternal,
    None => Lineage::Unknown,
  }
}

// ─── Labels ──────────────────────────────────────────────────────────────────

fn ordinal(n: u32) -> String {
  let suffix = match (n % 10, n % 100) {
    (_, 11..=13) => "th",
    (1, _) => "st",
    (2, _) => "nd",
    (3, _) => "rd",
    _ => "th",
  };
  format!("{n}{suffix}")
}

fn greats(n: u32) -> String { "great-".repeat(n as usize) }

/// Name of the relationship between two people whose nearest common ancestor
/// is `ga` generations above one and `gb` above the other.
pub fn kinship_label(ga: u32, gb: u32) -> String {
  match (ga, gb) {
    (0, 0) => "self".into(),
    (0, 1) | (1, 0) => "parent".into(),
    (0, g) | (g, 0) => format!("{}grandparent", greats(g - 2)),
    (1, 1) => "sibling".into(),
    _ => {
      let removal = ga.abs_diff(gb);
      match ga.min(gb) - 1 {
        0 => format!("{}aunt/uncle", greats(removal - 1)),
        degree => {
          let removed = match removal {
            0 => String::new(),
            1 => " once removed".into(),
            2 => " twice removed".into(),
            n => format!(" {n} times removed"),
          };
          format!("{} cousin{removed}", ordinal(degree))
        }
      }
    }
  }
}

// ─── Traversal ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Walk {
  Ancestors,
  Descendants,
}

impl Walk {
  fn edge_type(self) -> EdgeType {
    match self {
      Self::Ancestors => EdgeType::ChildOf,
      Self::Descendants => EdgeType::ParentOf,
    }
  }
}

struct Frontier {
  id:         Uuid,
  generation: u32,
  lineage:    Lineage,
  path:       Vec<String>,
  ahnentafel: Option<u64>,
  confidence: f64,
}

/// Relationship queries over a borrowed graph.
pub struct Pedigree<'g, G> {
  graph: &'g G,
}

impl<'g, G: GraphSource> Pedigree<'g, G> {
  pub fn new(graph: &'g G) -> Self { Self { graph } }

  /// The person node with external id `person_id`.
  pub async fn resolve_person(&self, person_id: &str) -> Result<Option<Node>> {
    let query = NodeQuery::of_type(NodeType::Person)
      .with_property("person_id", person_id)
      .page(1, 0);
    Ok(self.graph.query(&query).await?.into_iter().next())
  }

  pub async fn get_ancestors(
    &self,
    person: Uuid,
    max_generations: u32,
    min_confidence: f64,
  ) -> Result<PedigreeResult> {
    self.walk(person, max_generations, min_confidence, Walk::Ancestors).await
  }

  pub async fn get_descendants(
    &self,
    person: Uuid,
    max_generations: u32,
    min_confidence: f64,
  ) -> Result<PedigreeResult> {
    self.walk(person, max_generations, min_confidence, Walk::Descendants).await
  }

  async fn walk(
    &self,
    root_id: Uuid,
    max_generations: u32,
    min_confidence: f64,
    walk: Walk,
  ) -> Result<PedigreeResult> {
    let Some(root) = self.graph.get_node(root_id).await? else {
      return Ok(PedigreeResult::default());
    };

    let edge_types = [walk.edge_type()];
    let mut result = PedigreeResult { root: Some(root), ..PedigreeResult::default() };
    let mut visited = HashSet::from([root_id]);
    let mut queue = VecDeque::from([Frontier {
      id:         root_id,
      generation: 0,
      lineage:    Lineage::Unknown,
      path:       Vec::new(),
      ahnentafel: (walk == Walk::Ancestors).then_some(1),
      confidence: 1.0,
    }]);

    while let Some(current) = queue.pop_front() {
      let hops = self
        .graph
        .get_neighbors(current.id, Some(&edge_types), Direction::Out)
        .await?;
      let mut hops = hops.into_iter().filter(|(edge, _)| edge.confidence >= min_confidence);

      if current.generation >= max_generations {
        if hops.any(|(_, node)| !visited.contains(&node.id)) {
          result.truncated = true;
        }
        continue;
      }

      for (edge, node) in hops {
        if !visited.insert(node.id) {
          continue;
        }
        let generation = current.generation + 1;
        let (role, label) = match walk {
          Walk::Ancestors => {
            let role = parent_role(&edge, &node);
            let label = match role {
              Some(Role::Male) => "father",
              Some(Role::Female) => "mother",
              None => "parent",
            };
            (role, label)
          }
          Walk::Descendants => {
            let role = gender_role(&node);
            let label = match role {
              Some(Role::Male) => "son",
              Some(Role::Female) => "daughter",
              None => "child",
            };
            (role, label)
          }
        };
        let lineage = if current.generation == 0 { lineage_of(role) } else { current.lineage };
        let ahnentafel = match (current.ahnentafel, role) {
          (Some(n), Some(Role::Male)) => n.checked_mul(2),
          (Some(n), Some(Role::Female)) => n.checked_mul(2).and_then(|m| m.checked_add(1)),
          _ => None,
        };
        let mut path = current.path.clone();
        path.push(label.to_owned());
        let confidence = current.confidence.min(edge.confidence);

        result.max_generation = result.max_generation.max(generation);
        queue.push_back(Frontier {
          id: node.id,
          generation,
          lineage,
          path: path.clone(),
          ahnentafel,
          confidence,
        });
        result.members.push(PedigreeMember {
          node,
          generation,
          lineage,
          relationship_path: path,
          ahnentafel,
          confidence,
        });
      }
    }

    Ok(result)
  }

  /// `ancestor id → generation` including `person` itself at 0.
  async fn ancestor_generations(
    &self,
    person: Uuid,
    max_generations: u32,
  ) -> Result<HashMap<Uuid, u32>> {
    let mut generations = HashMap::from([(person, 0)]);
    let mut queue = VecDeque::from([(person, 0u32)]);
    while let Some((id, generation)) = queue.pop_front() {
      if generation >= max_generations {
        continue;
      }
      for (_, parent) in self
        .graph
        .get_neighbors(id, Some(&[EdgeType::ChildOf]), Direction::Out)
        .await?
      {
        if let std::collections::hash_map::Entry::Vacant(slot) = generations.entry(parent.id) {
          slot.insert(generation + 1);
          queue.push_back((parent.id, generation + 1));
        }
      }
    }
    Ok(generations)
  }

  /// How `a` and `b` are related through their nearest common ancestor, or
  /// `None` when they share none within `max_generations`.
  pub async fn find_kinship(
    &self,
    a: Uuid,
    b: Uuid,
    max_generations: u32,
  ) -> Result<Option<KinshipResult>> {
    if self.graph.get_node(a).await?.is_none() || self.graph.get_node(b).await?.is_none() {
      return Ok(None);
    }
    let from_a = self.ancestor_generations(a, max_generations).await?;
    let from_b = self.ancestor_generations(b, max_generations).await?;

    let common: BTreeSet<Uuid> =
      from_a.keys().filter(|id| from_b.contains_key(id)).copied().collect();
    let Some((_, nearest)) = common
      .iter()
      .map(|id| (from_a[id] + from_b[id], *id))
      .min()
    else {
      return Ok(None);
    };

    let generation_a = from_a[&nearest];
    let generation_b = from_b[&nearest];
    let degree = generation_a + generation_b;
    Ok(Some(KinshipResult {
      person_a: a,
      person_b: b,
      common_ancestor: nearest,
      common_ancestors: common.into_iter().collect(),
      generation_a,
      generation_b,
      relationship: kinship_label(generation_a, generation_b),
      coefficient_of_relationship: 0.5f64.powi(degree as i32),
      degree_of_relationship: degree,
    }))
  }

  /// Parents, spouses, children and siblings of `person`.
  pub async fn get_family_unit(
    &self,
    person: Uuid,
    options: FamilyUnitOptions,
  ) -> Result<Option<FamilyUnit>> {
    let Some(node) = self.graph.get_node(person).await? else {
      return Ok(None);
    };
    let mut unit = FamilyUnit {
      person:        node,
      father:        None,
      mother:        None,
      other_parents: Vec::new(),
      spouses:       Vec::new(),
      children:      Vec::new(),
      siblings:      Vec::new(),
    };

    let parents = self
      .graph
      .get_neighbors(person, Some(&[EdgeType::ChildOf]), Direction::Out)
      .await?;

    if options.include_siblings {
      let mut seen = HashSet::from([person]);
      for (_, parent) in &parents {
        for (_, child) in self
          .graph
          .get_neighbors(parent.id, Some(&[EdgeType::ParentOf]), Direction::Out)
          .await?
        {
          if seen.insert(child.id) {
            unit.siblings.push(child);
          }
        }
      }
      for (_, sibling) in self
        .graph
        .get_neighbors(person, Some(&[EdgeType::SiblingOf]), Direction::Both)
        .await?
      {
        if seen.insert(sibling.id) {
          unit.siblings.push(sibling);
        }
      }
    }

    if options.include_parents {
      for (edge, parent) in parents {
        let slot = match parent_role(&edge, &parent) {
          Some(Role::Male) => &mut unit.father,
          Some(Role::Female) => &mut unit.mother,
          None => {
            unit.other_parents.push(parent);
            continue;
          }
        };
        if slot.is_none() {
          *slot = Some(parent);
        } else {
          unit.other_parents.push(parent);
        }
      }
    }

    if options.include_spouses {
      unit.spouses = self.distinct_neighbors(person, EdgeType::SpouseOf, Direction::Both).await?;
    }
    if options.include_children {
      unit.children = self.distinct_neighbors(person, EdgeType::ParentOf, Direction::Out).await?;
    }

    Ok(Some(unit))
  }

  async fn distinct_neighbors(
    &self,
    person: Uuid,
    edge_type: EdgeType,
    direction: Direction,
  ) -> Result<Vec<Node>> {
    let mut seen = HashSet::new();
    Ok(
      self
        .graph
        .get_neighbors(person, Some(&[edge_type]), direction)
        .await?
        .into_iter()
        .filter_map(|(_, node)| seen.insert(node.id).then_some(node))
        .collect(),
    )
  }
}
