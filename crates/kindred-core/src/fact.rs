//! Fact types: the fundamental unit of the Kindred ledger.
//!
//! A fact is an immutable, versioned genealogical claim. A given
//! `(fact_id, version)` pair is never rewritten; corrections are appended as
//! `version + 1` under the same `fact_id`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Status ──────────────────────────────────────────────────────────────────

/// Review state of a fact version.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum FactStatus {
  #[default]
  Proposed,
  Accepted,
  Rejected,
  /// The claim is missing information needed to evaluate it.
  Incomplete,
}

impl FactStatus {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Proposed => "proposed",
      Self::Accepted => "accepted",
      Self::Rejected => "rejected",
      Self::Incomplete => "incomplete",
    }
  }
}

// ─── Provenance ──────────────────────────────────────────────────────────────

/// Where a fact came from. Every fact should carry at least one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
  /// Human-readable title, e.g. "1880 US Census, Ohio, Franklin County".
  pub title:       String,
  /// Identifier assigned by the supplying connector, if any.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub source_id:   Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub url:         Option<String>,
  /// Archive or collection holding the record.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub repository:  Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub accessed_at: Option<DateTime<Utc>>,
  /// Transcribed excerpt supporting the statement.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub excerpt:     Option<String>,
}

impl Citation {
  pub fn new(title: impl Into<String>) -> Self {
    Self {
      title:       title.into(),
      source_id:   None,
      url:         None,
      repository:  None,
      accessed_at: None,
      excerpt:     None,
    }
  }

  pub fn with_url(mut self, url: impl Into<String>) -> Self {
    self.url = Some(url.into());
    self
  }
}

// ─── Typed payloads ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
  Male,
  Female,
  Unknown,
}

impl Gender {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Male => "male",
      Self::Female => "female",
      Self::Unknown => "unknown",
    }
  }
}

/// Identity facts about one person.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonValue {
  /// External identifier shared by every fact about this person.
  pub person_id:  String,
  #[serde(default)]
  pub full_name:  Option<String>,
  #[serde(default)]
  pub given_name: Option<String>,
  #[serde(default)]
  pub surname:    Option<String>,
  #[serde(default)]
  pub gender:     Option<Gender>,
  #[serde(default)]
  pub birth_year: Option<i32>,
  #[serde(default)]
  pub death_year: Option<i32>,
}

impl PersonValue {
  pub fn new(person_id: impl Into<String>) -> Self {
    Self {
      person_id:  person_id.into(),
      full_name:  None,
      given_name: None,
      surname:    None,
      gender:     None,
      birth_year: None,
      death_year: None,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
  /// `subject` is a parent of `object`.
  Parent,
  Spouse,
  Sibling,
  /// Entity-resolution proposal that two person ids may be the same person.
  PossiblySame,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParentRole {
  Father,
  Mother,
}

impl ParentRole {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Father => "father",
      Self::Mother => "mother",
    }
  }
}

/// A relationship between two persons, referenced by external person id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipValue {
  pub kind:        RelationKind,
  pub subject:     String,
  pub object:      String,
  /// Only meaningful for [`RelationKind::Parent`].
  #[serde(default)]
  pub parent_role: Option<ParentRole>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
  Birth,
  Death,
  Marriage,
  Burial,
  Residence,
  Other,
}

impl EventKind {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Birth => "birth",
      Self::Death => "death",
      Self::Marriage => "marriage",
      Self::Burial => "burial",
      Self::Residence => "residence",
      Self::Other => "other",
    }
  }
}

/// A dated, optionally located life event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventValue {
  pub kind:      EventKind,
  pub person_id: String,
  #[serde(default)]
  pub year:      Option<i32>,
  /// Free-form date as written in the source ("abt. 3 Mar 1842").
  #[serde(default)]
  pub date:      Option<String>,
  #[serde(default)]
  pub place:     Option<String>,
}

/// The typed payload of a fact, used by the projection to build graph
/// structure. Facts without a payload are plain assertions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum FactValue {
  Person(PersonValue),
  Relationship(RelationshipValue),
  Event(EventValue),
}

impl FactValue {
  /// Every external person id this payload mentions, subject first.
  pub fn person_ids(&self) -> Vec<&str> {
    match self {
      Self::Person(p) => vec![p.person_id.as_str()],
      Self::Relationship(r) => vec![r.subject.as_str(), r.object.as_str()],
      Self::Event(e) => vec![e.person_id.as_str()],
    }
  }
}

// ─── Fact ────────────────────────────────────────────────────────────────────

/// One immutable version of a genealogical claim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fact {
  pub fact_id:    Uuid,
  /// Starts at 1; each revision appends `previous + 1`.
  pub version:    u32,
  pub statement:  String,
  #[serde(default)]
  pub sources:    Vec<Citation>,
  /// Probability-like score in `[0, 1]`.
  pub confidence: f64,
  pub status:     FactStatus,
  #[serde(default)]
  pub person_id:  Option<String>,
  #[serde(default)]
  pub value:      Option<FactValue>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl Fact {
  /// A fresh version-1 fact in [`FactStatus::Proposed`].
  pub fn new(statement: impl Into<String>, confidence: f64) -> Self {
    let now = Utc::now();
    Self {
      fact_id: Uuid::new_v4(),
      version: 1,
      statement: statement.into(),
      sources: Vec::new(),
      confidence,
      status: FactStatus::default(),
      person_id: None,
      value: None,
      created_at: now,
      updated_at: now,
    }
  }

  pub fn with_value(mut self, value: FactValue) -> Self {
    if self.person_id.is_none() {
      self.person_id = value.person_ids().first().map(|s| s.to_string());
    }
    self.value = Some(value);
    self
  }

  pub fn with_person(mut self, person_id: impl Into<String>) -> Self {
    self.person_id = Some(person_id.into());
    self
  }

  pub fn with_source(mut self, citation: Citation) -> Self {
    self.sources.push(citation);
    self
  }

  pub fn with_status(mut self, status: FactStatus) -> Self {
    self.status = status;
    self
  }

  /// The next version of this fact: same id and creation time, `version + 1`,
  /// `updated_at` set to now. The caller edits the copy and appends it.
  pub fn revised(&self) -> Self {
    Self {
      version: self.version + 1,
      updated_at: Utc::now(),
      ..self.clone()
    }
  }

  /// The ledger key for this version: `"{fact_id}:{version}"`.
  pub fn ledger_key(&self) -> String { ledger_key(self.fact_id, self.version) }

  /// Whether this fact refers to `person_id`, either directly or through its
  /// typed payload.
  pub fn mentions(&self, person_id: &str) -> bool {
    self.person_id.as_deref() == Some(person_id)
      || self
        .value
        .as_ref()
        .is_some_and(|v| v.person_ids().contains(&person_id))
  }

  /// Reject contents no ledger should accept.
  pub fn validate(&self) -> Result<()> {
    if self.version == 0 {
      return Err(Error::InvalidFact(format!(
        "fact {} has version 0; versions start at 1",
        self.fact_id
      )));
    }
    if !self.confidence.is_finite() || !(0.0..=1.0).contains(&self.confidence) {
      return Err(Error::InvalidFact(format!(
        "fact {} has confidence {} outside [0, 1]",
        self.fact_id, self.confidence
      )));
    }
    Ok(())
  }
}

/// Build a ledger key from its parts.
pub fn ledger_key(fact_id: Uuid, version: u32) -> String {
  format!("{}:{version}", fact_id.hyphenated())
}

/// Split a ledger key back into `(fact_id, version)`. Returns `None` for keys
/// that do not follow the `"{uuid}:{u32}"` layout.
pub fn parse_ledger_key(key: &str) -> Option<(Uuid, u32)> {
  let (id, version) = key.rsplit_once(':')?;
  Some((Uuid::parse_str(id).ok()?, version.parse().ok()?))
}
