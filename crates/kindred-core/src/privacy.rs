//! Privacy classification under the 100-Year Rule.
//!
//! A person is presumed living, and their facts restricted, unless a death is
//! recorded or their birth lies more than `living_threshold_years` in the
//! past. Missing data always degrades to the restricted outcome.
//!
//! The classifier is a plain value injected wherever classification is
//! needed; it never encrypts anything itself and never returns an error.

use std::sync::LazyLock;

use chrono::{Datelike, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::fact::Fact;

// ─── Configuration ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrivacyConfig {
  /// Births strictly more than this many years ago are presumed deceased.
  pub living_threshold_years: i32,
  /// Maximum plausible lifespan; beyond this the presumption is stronger.
  pub max_lifespan_years:     i32,
}

impl Default for PrivacyConfig {
  fn default() -> Self {
    Self { living_threshold_years: 100, max_lifespan_years: 120 }
  }
}

// ─── Results ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrivacyStatus {
  Living,
  DeceasedVerified,
  DeceasedPresumed,
  Unknown,
}

impl PrivacyStatus {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Living => "living",
      Self::DeceasedVerified => "deceased_verified",
      Self::DeceasedPresumed => "deceased_presumed",
      Self::Unknown => "unknown",
    }
  }
}

/// Which branch of the rule produced a classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrivacyBasis {
  DeathRecorded,
  BeyondMaxLifespan,
  BeyondThreshold,
  WithinThreshold,
  NoDates,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PiiKind {
  Ssn,
  Email,
  Phone,
}

impl PiiKind {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Ssn => "ssn",
      Self::Email => "email",
      Self::Phone => "phone",
    }
  }
}

/// A reportable issue: PII-like text on a restricted fact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivacyViolation {
  pub kind:    PiiKind,
  pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
  pub status:     PrivacyStatus,
  /// Restricted data must be gated (and encrypted at rest) by its holder.
  pub restricted: bool,
  pub basis:      PrivacyBasis,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub violations: Vec<PrivacyViolation>,
}

// ─── PII patterns ────────────────────────────────────────────────────────────

static PII_PATTERNS: LazyLock<Vec<(PiiKind, Regex)>> = LazyLock::new(|| {
  vec![
    (PiiKind::Ssn, Regex::new(r"\b(?:\d{3}-\d{2}-\d{4}|\d{9})\b").unwrap()),
    (
      PiiKind::Email,
      Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").unwrap(),
    ),
    (
      PiiKind::Phone,
      Regex::new(r"(?:\+?1[-.\s]?)?(?:\(\d{3}\)|\b\d{3})[-.\s]?\d{3}[-.\s]?\d{4}\b")
        .unwrap(),
    ),
  ]
});

/// The kinds of PII-like text found in `text`, in a fixed order, each at most
/// once.
pub fn scan_pii(text: &str) -> Vec<PiiKind> {
  PII_PATTERNS
    .iter()
    .filter(|(_, re)| re.is_match(text))
    .map(|(kind, _)| *kind)
    .collect()
}

// ─── Classifier ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PrivacyClassifier {
  config:       PrivacyConfig,
  /// Pinned evaluation year; `None` reads the clock on every call.
  current_year: Option<i32>,
}

impl PrivacyClassifier {
  pub fn new(config: PrivacyConfig) -> Self { Self { config, current_year: None } }

  /// Evaluate as if the calendar year were `year`.
  pub fn at_year(mut self, year: i32) -> Self {
    self.current_year = Some(year);
    self
  }

  pub fn config(&self) -> &PrivacyConfig { &self.config }

  pub fn current_year(&self) -> i32 {
    self.current_year.unwrap_or_else(|| Utc::now().year())
  }

  /// Apply the 100-Year Rule.
  pub fn classify(&self, birth_year: Option<i32>, death_year: Option<i32>) -> Classification {
    let (status, basis) = match (birth_year, death_year) {
      (_, Some(_)) => (PrivacyStatus::DeceasedVerified, PrivacyBasis::DeathRecorded),
      (Some(born), None) => {
        // Widened so that any pair of `i32` years has a representable age.
        let age = i64::from(self.current_year()) - i64::from(born);
        if age > i64::from(self.config.max_lifespan_years) {
          (PrivacyStatus::DeceasedPresumed, PrivacyBasis::BeyondMaxLifespan)
        } else if age > i64::from(self.config.living_threshold_years) {
          (PrivacyStatus::DeceasedPresumed, PrivacyBasis::BeyondThreshold)
        } else {
          (PrivacyStatus::Living, PrivacyBasis::WithinThreshold)
        }
      }
      (None, None) => (PrivacyStatus::Unknown, PrivacyBasis::NoDates),
    };

    Classification {
      status,
      restricted: matches!(status, PrivacyStatus::Living | PrivacyStatus::Unknown),
      basis,
      violations: Vec::new(),
    }
  }

  /// Classify the person a fact is about and, when the result is restricted,
  /// report any PII-like text in the fact's statement.
  pub fn classify_fact(
    &self,
    fact: &Fact,
    birth_year: Option<i32>,
    death_year: Option<i32>,
  ) -> Classification {
    let mut classification = self.classify(birth_year, death_year);
    if classification.restricted {
      classification.violations = scan_pii(&fact.statement)
        .into_iter()
        .map(|kind| PrivacyViolation {
          kind,
          message: format!(
            "fact {} v{} contains {}-like text but its subject is {}",
            fact.fact_id,
            fact.version,
            kind.as_str(),
            classification.status.as_str(),
          ),
        })
        .collect();
    }
    classification
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const YEAR: i32 = 2024;

  fn classifier() -> PrivacyClassifier {
    PrivacyClassifier::new(PrivacyConfig::default()).at_year(YEAR)
  }

  #[test]
  fn born_exactly_threshold_years_ago_is_living() {
    let c = classifier().classify(Some(YEAR - 100), None);
    assert_eq!(c.status, PrivacyStatus::Living);
    assert!(c.restricted);
  }

  #[test]
  fn born_one_year_past_threshold_is_presumed_deceased() {
    let c = classifier().classify(Some(YEAR - 101), None);
    assert_eq!(c.status, PrivacyStatus::DeceasedPresumed);
    assert_eq!(c.basis, PrivacyBasis::BeyondThreshold);
    assert!(!c.restricted);
  }

  #[test]
  fn beyond_max_lifespan_is_stronger_presumption() {
    let c = classifier().classify(Some(YEAR - 121), None);
    assert_eq!(c.status, PrivacyStatus::DeceasedPresumed);
    assert_eq!(c.basis, PrivacyBasis::BeyondMaxLifespan);
    assert!(!c.restricted);
  }

  #[test]
  fn recorded_death_is_unrestricted_regardless_of_birth() {
    for birth in [None, Some(1800), Some(YEAR - 5)] {
      let c = classifier().classify(birth, Some(1850));
      assert_eq!(c.status, PrivacyStatus::DeceasedVerified);
      assert!(!c.restricted);
    }
  }

  #[test]
  fn no_dates_fails_toward_protection() {
    let c = classifier().classify(None, None);
    assert_eq!(c.status, PrivacyStatus::Unknown);
    assert!(c.restricted);
  }

  #[test]
  fn future_birth_year_is_living() {
    let c = classifier().classify(Some(YEAR + 3), None);
    assert_eq!(c.status, PrivacyStatus::Living);
  }

  #[test]
  fn extreme_birth_years_classify_without_overflow() {
    let ancient = classifier().classify(Some(i32::MIN), None);
    assert_eq!(ancient.status, PrivacyStatus::DeceasedPresumed);
    assert_eq!(ancient.basis, PrivacyBasis::BeyondMaxLifespan);

    let far_future = classifier().classify(Some(i32::MAX), None);
    assert_eq!(far_future.status, PrivacyStatus::Living);
    assert!(far_future.restricted);

    let negative_year = PrivacyClassifier::default().at_year(i32::MIN).classify(Some(i32::MAX), None);
    assert_eq!(negative_year.status, PrivacyStatus::Living);
  }

  #[test]
  fn custom_threshold() {
    let c = PrivacyClassifier::new(PrivacyConfig {
      living_threshold_years: 80,
      max_lifespan_years:     110,
    })
    .at_year(YEAR)
    .classify(Some(YEAR - 90), None);
    assert_eq!(c.status, PrivacyStatus::DeceasedPresumed);
  }

  #[test]
  fn pii_scan_finds_each_kind() {
    assert_eq!(scan_pii("SSN 123-45-6789 on file"), vec![PiiKind::Ssn]);
    assert_eq!(scan_pii("write to anna.berg@example.org"), vec![PiiKind::Email]);
    assert_eq!(scan_pii("call (555) 123-4567"), vec![PiiKind::Phone]);
    assert_eq!(scan_pii("call 555.123.4567 today"), vec![PiiKind::Phone]);
    assert!(scan_pii("born 1842 in Uppsala, died 1901").is_empty());
  }

  #[test]
  fn violations_only_on_restricted_facts() {
    let fact = Fact::new("Reach her at anna@example.org", 0.9);

    let living = classifier().classify_fact(&fact, Some(YEAR - 30), None);
    assert!(living.restricted);
    assert_eq!(living.violations.len(), 1);
    assert_eq!(living.violations[0].kind, PiiKind::Email);

    let dead = classifier().classify_fact(&fact, Some(1800), Some(1870));
    assert!(!dead.restricted);
    assert!(dead.violations.is_empty());
  }
}
