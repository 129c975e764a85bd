//! Rule data model.
//!
//! Rules are pure data: a set of patterns plus the documentation needed to
//! explain a failure. Adding a rule never requires touching the engine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse grouping a rule belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleCategory {
    #[serde(alias = "ARAI")]
    Demarcation,
    #[serde(alias = "CON")]
    Consistency,
    #[serde(alias = "ESS")]
    Essence,
    #[serde(alias = "INT")]
    Integrity,
    #[serde(alias = "SAM")]
    Coherence,
    #[serde(alias = "STR")]
    Structure,
    #[serde(alias = "VER")]
    Verification,
}

impl RuleCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleCategory::Demarcation => "demarcation",
            RuleCategory::Consistency => "consistency",
            RuleCategory::Essence => "essence",
            RuleCategory::Integrity => "integrity",
            RuleCategory::Coherence => "coherence",
            RuleCategory::Structure => "structure",
            RuleCategory::Verification => "verification",
        }
    }
}

impl fmt::Display for RuleCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Ontological category of the term being defined.
///
/// Orthogonal to [`RuleCategory`]: it selects which rules apply, not how a
/// rule is grouped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TermCategory {
    Process,
    Type,
    Result,
    Instance,
}

impl TermCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            TermCategory::Process => "process",
            TermCategory::Type => "type",
            TermCategory::Result => "result",
            TermCategory::Instance => "instance",
        }
    }
}

impl fmt::Display for TermCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for TermCategory {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "process" | "proces" => Ok(TermCategory::Process),
            "type" => Ok(TermCategory::Type),
            "result" | "resultaat" => Ok(TermCategory::Result),
            "instance" | "exemplaar" => Ok(TermCategory::Instance),
            other => Err(format!("unknown term category: {}", other)),
        }
    }
}

/// Rule priority, from which violation severity is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
}

/// Which term categories a rule applies to.
///
/// Serialized as `all` or as a single term category name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Applicability {
    #[default]
    All,
    Category(TermCategory),
}

impl Applicability {
    /// Whether the rule applies to definitions of the given term category.
    pub fn applies_to(&self, category: TermCategory) -> bool {
        match self {
            Applicability::All => true,
            Applicability::Category(c) => *c == category,
        }
    }
}

impl TryFrom<String> for Applicability {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        if value.trim().eq_ignore_ascii_case("all") {
            return Ok(Applicability::All);
        }
        value.parse::<TermCategory>().map(Applicability::Category)
    }
}

impl From<Applicability> for String {
    fn from(value: Applicability) -> Self {
        match value {
            Applicability::All => "all".to_string(),
            Applicability::Category(c) => c.as_str().to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleStatus {
    #[default]
    Active,
    Deprecated,
}

/// A declarative check against candidate text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    pub category: RuleCategory,
    pub name: String,
    pub explanation: String,
    #[serde(default)]
    pub test_question: String,
    /// Any match is a violation. Evaluated in order; the first match is reported.
    #[serde(default)]
    pub forbidden_patterns: Vec<String>,
    /// If non-empty, at least one must match or the rule reports a missing element.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required_patterns: Vec<String>,
    #[serde(default)]
    pub good_examples: Vec<String>,
    #[serde(default)]
    pub bad_examples: Vec<String>,
    pub priority: Priority,
    #[serde(default)]
    pub applicability: Applicability,
    #[serde(default)]
    pub status: RuleStatus,
}

impl Rule {
    pub fn is_active(&self) -> bool {
        self.status == RuleStatus::Active
    }

    /// Active and applicable to the given term category.
    pub fn is_applicable(&self, category: TermCategory) -> bool {
        self.is_active() && self.applicability.applies_to(category)
    }

    /// All pattern strings this rule carries, forbidden first.
    pub fn patterns(&self) -> impl Iterator<Item = &String> {
        self.forbidden_patterns.iter().chain(self.required_patterns.iter())
    }

    /// Serialize to the declarative YAML form accepted by the repository.
    pub fn to_yaml(&self) -> crate::Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}
