//! Validation result types.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::rules::{Priority, RuleCategory, TermCategory};

/// Violation severity, derived from the rule's priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Severity of a forbidden pattern match
    pub fn for_forbidden(priority: Priority) -> Self {
        match priority {
            Priority::High => Severity::Critical,
            Priority::Medium => Severity::High,
            Priority::Low => Severity::Medium,
        }
    }

    /// Severity of a missing required element, one step milder than a match
    pub fn for_missing(priority: Priority) -> Self {
        match priority {
            Priority::High => Severity::High,
            Priority::Medium => Severity::Medium,
            Priority::Low => Severity::Low,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What kind of check produced a violation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    ForbiddenPattern,
    MissingElement,
}

/// Byte range of a match in the candidate text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextSpan {
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationViolation {
    pub rule_id: String,
    pub rule_category: RuleCategory,
    pub kind: ViolationKind,
    pub severity: Severity,
    pub message: String,
    pub suggestion: String,
    pub location: Option<TextSpan>,
}

impl ValidationViolation {
    pub fn is_critical(&self) -> bool {
        self.severity == Severity::Critical
    }
}

/// Outcome of validating one candidate. Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub category: TermCategory,
    pub overall_score: f64,
    pub violations: Vec<ValidationViolation>,
    pub is_acceptable: bool,
    pub passed_rule_ids: BTreeSet<String>,
    /// Per rule category, same weights as the overall score
    pub category_scores: BTreeMap<RuleCategory, f64>,
    /// Rules that could not be evaluated
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped_rule_ids: Vec<String>,
}

impl ValidationResult {
    pub fn critical_count(&self) -> usize {
        self.violations.iter().filter(|v| v.is_critical()).count()
    }

    pub fn has_critical(&self) -> bool {
        self.violations.iter().any(|v| v.is_critical())
    }

    /// Violations ordered most severe first, rule id order within a severity
    pub fn violations_by_severity(&self) -> Vec<&ValidationViolation> {
        let mut sorted: Vec<_> = self.violations.iter().collect();
        sorted.sort_by(|a, b| b.severity.cmp(&a.severity).then_with(|| a.rule_id.cmp(&b.rule_id)));
        sorted
    }

    /// One-line summary for logs and CLI output
    pub fn summary(&self) -> String {
        format!(
            "score {:.2}, {} violation(s) ({} critical), {}",
            self.overall_score,
            self.violations.len(),
            self.critical_count(),
            if self.is_acceptable { "acceptable" } else { "not acceptable" }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn violation(rule_id: &str, severity: Severity) -> ValidationViolation {
        ValidationViolation {
            rule_id: rule_id.to_string(),
            rule_category: RuleCategory::Structure,
            kind: ViolationKind::ForbiddenPattern,
            severity,
            message: format!("{} violated", rule_id),
            suggestion: "fix it".to_string(),
            location: None,
        }
    }

    #[test]
    fn test_severity_from_priority() {
        assert_eq!(Severity::for_forbidden(Priority::High), Severity::Critical);
        assert_eq!(Severity::for_forbidden(Priority::Medium), Severity::High);
        assert_eq!(Severity::for_forbidden(Priority::Low), Severity::Medium);
        assert_eq!(Severity::for_missing(Priority::High), Severity::High);
        assert_eq!(Severity::for_missing(Priority::Low), Severity::Low);
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);
    }

    #[test]
    fn test_violations_by_severity() {
        let result = ValidationResult {
            category: TermCategory::Type,
            overall_score: 0.5,
            violations: vec![
                violation("B", Severity::Low),
                violation("C", Severity::Critical),
                violation("A", Severity::Low),
            ],
            is_acceptable: false,
            passed_rule_ids: BTreeSet::new(),
            category_scores: BTreeMap::new(),
            skipped_rule_ids: vec![],
        };
        let ids: Vec<_> = result.violations_by_severity().iter().map(|v| v.rule_id.as_str()).collect();
        assert_eq!(ids, vec!["C", "A", "B"]);
        assert_eq!(result.critical_count(), 1);
        assert!(result.summary().contains("1 critical"));
    }
}
