//! Feedback builder - turns a validation result and run history into a short,
//! ordered list of instructions for the next generation attempt.
//!
//! Ordering: critical violations first, then grouped concrete suggestions,
//! then general guidance derived from progress signals.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::error::{DefinitorError, Result};
use crate::rules::RuleCategory;
use crate::runner::IterationRecord;
use crate::validation::{ValidationResult, ValidationViolation, ViolationKind};

use super::signals::{ProgressSignal, detect_signals};

/// Coarse type used to summarize non-critical violations
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationType {
    ForbiddenPattern,
    MissingElement,
    Structure,
    Clarity,
}

impl ViolationType {
    pub fn of(violation: &ValidationViolation) -> Self {
        if violation.kind == ViolationKind::MissingElement {
            return ViolationType::MissingElement;
        }
        match violation.rule_category {
            RuleCategory::Structure => ViolationType::Structure,
            RuleCategory::Consistency | RuleCategory::Coherence => ViolationType::Clarity,
            _ => ViolationType::ForbiddenPattern,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ViolationType::ForbiddenPattern => "forbidden wording",
            ViolationType::MissingElement => "missing elements",
            ViolationType::Structure => "structure",
            ViolationType::Clarity => "clarity",
        }
    }

    fn instruction(&self) -> &'static str {
        match self {
            ViolationType::ForbiddenPattern => "Remove disallowed wording",
            ViolationType::MissingElement => "Add the missing elements",
            ViolationType::Structure => "Fix the sentence structure",
            ViolationType::Clarity => "Make the definition clearer and more consistent",
        }
    }
}

impl fmt::Display for ViolationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedbackConfig {
    /// Upper bound on instructions per round
    pub max_items: usize,
    /// Upper bound on individually listed critical violations
    pub max_critical: usize,
    /// Score changes below this count as stagnation
    pub improvement_threshold: f64,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            max_items: 5,
            max_critical: 3,
            improvement_threshold: 0.05,
        }
    }
}

impl FeedbackConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_items == 0 {
            return Err(DefinitorError::InvalidConfig("feedback max_items must be at least 1".to_string()));
        }
        if self.max_critical > self.max_items {
            return Err(DefinitorError::InvalidConfig(format!(
                "feedback max_critical ({}) cannot exceed max_items ({})",
                self.max_critical, self.max_items
            )));
        }
        if !(0.0..=1.0).contains(&self.improvement_threshold) {
            return Err(DefinitorError::InvalidConfig(format!(
                "improvement_threshold must be within [0, 1], got {}",
                self.improvement_threshold
            )));
        }
        Ok(())
    }
}

/// Stateless builder; every call is a pure function of its arguments
#[derive(Debug, Clone, Default)]
pub struct FeedbackBuilder {
    config: FeedbackConfig,
}

impl FeedbackBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: FeedbackConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FeedbackConfig {
        &self.config
    }

    /// Same builder with a different stagnation threshold
    pub fn with_improvement_threshold(mut self, threshold: f64) -> Self {
        self.config.improvement_threshold = threshold;
        self
    }

    /// Build instructions for the attempt after `iteration_number`.
    ///
    /// `history` holds the records of earlier iterations, not the current one.
    pub fn build(&self, result: &ValidationResult, iteration_number: u32, history: &[IterationRecord]) -> Vec<String> {
        let ordered = result.violations_by_severity();

        let mut concrete: Vec<String> = ordered
            .iter()
            .filter(|v| v.is_critical())
            .take(self.config.max_critical)
            .map(|v| format!("CRITICAL [{}] {} Fix: {}", v.rule_id, v.message, v.suggestion))
            .collect();
        let listed = concrete.len();

        let mut surfaced = 0;
        let remaining: Vec<&ValidationViolation> = ordered
            .into_iter()
            .filter(|v| {
                if v.is_critical() && surfaced < listed {
                    surfaced += 1;
                    false
                } else {
                    true
                }
            })
            .collect();
        concrete.extend(summarize_groups(&remaining));

        let signals = detect_signals(result.overall_score, history, self.config.improvement_threshold);
        let guidance = self.guidance(&signals, result, history);

        let max = self.config.max_items;
        if !guidance.is_empty() {
            // Keep a slot for steering guidance, but never at the expense of a listed critical
            concrete.truncate(max.saturating_sub(1).max(listed));
        }
        let mut items = concrete;
        for g in guidance {
            if items.len() >= max {
                break;
            }
            items.push(g);
        }
        items.truncate(max);

        log::debug!(
            "Built {} feedback item(s) after iteration {} ({} violation(s), signals: {:?})",
            items.len(),
            iteration_number,
            result.violations.len(),
            signals
        );
        items
    }

    fn guidance(&self, signals: &[ProgressSignal], result: &ValidationResult, history: &[IterationRecord]) -> Vec<String> {
        let mut guidance = Vec::new();

        for signal in signals {
            if let ProgressSignal::Stagnation { streak, .. } = signal {
                guidance.push(format!(
                    "The score has barely changed for {} iteration(s) (less than {:.2}). \
                     Do not make minor edits: write a fundamentally different formulation.",
                    streak, self.config.improvement_threshold
                ));
            }
        }

        for signal in signals {
            match signal {
                ProgressSignal::Regression { previous, current } => guidance.push(format!(
                    "The score did not improve ({:.2} -> {:.2}). \
                     Go back to the approach of the previous, better-scoring attempt.",
                    previous, current
                )),
                ProgressSignal::Improvement { previous, current } => {
                    guidance.push(reinforcement(*previous, *current, result, history))
                }
                ProgressSignal::Stagnation { .. } => {}
            }
        }

        guidance
    }
}

/// One summary line per violation type, most severe group first
fn summarize_groups(violations: &[&ValidationViolation]) -> Vec<String> {
    let mut groups: Vec<(ViolationType, Vec<&ValidationViolation>)> = Vec::new();
    for v in violations {
        let vtype = ViolationType::of(v);
        match groups.iter_mut().find(|(t, _)| *t == vtype) {
            Some((_, members)) => members.push(v),
            None => groups.push((vtype, vec![v])),
        }
    }
    // Input is already severity-ordered, so each group's first member is its most severe
    groups.sort_by(|(ta, a), (tb, b)| b[0].severity.cmp(&a[0].severity).then_with(|| ta.cmp(tb)));

    groups
        .into_iter()
        .map(|(vtype, members)| {
            let ids: Vec<&str> = members.iter().map(|v| v.rule_id.as_str()).collect();
            format!(
                "{} ({} issue(s): {}). {}",
                vtype.instruction(),
                members.len(),
                ids.join(", "),
                members[0].suggestion
            )
        })
        .collect()
}

/// Name the violation types the previous attempt had and the current one no longer has
fn reinforcement(previous: f64, current: f64, result: &ValidationResult, history: &[IterationRecord]) -> String {
    let before: BTreeSet<ViolationType> = history
        .iter()
        .rev()
        .find_map(|r| r.validation_result.as_ref())
        .map(|r| r.violations.iter().map(ViolationType::of).collect())
        .unwrap_or_default();
    let now: BTreeSet<ViolationType> = result.violations.iter().map(ViolationType::of).collect();
    let resolved: Vec<&str> = before.difference(&now).map(|t| t.as_str()).collect();

    if resolved.is_empty() {
        format!(
            "The score improved ({:.2} -> {:.2}). Keep the changes that led to this improvement.",
            previous, current
        )
    } else {
        format!(
            "The score improved ({:.2} -> {:.2}). Preserve what now works: no more {} issues.",
            previous,
            current,
            resolved.join(", ")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::TermCategory;
    use crate::validation::Severity;
    use std::collections::BTreeMap;

    fn violation(id: &str, category: RuleCategory, kind: ViolationKind, severity: Severity) -> ValidationViolation {
        ValidationViolation {
            rule_id: id.to_string(),
            rule_category: category,
            kind,
            severity,
            message: format!("{} message.", id),
            suggestion: format!("{} suggestion", id),
            location: None,
        }
    }

    fn critical(id: &str) -> ValidationViolation {
        violation(id, RuleCategory::Essence, ViolationKind::ForbiddenPattern, Severity::Critical)
    }

    fn result(score: f64, violations: Vec<ValidationViolation>) -> ValidationResult {
        ValidationResult {
            category: TermCategory::Process,
            overall_score: score,
            is_acceptable: false,
            violations,
            passed_rule_ids: BTreeSet::new(),
            category_scores: BTreeMap::new(),
            skipped_rule_ids: vec![],
        }
    }

    fn record(n: u32, r: ValidationResult) -> IterationRecord {
        IterationRecord::validated(n, "text", r, vec![], 1, BTreeMap::new())
    }

    #[test]
    fn test_violation_type_mapping() {
        let missing = violation("A", RuleCategory::Structure, ViolationKind::MissingElement, Severity::Low);
        assert_eq!(ViolationType::of(&missing), ViolationType::MissingElement);
        let structure = violation("B", RuleCategory::Structure, ViolationKind::ForbiddenPattern, Severity::Low);
        assert_eq!(ViolationType::of(&structure), ViolationType::Structure);
        let clarity = violation("C", RuleCategory::Coherence, ViolationKind::ForbiddenPattern, Severity::Low);
        assert_eq!(ViolationType::of(&clarity), ViolationType::Clarity);
        let forbidden = violation("D", RuleCategory::Demarcation, ViolationKind::ForbiddenPattern, Severity::Low);
        assert_eq!(ViolationType::of(&forbidden), ViolationType::ForbiddenPattern);
    }

    #[test]
    fn test_critical_first_and_capped() {
        let r = result(0.0, vec![critical("C1"), critical("C2"), critical("C3"), critical("C4")]);
        let items = FeedbackBuilder::new().build(&r, 1, &[]);

        assert!(items[0].starts_with("CRITICAL [C1]"));
        assert!(items[1].starts_with("CRITICAL [C2]"));
        assert!(items[2].starts_with("CRITICAL [C3]"));
        assert!(items[0].contains("C1 suggestion"));
        assert_eq!(items.iter().filter(|i| i.starts_with("CRITICAL")).count(), 3);
        // The fourth critical is summarized, not listed
        assert!(items[3].contains("C4"));
        assert!(!items[3].starts_with("CRITICAL"));
    }

    #[test]
    fn test_non_critical_grouped() {
        let r = result(
            0.8,
            vec![
                violation("V1", RuleCategory::Verification, ViolationKind::ForbiddenPattern, Severity::Medium),
                violation("V2", RuleCategory::Integrity, ViolationKind::ForbiddenPattern, Severity::Medium),
                violation("S1", RuleCategory::Structure, ViolationKind::ForbiddenPattern, Severity::High),
            ],
        );
        let items = FeedbackBuilder::new().build(&r, 1, &[]);
        assert_eq!(items.len(), 2);
        assert!(items[0].starts_with("Fix the sentence structure (1 issue(s): S1)"));
        assert!(items[1].starts_with("Remove disallowed wording (2 issue(s): V1, V2)"));
    }

    #[test]
    fn test_no_violations_no_history_is_empty() {
        let items = FeedbackBuilder::new().build(&result(0.7, vec![]), 1, &[]);
        assert!(items.is_empty());
    }

    #[test]
    fn test_stagnation_instruction() {
        let v = || violation("V1", RuleCategory::Integrity, ViolationKind::ForbiddenPattern, Severity::Medium);
        let history = vec![record(1, result(0.5, vec![v()]))];
        let items = FeedbackBuilder::new().build(&result(0.5, vec![v()]), 2, &history);

        assert!(items.iter().any(|i| i.contains("fundamentally different formulation")));
        assert!(items.iter().any(|i| i.contains("previous, better-scoring attempt")));
    }

    #[test]
    fn test_regression_instruction() {
        let history = vec![record(1, result(0.75, vec![]))];
        let items = FeedbackBuilder::new().build(&result(0.5, vec![critical("C1")]), 2, &history);
        assert!(items[0].starts_with("CRITICAL"));
        assert!(items.iter().any(|i| i.contains("0.75 -> 0.50")));
        assert!(!items.iter().any(|i| i.contains("fundamentally different")));
    }

    #[test]
    fn test_positive_reinforcement_names_resolved_types() {
        let history = vec![record(
            1,
            result(
                0.55,
                vec![
                    violation("S1", RuleCategory::Structure, ViolationKind::ForbiddenPattern, Severity::Critical),
                    violation("V1", RuleCategory::Integrity, ViolationKind::ForbiddenPattern, Severity::Medium),
                ],
            ),
        )];
        let current = result(
            0.85,
            vec![violation("V1", RuleCategory::Integrity, ViolationKind::ForbiddenPattern, Severity::Medium)],
        );
        let items = FeedbackBuilder::new().build(&current, 2, &history);
        let last = items.last().unwrap();
        assert!(last.contains("improved (0.55 -> 0.85)"));
        assert!(last.contains("no more structure issues"));
    }

    #[test]
    fn test_truncated_to_five_with_guidance_kept() {
        let violations = vec![
            critical("C1"),
            critical("C2"),
            critical("C3"),
            violation("S1", RuleCategory::Structure, ViolationKind::ForbiddenPattern, Severity::High),
            violation("K1", RuleCategory::Coherence, ViolationKind::ForbiddenPattern, Severity::Medium),
            violation("M1", RuleCategory::Essence, ViolationKind::MissingElement, Severity::Low),
        ];
        let history = vec![record(1, result(0.0, violations.clone()))];
        let items = FeedbackBuilder::new().build(&result(0.0, violations), 2, &history);

        assert_eq!(items.len(), 5);
        assert!(items[..3].iter().all(|i| i.starts_with("CRITICAL")));
        assert!(items[4].contains("fundamentally different formulation"));
    }

    #[test]
    fn test_custom_limits() {
        let config = FeedbackConfig {
            max_items: 2,
            max_critical: 1,
            improvement_threshold: 0.05,
        };
        let r = result(0.4, vec![critical("C1"), critical("C2")]);
        let items = FeedbackBuilder::with_config(config).build(&r, 1, &[]);
        assert_eq!(items.len(), 2);
        assert!(items[0].starts_with("CRITICAL [C1]"));
        assert!(items[1].contains("C2"));
    }

    #[test]
    fn test_config_validation() {
        assert!(FeedbackConfig::default().validate().is_ok());
        let bad = FeedbackConfig {
            max_items: 0,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
        let too_many_critical = FeedbackConfig {
            max_items: 3,
            max_critical: 4,
            ..Default::default()
        };
        assert!(too_many_critical.validate().is_err());
    }

    #[test]
    fn test_listed_criticals_survive_guidance_slot() {
        let config = FeedbackConfig {
            max_items: 3,
            max_critical: 3,
            improvement_threshold: 0.05,
        };
        assert!(config.validate().is_ok());

        let violations = vec![critical("C1"), critical("C2"), critical("C3")];
        let history = vec![record(1, result(0.0, violations.clone()))];
        let items = FeedbackBuilder::with_config(config).build(&result(0.0, violations), 2, &history);

        assert_eq!(items.len(), 3);
        assert!(items[0].starts_with("CRITICAL [C1]"));
        assert!(items[1].starts_with("CRITICAL [C2]"));
        assert!(items[2].starts_with("CRITICAL [C3]"));
    }
}
