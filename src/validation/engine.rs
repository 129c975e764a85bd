//! Validation engine - scores candidate text against the rule set.
//!
//! Validation is a pure function of (text, term category, rule set) and is
//! safe to call from many runs at once. A rule that cannot be evaluated is
//! skipped and logged; it never aborts validation of the candidate.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::error::{DefinitorError, Result};
use crate::rules::{Rule, RuleCategory, RuleRepository, TermCategory};

use super::types::{Severity, TextSpan, ValidationResult, ValidationViolation, ViolationKind};

/// Default compiled-regex size limit per pattern (bytes)
const DEFAULT_REGEX_SIZE_LIMIT: usize = 1 << 20;

/// Score weights and acceptance settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub critical_weight: f64,
    pub high_weight: f64,
    pub medium_weight: f64,
    pub low_weight: f64,
    /// Used by [`ValidationEngine::validate`] when no threshold is passed in
    pub acceptance_threshold: f64,
    pub case_insensitive: bool,
    pub regex_size_limit: usize,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            critical_weight: 0.30,
            high_weight: 0.15,
            medium_weight: 0.05,
            low_weight: 0.02,
            acceptance_threshold: 0.8,
            case_insensitive: true,
            regex_size_limit: DEFAULT_REGEX_SIZE_LIMIT,
        }
    }
}

impl ScoringConfig {
    pub fn weight(&self, severity: Severity) -> f64 {
        match severity {
            Severity::Critical => self.critical_weight,
            Severity::High => self.high_weight,
            Severity::Medium => self.medium_weight,
            Severity::Low => self.low_weight,
        }
    }

    pub fn validate(&self) -> Result<()> {
        for (name, w) in [
            ("critical_weight", self.critical_weight),
            ("high_weight", self.high_weight),
            ("medium_weight", self.medium_weight),
            ("low_weight", self.low_weight),
        ] {
            if !(0.0..=1.0).contains(&w) {
                return Err(DefinitorError::InvalidConfig(format!(
                    "{} must be within [0, 1], got {}",
                    name, w
                )));
            }
        }
        if !(0.0..=1.0).contains(&self.acceptance_threshold) {
            return Err(DefinitorError::InvalidConfig(format!(
                "acceptance_threshold must be within [0, 1], got {}",
                self.acceptance_threshold
            )));
        }
        Ok(())
    }
}

/// Anything that can judge a candidate. The orchestrator validates through this.
pub trait CandidateValidator: Send + Sync {
    fn validate(&self, text: &str, category: TermCategory, acceptance_threshold: f64) -> ValidationResult;

    /// Identifier of the rule set behind this validator, if any
    fn fingerprint(&self) -> Option<String> {
        None
    }

    fn description(&self) -> &str {
        "validator"
    }
}

/// Patterns of one rule, compiled with the engine's settings
#[derive(Debug)]
struct CompiledRule {
    forbidden: Vec<Regex>,
    required: Vec<Regex>,
}

/// Rule-based validation engine over an immutable repository
#[derive(Debug)]
pub struct ValidationEngine {
    repository: Arc<RuleRepository>,
    /// Aligned index-for-index with `repository.rules()`
    compiled: Vec<std::result::Result<CompiledRule, DefinitorError>>,
    scoring: ScoringConfig,
    fingerprint: String,
}

impl ValidationEngine {
    /// Create an engine with default scoring
    pub fn new(repository: Arc<RuleRepository>) -> Self {
        Self::build(repository, ScoringConfig::default())
    }

    /// Create an engine with custom scoring, rejecting out-of-range settings
    pub fn with_scoring(repository: Arc<RuleRepository>, scoring: ScoringConfig) -> Result<Self> {
        scoring.validate()?;
        Ok(Self::build(repository, scoring))
    }

    fn build(repository: Arc<RuleRepository>, scoring: ScoringConfig) -> Self {
        let compiled = repository
            .rules()
            .iter()
            .map(|rule| compile_rule(rule, &scoring))
            .collect();
        let fingerprint = repository.fingerprint();
        Self {
            repository,
            compiled,
            scoring,
            fingerprint,
        }
    }

    pub fn repository(&self) -> &RuleRepository {
        &self.repository
    }

    pub fn scoring(&self) -> &ScoringConfig {
        &self.scoring
    }

    /// Ids of rules whose patterns failed to compile for this engine
    pub fn unevaluable_rules(&self) -> Vec<&str> {
        self.repository
            .rules()
            .iter()
            .zip(&self.compiled)
            .filter(|(_, c)| c.is_err())
            .map(|(r, _)| r.id.as_str())
            .collect()
    }

    /// Validate using the engine's configured acceptance threshold
    pub fn validate(&self, text: &str, category: TermCategory) -> ValidationResult {
        self.validate_with_threshold(text, category, self.scoring.acceptance_threshold)
    }

    /// Validate `text` for a term of `category`.
    ///
    /// Leading and trailing whitespace is ignored; match spans are relative
    /// to the trimmed text.
    pub fn validate_with_threshold(
        &self,
        text: &str,
        category: TermCategory,
        acceptance_threshold: f64,
    ) -> ValidationResult {
        let text = text.trim();
        let mut violations = Vec::new();
        let mut passed_rule_ids = BTreeSet::new();
        let mut skipped_rule_ids = Vec::new();
        let mut deductions: BTreeMap<RuleCategory, f64> = BTreeMap::new();

        for (rule, compiled) in self.repository.rules().iter().zip(&self.compiled) {
            if !rule.is_applicable(category) {
                continue;
            }

            let compiled = match compiled {
                Ok(c) => c,
                Err(e) => {
                    log::warn!("Skipping rule: {}", e);
                    skipped_rule_ids.push(rule.id.clone());
                    continue;
                }
            };

            let found = evaluate_rule(rule, compiled, text);
            let category_deduction = deductions.entry(rule.category).or_insert(0.0);
            if found.is_empty() {
                passed_rule_ids.insert(rule.id.clone());
            }
            for violation in found {
                *category_deduction += self.scoring.weight(violation.severity);
                violations.push(violation);
            }
        }

        let total: f64 = violations.iter().map(|v| self.scoring.weight(v.severity)).sum();
        let overall_score = clamp_score(1.0 - total);
        let category_scores = deductions
            .into_iter()
            .map(|(cat, d)| (cat, clamp_score(1.0 - d)))
            .collect();

        let has_critical = violations.iter().any(|v| v.is_critical());
        let is_acceptable = overall_score >= acceptance_threshold && !has_critical;

        log::debug!(
            "Validated {} chars for {}: score {:.3}, {} violation(s), acceptable={}",
            text.len(),
            category,
            overall_score,
            violations.len(),
            is_acceptable
        );

        ValidationResult {
            category,
            overall_score,
            violations,
            is_acceptable,
            passed_rule_ids,
            category_scores,
            skipped_rule_ids,
        }
    }
}

impl CandidateValidator for ValidationEngine {
    fn validate(&self, text: &str, category: TermCategory, acceptance_threshold: f64) -> ValidationResult {
        self.validate_with_threshold(text, category, acceptance_threshold)
    }

    fn fingerprint(&self) -> Option<String> {
        Some(self.fingerprint.clone())
    }

    fn description(&self) -> &str {
        "rule engine"
    }
}

fn compile_rule(rule: &Rule, scoring: &ScoringConfig) -> std::result::Result<CompiledRule, DefinitorError> {
    let compile = |pattern: &String| {
        RegexBuilder::new(pattern)
            .case_insensitive(scoring.case_insensitive)
            .size_limit(scoring.regex_size_limit)
            .build()
            .map_err(|e| DefinitorError::RuleEvaluation {
                rule_id: rule.id.clone(),
                message: format!("pattern '{}' failed to compile: {}", pattern, e),
            })
    };

    Ok(CompiledRule {
        forbidden: rule.forbidden_patterns.iter().map(compile).collect::<std::result::Result<_, _>>()?,
        required: rule.required_patterns.iter().map(compile).collect::<std::result::Result<_, _>>()?,
    })
}

/// At most one violation per check kind: the first forbidden match, and a
/// missing-element violation when no required pattern matches.
fn evaluate_rule(rule: &Rule, compiled: &CompiledRule, text: &str) -> Vec<ValidationViolation> {
    let mut found = Vec::new();

    if let Some(m) = compiled.forbidden.iter().find_map(|re| re.find(text)) {
        found.push(ValidationViolation {
            rule_id: rule.id.clone(),
            rule_category: rule.category,
            kind: ViolationKind::ForbiddenPattern,
            severity: Severity::for_forbidden(rule.priority),
            message: format!("{}: found \"{}\". {}", rule.name, m.as_str(), rule.explanation),
            suggestion: suggestion_for(rule),
            location: Some(TextSpan {
                start: m.start(),
                end: m.end(),
            }),
        });
    }

    if !compiled.required.is_empty() && !compiled.required.iter().any(|re| re.is_match(text)) {
        found.push(ValidationViolation {
            rule_id: rule.id.clone(),
            rule_category: rule.category,
            kind: ViolationKind::MissingElement,
            severity: Severity::for_missing(rule.priority),
            message: format!("{}: required element missing. {}", rule.name, rule.explanation),
            suggestion: suggestion_for(rule),
            location: None,
        });
    }

    found
}

fn suggestion_for(rule: &Rule) -> String {
    let mut suggestion = if rule.test_question.trim().is_empty() {
        format!("Revise the definition to satisfy '{}'", rule.name)
    } else {
        format!("Revise the definition so it passes: {}", rule.test_question.trim())
    };
    if let Some(example) = rule.good_examples.first() {
        suggestion.push_str(&format!(" (example: \"{}\")", example));
    }
    suggestion
}

/// Floor at 0, cap at 1, round to 6 decimals so repeated sums compare exactly
fn clamp_score(score: f64) -> f64 {
    (score.clamp(0.0, 1.0) * 1_000_000.0).round() / 1_000_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{Applicability, Priority, RuleStatus};

    fn rule(id: &str, category: RuleCategory, priority: Priority, forbidden: &[&str]) -> Rule {
        Rule {
            id: id.to_string(),
            category,
            name: format!("rule {}", id),
            explanation: "explanation".to_string(),
            test_question: String::new(),
            forbidden_patterns: forbidden.iter().map(|p| p.to_string()).collect(),
            required_patterns: vec![],
            good_examples: vec![],
            bad_examples: vec![],
            priority,
            applicability: Applicability::All,
            status: RuleStatus::Active,
        }
    }

    fn leading_verb_rule() -> Rule {
        let mut r = rule(
            "STR-01",
            RuleCategory::Structure,
            Priority::High,
            &[r"^(is|wordt|worden|betreft)\b"],
        );
        r.name = "Start with a noun".to_string();
        r.test_question = "Does the definition start with a noun?".to_string();
        r.good_examples = vec!["beslissing van de rechter die ...".to_string()];
        r
    }

    fn engine(rules: Vec<Rule>) -> ValidationEngine {
        ValidationEngine::new(Arc::new(RuleRepository::from_rules(rules).unwrap()))
    }

    #[test]
    fn test_leading_verb_is_critical() {
        let engine = engine(vec![leading_verb_rule()]);
        let result = engine.validate("wordt toegepast door de rechter", TermCategory::Process);

        assert_eq!(result.violations.len(), 1);
        let v = &result.violations[0];
        assert_eq!(v.rule_id, "STR-01");
        assert_eq!(v.severity, Severity::Critical);
        assert_eq!(v.location, Some(TextSpan { start: 0, end: 5 }));
        assert!(v.suggestion.contains("start with a noun"));
        assert!(v.suggestion.contains("beslissing van de rechter"));
        assert!(result.overall_score <= 0.70);
        assert!(!result.is_acceptable);
    }

    #[test]
    fn test_clean_text_passes() {
        let engine = engine(vec![leading_verb_rule()]);
        let result = engine.validate("beslissing van de rechter over een geschil", TermCategory::Type);

        assert!(result.violations.is_empty());
        assert_eq!(result.overall_score, 1.0);
        assert!(result.is_acceptable);
        assert!(result.passed_rule_ids.contains("STR-01"));
    }

    #[test]
    fn test_case_insensitive_by_default() {
        let engine = engine(vec![leading_verb_rule()]);
        let result = engine.validate("Wordt toegepast", TermCategory::Process);
        assert_eq!(result.violations.len(), 1);
    }

    #[test]
    fn test_score_weights_and_floor() {
        let rules = vec![
            rule("A", RuleCategory::Essence, Priority::High, &["x"]),
            rule("B", RuleCategory::Essence, Priority::High, &["x"]),
            rule("C", RuleCategory::Essence, Priority::High, &["x"]),
            rule("D", RuleCategory::Essence, Priority::High, &["x"]),
        ];
        let result = engine(rules).validate("x", TermCategory::Type);
        assert_eq!(result.violations.len(), 4);
        assert_eq!(result.overall_score, 0.0);
    }

    #[test]
    fn test_non_critical_score_below_threshold() {
        let rules = vec![
            rule("A", RuleCategory::Coherence, Priority::Medium, &["alpha"]),
            rule("B", RuleCategory::Coherence, Priority::Medium, &["beta"]),
            rule("C", RuleCategory::Verification, Priority::Low, &["gamma"]),
        ];
        let result = engine(rules).validate("alpha beta gamma", TermCategory::Type);
        // 1.0 - 0.15 - 0.15 - 0.05
        assert_eq!(result.overall_score, 0.65);
        assert!(!result.has_critical());
        assert!(!result.is_acceptable);
        assert_eq!(result.category_scores.get(&RuleCategory::Coherence), Some(&0.7));
        assert_eq!(result.category_scores.get(&RuleCategory::Verification), Some(&0.95));
    }

    #[test]
    fn test_critical_blocks_acceptance_even_above_threshold() {
        let engine = engine(vec![leading_verb_rule()]);
        let result = engine.validate_with_threshold("is een ding", TermCategory::Type, 0.5);
        assert_eq!(result.overall_score, 0.7);
        assert!(!result.is_acceptable);
    }

    #[test]
    fn test_one_violation_per_rule() {
        let engine = engine(vec![rule("A", RuleCategory::Integrity, Priority::Low, &["foo", "bar"])]);
        let result = engine.validate("foo bar foo", TermCategory::Type);
        assert_eq!(result.violations.len(), 1);
        assert_eq!(result.violations[0].severity, Severity::Medium);
    }

    #[test]
    fn test_required_pattern_missing() {
        let mut r = rule("ESS-02", RuleCategory::Essence, Priority::Medium, &[]);
        r.required_patterns = vec![r"\b(die|dat)\b".to_string()];
        let engine = engine(vec![r]);

        let missing = engine.validate("maatregel", TermCategory::Type);
        assert_eq!(missing.violations.len(), 1);
        assert_eq!(missing.violations[0].kind, ViolationKind::MissingElement);
        assert_eq!(missing.violations[0].severity, Severity::Medium);
        assert!(missing.violations[0].location.is_none());

        let present = engine.validate("maatregel die iets regelt", TermCategory::Type);
        assert!(present.violations.is_empty());
    }

    #[test]
    fn test_applicability_and_deprecation() {
        let mut process_only = rule("P", RuleCategory::Demarcation, Priority::High, &["x"]);
        process_only.applicability = Applicability::Category(TermCategory::Process);
        let mut deprecated = rule("D", RuleCategory::Demarcation, Priority::High, &["x"]);
        deprecated.status = RuleStatus::Deprecated;
        let engine = engine(vec![process_only, deprecated]);

        assert_eq!(engine.validate("x", TermCategory::Process).violations.len(), 1);
        let for_type = engine.validate("x", TermCategory::Type);
        assert!(for_type.violations.is_empty());
        assert!(for_type.passed_rule_ids.is_empty());
    }

    #[test]
    fn test_unevaluable_rule_is_skipped() {
        let repo = RuleRepository::from_rules(vec![
            rule("BIG", RuleCategory::Structure, Priority::High, &["[a-z]{2000}"]),
            leading_verb_rule(),
        ])
        .unwrap();
        let scoring = ScoringConfig {
            regex_size_limit: 8192,
            ..Default::default()
        };
        let engine = ValidationEngine::with_scoring(Arc::new(repo), scoring).unwrap();
        assert_eq!(engine.unevaluable_rules(), vec!["BIG"]);

        let result = engine.validate("wordt gebruikt", TermCategory::Process);
        assert_eq!(result.skipped_rule_ids, vec!["BIG".to_string()]);
        assert_eq!(result.violations.len(), 1);
        assert_eq!(result.violations[0].rule_id, "STR-01");
    }

    #[test]
    fn test_validate_is_deterministic() {
        let rules = vec![
            leading_verb_rule(),
            rule("A", RuleCategory::Coherence, Priority::Medium, &["zie"]),
            rule("B", RuleCategory::Verification, Priority::Low, &["etc"]),
        ];
        let engine = engine(rules);
        let text = "is een maatregel, zie artikel 3 etc";
        let first = engine.validate(text, TermCategory::Result);
        for _ in 0..10 {
            assert_eq!(engine.validate(text, TermCategory::Result), first);
        }
    }

    #[test]
    fn test_scores_always_in_range() {
        let rules: Vec<_> = (0..12)
            .map(|i| rule(&format!("R{:02}", i), RuleCategory::Integrity, Priority::High, &["a"]))
            .collect();
        let engine = engine(rules);
        for text in ["", "a", "bbb", "aaaa"] {
            let score = engine.validate(text, TermCategory::Instance).overall_score;
            assert!((0.0..=1.0).contains(&score), "score {} out of range", score);
        }
    }

    #[test]
    fn test_scoring_config_rejects_bad_threshold() {
        let scoring = ScoringConfig {
            acceptance_threshold: 1.5,
            ..Default::default()
        };
        let repo = Arc::new(RuleRepository::from_rules(vec![leading_verb_rule()]).unwrap());
        assert!(ValidationEngine::with_scoring(repo, scoring).is_err());
    }

    #[test]
    fn test_fingerprint_exposed_through_trait() {
        let engine = engine(vec![leading_verb_rule()]);
        let validator: &dyn CandidateValidator = &engine;
        assert_eq!(validator.fingerprint(), Some(engine.repository().fingerprint()));
        assert_eq!(validator.description(), "rule engine");
    }
}
