//! Rule repository - loads declarative rule files into an immutable list.
//!
//! A repository is built once and never mutated. Changing rules means
//! loading a new repository, so concurrent readers need no locking.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;
use sha2::{Digest, Sha256};

use crate::error::{DefinitorError, Result};

use super::types::{Rule, RuleCategory, TermCategory};

/// File extensions picked up when loading a directory
const RULE_EXTENSIONS: &[&str] = &["yaml", "yml", "json"];

/// Immutable, validated collection of rules sorted by id
#[derive(Debug, Clone)]
pub struct RuleRepository {
    rules: Vec<Rule>,
    source: String,
}

impl RuleRepository {
    /// Load rules from a directory of rule files or from a single file.
    ///
    /// Fails fast on the first malformed, unparseable, or duplicate rule.
    pub fn load(source: impl AsRef<Path>) -> Result<Self> {
        let source = source.as_ref();
        let files = if source.is_dir() {
            discover_rule_files(source)?
        } else if source.is_file() {
            vec![source.to_path_buf()]
        } else {
            return Err(DefinitorError::config(
                source.display().to_string(),
                "rule source does not exist",
            ));
        };

        let mut rules = Vec::new();
        for file in &files {
            let parsed = parse_rule_file(file)?;
            log::debug!("Parsed {} rule(s) from {}", parsed.len(), file.display());
            rules.extend(parsed);
        }

        let repo = Self::build(rules, source.display().to_string())?;
        log::info!(
            "Loaded {} rules from {} file(s) in {}",
            repo.len(),
            files.len(),
            source.display()
        );
        Ok(repo)
    }

    /// Build a repository from rules already in memory
    pub fn from_rules(rules: Vec<Rule>) -> Result<Self> {
        Self::build(rules, "<memory>".to_string())
    }

    /// Parse a YAML document holding one rule or a list of rules
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let rules = parse_yaml_rules(content, "<yaml>")?;
        Self::build(rules, "<yaml>".to_string())
    }

    fn build(mut rules: Vec<Rule>, source: String) -> Result<Self> {
        let mut seen = HashSet::new();
        for rule in &rules {
            check_rule(rule, &source)?;
            if !seen.insert(rule.id.clone()) {
                return Err(DefinitorError::config(
                    &source,
                    format!("duplicate rule id {}", rule.id),
                ));
            }
        }
        rules.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(Self { rules, source })
    }

    /// All rules, sorted by id
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn get(&self, id: &str) -> Option<&Rule> {
        self.rules
            .binary_search_by(|r| r.id.as_str().cmp(id))
            .ok()
            .map(|idx| &self.rules[idx])
    }

    /// Active rules that apply to the given term category, in id order
    pub fn applicable(&self, category: TermCategory) -> impl Iterator<Item = &Rule> {
        self.rules.iter().filter(move |r| r.is_applicable(category))
    }

    pub fn count_by_category(&self) -> BTreeMap<RuleCategory, usize> {
        let mut counts = BTreeMap::new();
        for rule in &self.rules {
            *counts.entry(rule.category).or_insert(0) += 1;
        }
        counts
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Where the rules were loaded from
    pub fn source(&self) -> &str {
        &self.source
    }

    /// SHA-256 over the canonical JSON form of the rule list
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for rule in &self.rules {
            // Rule serialization cannot fail: plain strings and unit enums only
            if let Ok(bytes) = serde_json::to_vec(rule) {
                hasher.update(&bytes);
            }
            hasher.update(b"\n");
        }
        hex::encode(hasher.finalize())
    }
}

/// Sorted list of rule files directly inside `dir`
fn discover_rule_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let base = glob::Pattern::escape(&dir.to_string_lossy());
    let mut files = Vec::new();

    for ext in RULE_EXTENSIONS {
        let pattern = format!("{}/*.{}", base, ext);
        let entries = glob::glob(&pattern)
            .map_err(|e| DefinitorError::config(dir.display().to_string(), e.to_string()))?;
        for entry in entries {
            let path = entry
                .map_err(|e| DefinitorError::config(dir.display().to_string(), e.to_string()))?;
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}

fn parse_rule_file(path: &Path) -> Result<Vec<Rule>> {
    let name = path.display().to_string();
    let content = fs::read_to_string(path).map_err(|e| DefinitorError::config(&name, e.to_string()))?;

    if path.extension().is_some_and(|ext| ext == "json") {
        let value: serde_json::Value = serde_json::from_str(&content)
            .map_err(|e| DefinitorError::config(&name, e.to_string()))?;
        let rules = if value.is_array() {
            serde_json::from_value(value)
        } else {
            serde_json::from_value(value).map(|rule| vec![rule])
        };
        return rules.map_err(|e| DefinitorError::config(&name, e.to_string()));
    }

    parse_yaml_rules(&content, &name)
}

fn parse_yaml_rules(content: &str, name: &str) -> Result<Vec<Rule>> {
    let value: serde_yaml::Value =
        serde_yaml::from_str(content).map_err(|e| DefinitorError::config(name, e.to_string()))?;
    let rules = if value.is_sequence() {
        serde_yaml::from_value(value)
    } else {
        serde_yaml::from_value(value).map(|rule| vec![rule])
    };
    rules.map_err(|e| DefinitorError::config(name, e.to_string()))
}

/// Required-field and pattern checks for one rule
fn check_rule(rule: &Rule, source: &str) -> Result<()> {
    let label = if rule.id.trim().is_empty() { "<no id>" } else { rule.id.as_str() };

    for (field, value) in [
        ("id", &rule.id),
        ("name", &rule.name),
        ("explanation", &rule.explanation),
    ] {
        if value.trim().is_empty() {
            return Err(DefinitorError::config(
                source,
                format!("rule {} is missing required field '{}'", label, field),
            ));
        }
    }

    if rule.forbidden_patterns.is_empty() && rule.required_patterns.is_empty() {
        return Err(DefinitorError::config(
            source,
            format!("rule {} has no patterns", label),
        ));
    }

    for pattern in rule.patterns() {
        if pattern.trim().is_empty() {
            return Err(DefinitorError::config(
                source,
                format!("rule {} has a blank pattern", label),
            ));
        }
        Regex::new(pattern).map_err(|e| {
            DefinitorError::config(
                source,
                format!("rule {} has unparseable pattern '{}': {}", label, pattern, e),
            )
        })?;
    }

    Ok(())
}
