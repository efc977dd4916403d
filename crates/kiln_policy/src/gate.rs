//! Quality gate evaluation.

use std::path::Path;

use serde::{Deserialize, Serialize};

use kiln_core::QualityResult;

use crate::error::PolicyResult;
use crate::rules::{RuleSet, RuleSeverity, RuleViolation};

/// Result of a gate evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateResult {
    pub gate_id: String,
    pub passed: bool,
    pub score: Option<f64>,
    pub details: Vec<GateDetail>,
    pub violations: Vec<RuleViolation>,
    pub recommendations: Vec<String>,
}

impl GateResult {
    /// Violations that fail the gate.
    pub fn errors(&self) -> impl Iterator<Item = &RuleViolation> {
        self.violations
            .iter()
            .filter(|v| v.severity == RuleSeverity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &RuleViolation> {
        self.violations
            .iter()
            .filter(|v| v.severity == RuleSeverity::Warning)
    }
}

/// Outcome of one rule within the gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateDetail {
    pub check: String,
    pub passed: bool,
    pub message: Option<String>,
}

impl GateDetail {
    pub fn passed(check: impl Into<String>) -> Self {
        Self {
            check: check.into(),
            passed: true,
            message: None,
        }
    }

    pub fn failed(check: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            check: check.into(),
            passed: false,
            message: Some(message.into()),
        }
    }
}

/// Gate evaluator.
pub struct GateEvaluator;

impl GateEvaluator {
    /// Run a rule set over `root` and fold the violations into a gate verdict.
    pub fn evaluate(gate_id: &str, rules: &RuleSet, root: &Path) -> PolicyResult<GateResult> {
        let violations = rules.evaluate(root)?;
        Ok(Self::summarize(gate_id, rules, violations))
    }

    pub fn summarize(gate_id: &str, rules: &RuleSet, violations: Vec<RuleViolation>) -> GateResult {
        let mut details = Vec::new();
        let mut recommendations = Vec::new();

        for rule in rules.rules.iter().filter(|r| r.enabled) {
            let hits: Vec<_> = violations.iter().filter(|v| v.rule_id == rule.id).collect();
            if hits.is_empty() {
                details.push(GateDetail::passed(&rule.id));
                continue;
            }

            details.push(GateDetail::failed(
                &rule.id,
                format!("{} ({} findings)", rule.name, hits.len()),
            ));
            if let Some(hint) = &rule.hint {
                recommendations.push(hint.clone());
            }
        }

        let total = details.len().max(1) as f64;
        let passed_count = details.iter().filter(|d| d.passed).count() as f64;

        GateResult {
            gate_id: gate_id.to_string(),
            passed: !violations.iter().any(|v| v.severity == RuleSeverity::Error),
            score: Some(passed_count / total * 100.0),
            details,
            violations,
            recommendations,
        }
    }
}

impl From<GateResult> for QualityResult {
    fn from(gate: GateResult) -> Self {
        let errors = gate.errors().map(RuleViolation::describe).collect();
        let mut suggestions: Vec<String> = gate.warnings().map(RuleViolation::describe).collect();
        suggestions.extend(gate.recommendations);

        QualityResult {
            is_valid: gate.passed,
            errors,
            suggestions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::PolicyRule;
    use kiln_core::GenerationType;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_gate_passes_clean_output() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("index.html"), "<!doctype html><html></html>").unwrap();

        let rules = RuleSet::for_generation_type(GenerationType::SingleFile);
        let gate = GateEvaluator::evaluate("html", &rules, temp.path()).unwrap();

        assert!(gate.passed);
        assert_eq!(gate.score, Some(100.0));
        assert!(gate.recommendations.is_empty());
    }

    #[test]
    fn test_warnings_do_not_fail_the_gate() {
        let mut rules = RuleSet::new("custom");
        rules.add(
            PolicyRule::non_empty("non-empty", "Files must not be empty")
                .with_severity(RuleSeverity::Warning)
                .with_hint("Fill the file"),
        );
        let violation = RuleViolation {
            rule_id: "non-empty".into(),
            severity: RuleSeverity::Warning,
            message: "file is empty".into(),
            file: Some("a.css".into()),
            line: None,
        };

        let gate = GateEvaluator::summarize("custom", &rules, vec![violation]);
        assert!(gate.passed);
        assert_eq!(gate.score, Some(0.0));

        let quality = QualityResult::from(gate);
        assert!(quality.is_valid);
        assert!(quality.errors.is_empty());
        assert_eq!(quality.suggestions, vec!["a.css: file is empty", "Fill the file"]);
    }

    #[test]
    fn test_errors_become_quality_feedback() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("index.html"), "<p>fragment</p>").unwrap();

        let rules = RuleSet::for_generation_type(GenerationType::SingleFile);
        let quality: QualityResult = GateEvaluator::evaluate("html", &rules, temp.path())
            .unwrap()
            .into();

        assert!(!quality.is_valid);
        assert_eq!(quality.errors, vec!["index.html: HTML document root missing"]);
        assert_eq!(
            quality.suggestions,
            vec!["Start every page with <!DOCTYPE html> and an <html> element"]
        );
    }
}
