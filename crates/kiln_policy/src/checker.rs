//! Quality validator for the workflow's quality_check stage.

use std::path::Path;

use async_trait::async_trait;
use tracing::{debug, info};

use kiln_core::{CoreResult, GenerationType, QualityResult, QualityValidator};

use crate::error::{PolicyError, PolicyResult};
use crate::gate::{GateEvaluator, GateResult};
use crate::rules::RuleSet;

/// Runs the per-type rule set over a generated directory.
#[derive(Debug, Clone, Default)]
pub struct CodeQualityChecker {
    extra_rules: Option<RuleSet>,
}

impl CodeQualityChecker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rules evaluated in addition to the per-type defaults.
    pub fn with_rules(mut self, rules: RuleSet) -> Self {
        self.extra_rules = Some(rules);
        self
    }

    fn rules_for(&self, generation_type: GenerationType) -> RuleSet {
        let mut rules = RuleSet::for_generation_type(generation_type);
        if let Some(extra) = &self.extra_rules {
            rules.rules.extend(extra.rules.iter().cloned());
        }
        rules
    }

    /// Evaluate the gate on a worker thread; rule checks read every file.
    pub async fn check(&self, generation_type: GenerationType, code_dir: &Path) -> PolicyResult<GateResult> {
        let rules = self.rules_for(generation_type);
        let root = code_dir.to_path_buf();
        let gate_id = generation_type.as_str();

        tokio::task::spawn_blocking(move || GateEvaluator::evaluate(gate_id, &rules, &root))
            .await
            .map_err(|e| PolicyError::Task(e.to_string()))?
    }
}

#[async_trait]
impl QualityValidator for CodeQualityChecker {
    async fn validate(&self, generation_type: GenerationType, code_dir: &Path) -> CoreResult<QualityResult> {
        if !code_dir.is_dir() {
            return Ok(QualityResult::invalid(vec![format!(
                "generated code directory {} does not exist",
                code_dir.display()
            )]));
        }

        let gate = self.check(generation_type, code_dir).await?;
        debug!(
            "Gate {} details: {:?}",
            gate.gate_id,
            gate.details.iter().filter(|d| !d.passed).collect::<Vec<_>>()
        );
        info!(
            "Quality gate {} for {}: {} violations",
            if gate.passed { "passed" } else { "failed" },
            code_dir.display(),
            gate.violations.len()
        );
        Ok(gate.into())
    }
}
