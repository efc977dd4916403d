//! # kiln_policy
//!
//! Rule-based quality gate for generated front-end code.
//!
//! This crate provides:
//! - **Rules**: required files, empty files, leftover markdown fences, HTML
//!   document roots, brace balance and hardcoded secrets, filtered by glob
//! - **Gate**: folds rule violations into a verdict with recommendations
//! - **Checker**: the workflow's quality validator
//!
//! ## Example
//!
//! ```rust,ignore
//! use kiln_core::{GenerationType, QualityValidator};
//! use kiln_policy::CodeQualityChecker;
//!
//! let checker = CodeQualityChecker::new();
//! let verdict = checker.validate(GenerationType::MultiFile, &code_dir).await?;
//! if !verdict.is_valid {
//!     for error in &verdict.errors {
//!         println!("{}", error);
//!     }
//! }
//! ```

pub mod checker;
pub mod error;
pub mod gate;
pub mod rules;

pub use checker::CodeQualityChecker;
pub use error::{PolicyError, PolicyResult};
pub use gate::{GateDetail, GateEvaluator, GateResult};
pub use rules::{PolicyRule, RuleSet, RuleSeverity, RuleType, RuleViolation};
