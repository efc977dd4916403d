//! Policy rules and rule sets.

use std::path::{Path, PathBuf};

use glob::Pattern;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;
use walkdir::WalkDir;

use kiln_core::GenerationType;

use crate::error::{PolicyError, PolicyResult};

/// Directories produced by tooling rather than by the model.
const SKIPPED_DIRS: [&str; 3] = ["node_modules", "dist", ".git"];

/// Files whose content the gate reads.
const SOURCE_FILES: [&str; 6] = ["**/*.html", "**/*.css", "**/*.js", "**/*.vue", "**/*.ts", "**/*.json"];

/// A policy rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyRule {
    pub id: String,
    pub name: String,
    pub severity: RuleSeverity,
    pub rule_type: RuleType,
    pub pattern: Option<String>,
    pub paths: Vec<String>,
    /// Advice handed back to the model when the rule fails.
    pub hint: Option<String>,
    pub enabled: bool,
}

/// Rule severity levels. Only errors fail the gate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RuleSeverity {
    Error,
    Warning,
}

/// Types of rules.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RuleType {
    /// `pattern` names a file or directory that must exist.
    RequiredFile,
    /// Matching files must contain non-whitespace content.
    NonEmptyFile,
    /// No line of a matching file may match `pattern`.
    ForbiddenPattern,
    /// Every matching file must match `pattern` somewhere.
    RequiredPattern,
    /// Curly braces outside strings and comments must balance.
    BalancedBraces,
}

impl PolicyRule {
    fn base(id: impl Into<String>, name: impl Into<String>, rule_type: RuleType) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            severity: RuleSeverity::Error,
            rule_type,
            pattern: None,
            paths: Vec::new(),
            hint: None,
            enabled: true,
        }
    }

    /// Create a forbidden pattern rule.
    pub fn forbidden_pattern(
        id: impl Into<String>,
        name: impl Into<String>,
        pattern: impl Into<String>,
    ) -> Self {
        Self {
            pattern: Some(pattern.into()),
            ..Self::base(id, name, RuleType::ForbiddenPattern)
        }
    }

    /// Create a rule requiring every matching file to contain `pattern`.
    pub fn required_pattern(
        id: impl Into<String>,
        name: impl Into<String>,
        pattern: impl Into<String>,
    ) -> Self {
        Self {
            pattern: Some(pattern.into()),
            ..Self::base(id, name, RuleType::RequiredPattern)
        }
    }

    /// Create a required file rule.
    pub fn required_file(id: impl Into<String>, name: impl Into<String>, file: impl Into<String>) -> Self {
        Self {
            pattern: Some(file.into()),
            ..Self::base(id, name, RuleType::RequiredFile)
        }
    }

    pub fn non_empty(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self::base(id, name, RuleType::NonEmptyFile)
    }

    pub fn balanced_braces(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self::base(id, name, RuleType::BalancedBraces)
    }

    pub fn with_severity(mut self, severity: RuleSeverity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.paths = paths.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    fn path_filter(&self) -> PolicyResult<Vec<Pattern>> {
        self.paths
            .iter()
            .map(|p| {
                Pattern::new(p).map_err(|e| PolicyError::InvalidPathFilter {
                    pattern: p.clone(),
                    message: e.to_string(),
                })
            })
            .collect()
    }

    fn regex(&self) -> PolicyResult<Option<Regex>> {
        self.pattern
            .as_deref()
            .map(|p| {
                Regex::new(p).map_err(|e| PolicyError::RuleEvaluationFailed {
                    rule: self.id.clone(),
                    message: format!("Invalid regex: {}", e),
                })
            })
            .transpose()
    }
}

/// A rule violation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RuleViolation {
    pub rule_id: String,
    pub severity: RuleSeverity,
    pub message: String,
    pub file: Option<String>,
    pub line: Option<usize>,
}

impl RuleViolation {
    fn new(rule: &PolicyRule, message: impl Into<String>) -> Self {
        Self {
            rule_id: rule.id.clone(),
            severity: rule.severity,
            message: message.into(),
            file: None,
            line: None,
        }
    }

    fn at(mut self, file: &Path, line: Option<usize>) -> Self {
        self.file = Some(file.to_string_lossy().replace('\\', "/"));
        self.line = line;
        self
    }

    /// One-line rendering used as quality feedback.
    pub fn describe(&self) -> String {
        match (&self.file, self.line) {
            (Some(file), Some(line)) => format!("{}:{}: {}", file, line, self.message),
            (Some(file), None) => format!("{}: {}", file, self.message),
            _ => self.message.clone(),
        }
    }
}

/// A generated file loaded for evaluation.
struct SourceFile {
    relative: PathBuf,
    content: String,
}

/// A set of policy rules.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleSet {
    pub name: String,
    pub rules: Vec<PolicyRule>,
}

impl RuleSet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rules: Vec::new(),
        }
    }

    /// The rules applied to output of `generation_type`.
    pub fn for_generation_type(generation_type: GenerationType) -> Self {
        let mut rules = Self::new(format!("{} rules", generation_type.label()));

        match generation_type {
            GenerationType::SingleFile | GenerationType::MultiFile => {
                rules.add(
                    PolicyRule::required_file("require-index", "Entry page required", "index.html")
                        .with_hint("Produce a complete index.html page"),
                );
            }
            GenerationType::MultiStepProject => {
                rules.add(
                    PolicyRule::required_file("require-package", "package.json required", "package.json")
                        .with_hint("Write a package.json with dev and build scripts"),
                );
                rules.add(
                    PolicyRule::required_file("require-src", "Source directory required", "src")
                        .with_hint("Put the application sources under src/"),
                );
                rules.add(
                    PolicyRule::required_file("require-index", "Entry page required", "index.html")
                        .with_severity(RuleSeverity::Warning)
                        .with_hint("Vite projects expect an index.html at the project root"),
                );
            }
        }

        rules.add(
            PolicyRule::non_empty("non-empty", "Files must not be empty")
                .with_paths(SOURCE_FILES)
                .with_hint("Write the full content of every file"),
        );
        rules.add(
            PolicyRule::forbidden_pattern("no-fences", "No markdown fences", r"^\s*```")
                .with_paths(SOURCE_FILES)
                .with_hint("Return raw file content without markdown code fences"),
        );
        rules.add(
            PolicyRule::required_pattern("html-document", "HTML document root", r"(?i)<!doctype|<html")
                .with_paths(["**/*.html"])
                .with_hint("Start every page with <!DOCTYPE html> and an <html> element"),
        );
        rules.add(
            PolicyRule::balanced_braces("css-braces", "Balanced CSS braces")
                .with_paths(["**/*.css"])
                .with_hint("Close every CSS rule block"),
        );
        rules.add(
            PolicyRule::balanced_braces("js-braces", "Balanced JavaScript braces")
                .with_paths(["**/*.js", "**/*.ts"])
                .with_severity(RuleSeverity::Warning)
                .with_hint("Check that every function and block is closed"),
        );
        rules.add(
            PolicyRule::forbidden_pattern(
                "no-secrets",
                "No hardcoded secrets",
                r#"(?i)(password|secret|api[_-]?key|token)\s*[=:]\s*['"][^'"]{8,}['"]"#,
            )
            .with_paths(SOURCE_FILES)
            .with_hint("Read credentials from configuration instead of embedding them"),
        );
        rules.add(
            PolicyRule::forbidden_pattern("no-aws-keys", "No AWS access keys", r"AKIA[0-9A-Z]{16}")
                .with_paths(SOURCE_FILES),
        );

        rules
    }

    /// Add a rule to the set.
    pub fn add(&mut self, rule: PolicyRule) {
        self.rules.push(rule);
    }

    pub fn get(&self, id: &str) -> Option<&PolicyRule> {
        self.rules.iter().find(|r| r.id == id)
    }

    /// Evaluate rules against a generated directory.
    pub fn evaluate(&self, root: &Path) -> PolicyResult<Vec<RuleViolation>> {
        let files = load_sources(root);
        let mut violations = Vec::new();

        for rule in self.rules.iter().filter(|r| r.enabled) {
            let found = match rule.rule_type {
                RuleType::RequiredFile => check_required_file(rule, root),
                RuleType::NonEmptyFile => check_files(rule, &files, |file| {
                    (file.content.trim().is_empty())
                        .then(|| RuleViolation::new(rule, "file is empty").at(&file.relative, None))
                        .into_iter()
                        .collect()
                })?,
                RuleType::ForbiddenPattern => {
                    let Some(regex) = rule.regex()? else { continue };
                    check_files(rule, &files, |file| {
                        file.content
                            .lines()
                            .enumerate()
                            .filter(|(_, line)| regex.is_match(line))
                            .map(|(n, _)| {
                                RuleViolation::new(rule, format!("{} violated", rule.name))
                                    .at(&file.relative, Some(n + 1))
                            })
                            .collect()
                    })?
                }
                RuleType::RequiredPattern => {
                    let Some(regex) = rule.regex()? else { continue };
                    check_files(rule, &files, |file| {
                        (!regex.is_match(&file.content))
                            .then(|| {
                                RuleViolation::new(rule, format!("{} missing", rule.name))
                                    .at(&file.relative, None)
                            })
                            .into_iter()
                            .collect()
                    })?
                }
                RuleType::BalancedBraces => check_files(rule, &files, |file| {
                    match brace_balance(&file.content) {
                        Ok(()) => Vec::new(),
                        Err((line, message)) => {
                            vec![RuleViolation::new(rule, message).at(&file.relative, Some(line))]
                        }
                    }
                })?,
            };

            if !found.is_empty() {
                debug!("Rule {} produced {} violations", rule.id, found.len());
            }
            violations.extend(found);
        }

        Ok(violations)
    }
}

fn load_sources(root: &Path) -> Vec<SourceFile> {
    WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| {
            e.depth() == 0 || !SKIPPED_DIRS.contains(&&*e.file_name().to_string_lossy())
        })
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| {
            let relative = e.path().strip_prefix(root).ok()?.to_path_buf();
            // Binary assets are not the gate's business.
            let content = std::fs::read_to_string(e.path()).ok()?;
            Some(SourceFile { relative, content })
        })
        .collect()
}

fn check_files<F>(rule: &PolicyRule, files: &[SourceFile], check: F) -> PolicyResult<Vec<RuleViolation>>
where
    F: Fn(&SourceFile) -> Vec<RuleViolation>,
{
    let filter = rule.path_filter()?;
    Ok(files
        .iter()
        .filter(|f| filter.is_empty() || filter.iter().any(|p| p.matches_path(&f.relative)))
        .flat_map(|f| check(f))
        .collect())
}

fn check_required_file(rule: &PolicyRule, root: &Path) -> Vec<RuleViolation> {
    match &rule.pattern {
        Some(required) if !root.join(required).exists() => {
            vec![RuleViolation::new(rule, format!("required '{}' not found", required))]
        }
        _ => Vec::new(),
    }
}

/// Check curly braces, skipping string literals and comments. Returns the
/// offending line on failure.
fn brace_balance(content: &str) -> Result<(), (usize, String)> {
    let mut depth: usize = 0;
    let mut line = 1;
    let mut chars = content.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\n' => line += 1,
            '"' | '\'' | '`' => {
                while let Some(s) = chars.next() {
                    match s {
                        '\\' => {
                            chars.next();
                        }
                        '\n' => {
                            line += 1;
                            if c != '`' {
                                break;
                            }
                        }
                        s if s == c => break,
                        _ => {}
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = ' ';
                for s in chars.by_ref() {
                    if s == '\n' {
                        line += 1;
                    }
                    if prev == '*' && s == '/' {
                        break;
                    }
                    prev = s;
                }
            }
            '/' if chars.peek() == Some(&'/') => {
                for s in chars.by_ref() {
                    if s == '\n' {
                        line += 1;
                        break;
                    }
                }
            }
            '{' => depth += 1,
            '}' => {
                if depth == 0 {
                    return Err((line, "unexpected closing brace".to_string()));
                }
                depth -= 1;
            }
            _ => {}
        }
    }

    if depth > 0 {
        return Err((line, format!("{} unclosed braces", depth)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const PAGE: &str = "<!DOCTYPE html>\n<html><body><h1>Hi</h1></body></html>\n";

    fn ids(violations: &[RuleViolation]) -> Vec<&str> {
        violations.iter().map(|v| v.rule_id.as_str()).collect()
    }

    #[test]
    fn test_clean_page_passes() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("index.html"), PAGE).unwrap();
        fs::write(temp.path().join("style.css"), "body { margin: 0; }\n").unwrap();

        let rules = RuleSet::for_generation_type(GenerationType::MultiFile);
        assert!(rules.evaluate(temp.path()).unwrap().is_empty());
    }

    #[test]
    fn test_missing_index_reported() {
        let temp = tempdir().unwrap();

        let rules = RuleSet::for_generation_type(GenerationType::SingleFile);
        let violations = rules.evaluate(temp.path()).unwrap();

        assert_eq!(ids(&violations), vec!["require-index"]);
        assert_eq!(violations[0].severity, RuleSeverity::Error);
    }

    #[test]
    fn test_leftover_fence_located() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("index.html"), format!("```html\n{}```\n", PAGE)).unwrap();

        let rules = RuleSet::for_generation_type(GenerationType::SingleFile);
        let violations = rules.evaluate(temp.path()).unwrap();

        let fences: Vec<_> = violations.iter().filter(|v| v.rule_id == "no-fences").collect();
        assert_eq!(fences.len(), 2);
        assert_eq!(fences[0].describe(), "index.html:1: No markdown fences violated");
    }

    #[test]
    fn test_fragment_is_not_a_document() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("index.html"), "<div>only a fragment</div>").unwrap();

        let rules = RuleSet::for_generation_type(GenerationType::SingleFile);
        assert_eq!(ids(&rules.evaluate(temp.path()).unwrap()), vec!["html-document"]);
    }

    #[test]
    fn test_project_layout_and_skipped_dirs() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("package.json"), "{\"name\": \"app\"}").unwrap();
        fs::create_dir_all(temp.path().join("node_modules/pkg")).unwrap();
        fs::write(temp.path().join("node_modules/pkg/index.js"), "function broken() {").unwrap();

        let rules = RuleSet::for_generation_type(GenerationType::MultiStepProject);
        let violations = rules.evaluate(temp.path()).unwrap();

        assert_eq!(ids(&violations), vec!["require-src", "require-index"]);
        assert_eq!(violations[1].severity, RuleSeverity::Warning);
    }

    #[test]
    fn test_secret_detected() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("index.html"), PAGE).unwrap();
        fs::write(temp.path().join("script.js"), "const apiKey = \"sk-live-1234567890\";\n").unwrap();

        let rules = RuleSet::for_generation_type(GenerationType::MultiFile);
        let violations = rules.evaluate(temp.path()).unwrap();

        assert_eq!(ids(&violations), vec!["no-secrets"]);
        assert_eq!(violations[0].file.as_deref(), Some("script.js"));
        assert_eq!(violations[0].line, Some(1));
    }

    #[test]
    fn test_brace_balance_ignores_strings_and_comments() {
        assert!(brace_balance("a { b: \"}\"; } /* { */ // {\n").is_ok());
        assert!(brace_balance("const t = `${x}`; if (a) { run(); }").is_ok());
        assert_eq!(brace_balance("a {\n b {\n}").unwrap_err().1, "1 unclosed braces");
        assert_eq!(brace_balance("a }\n").unwrap_err().0, 1);
    }

    #[test]
    fn test_invalid_path_filter_is_error() {
        let temp = tempdir().unwrap();
        let mut rules = RuleSet::new("custom");
        rules.add(PolicyRule::non_empty("bad", "Bad filter").with_paths(["[unclosed"]));

        assert!(matches!(
            rules.evaluate(temp.path()),
            Err(PolicyError::InvalidPathFilter { .. })
        ));
    }
}
