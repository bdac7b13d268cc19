//! The rule engine: YAML-defined checks over the indexed store,
//! evaluated into pass/fail results with per-violation detail. Four
//! rule kinds share one YAML shape: `symbol_match` (the default),
//! `path_match`, `ast_match`, and `dataflow_match`. See DESIGN.md for
//! how the YAML shape and violation wording were reconstructed.

pub mod ast_match;
pub mod dataflow;

use std::collections::HashMap;
use std::path::Path;

use regex::Regex;
use serde::Deserialize;
use tree_sitter::Parser;

use roam_storage::Store;

use crate::parsing::languages::register_builtin_extractors;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

#[derive(Debug, Clone)]
pub struct Violation {
    pub symbol: Option<String>,
    pub file: Option<String>,
    pub line: Option<i64>,
    pub reason: String,
    /// Set for violation families that carry their own sub-type,
    /// e.g. `dataflow_match`'s `source_to_sink` pattern — most
    /// families leave this `None` and rely on `reason` alone.
    pub kind: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RuleResult {
    pub name: String,
    pub severity: Severity,
    pub passed: bool,
    pub violations: Vec<Violation>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    #[default]
    SymbolMatch,
    PathMatch,
    AstMatch,
    DataflowMatch,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Require {
    pub name_regex: Option<String>,
    pub max_params: Option<i64>,
    pub max_symbol_lines: Option<i64>,
    pub max_file_lines: Option<i64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct MatchSpec {
    #[serde(default)]
    pub kind: Vec<String>,
    pub file_glob: Option<String>,
    #[serde(default)]
    pub require: Require,
    pub ast: Option<String>,
    pub language: Option<String>,
    #[serde(default)]
    pub patterns: Vec<String>,
    #[serde(default)]
    pub max_matches: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RuleFile {
    pub name: String,
    pub severity: Severity,
    #[serde(rename = "type", default)]
    pub kind: RuleKind,
    #[serde(rename = "match")]
    pub match_spec: MatchSpec,
    #[serde(default)]
    pub exempt: Vec<String>,
}

/// Either a parsed rule or a file that failed to parse, keyed by its
/// path for a readable error report. A malformed rule file becomes an
/// `Invalid` entry instead of aborting the whole batch, so one bad
/// YAML file doesn't hide every other rule's results.
pub enum LoadedRule {
    Valid(RuleFile),
    Invalid { path: String, error: String },
}

/// Translate a `**`/`*`/`?` glob into an anchored regex over
/// forward-slash-normalized relative paths. No glob crate sits in this
/// workspace's dependency stack, and the pattern language here is
/// small enough that hand-rolling it is simpler than adding one.
fn glob_to_regex(pattern: &str) -> Regex {
    let mut re = String::from("^");
    let chars: Vec<char> = pattern.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' if chars.get(i + 1) == Some(&'*') => {
                re.push_str(".*");
                i += 2;
                if chars.get(i) == Some(&'/') {
                    i += 1;
                }
            }
            '*' => {
                re.push_str("[^/]*");
                i += 1;
            }
            '?' => {
                re.push('.');
                i += 1;
            }
            c => {
                if "\\.+^$()[]{}|".contains(c) {
                    re.push('\\');
                }
                re.push(c);
                i += 1;
            }
        }
    }
    re.push('$');
    Regex::new(&re).unwrap_or_else(|_| Regex::new("$^").unwrap())
}

fn glob_match(pattern: &str, path: &str) -> bool {
    glob_to_regex(pattern).is_match(path)
}

fn is_exempt(exempt: &[String], path: &str) -> bool {
    exempt.iter().any(|g| glob_match(g, path))
}

/// Recursively collect every `.yaml`/`.yml` file under `dir`, parsed
/// in a deterministic (sorted) order.
pub fn load_rules(dir: &Path) -> Vec<LoadedRule> {
    let mut paths = Vec::new();
    collect_yaml_files(dir, &mut paths);
    paths.sort();

    paths
        .into_iter()
        .map(|path| match std::fs::read_to_string(&path) {
            Ok(text) => match serde_yaml::from_str::<RuleFile>(&text) {
                Ok(rule) => LoadedRule::Valid(rule),
                Err(e) => LoadedRule::Invalid { path: path.display().to_string(), error: e.to_string() },
            },
            Err(e) => LoadedRule::Invalid { path: path.display().to_string(), error: e.to_string() },
        })
        .collect()
}

fn collect_yaml_files(dir: &Path, out: &mut Vec<std::path::PathBuf>) {
    let Ok(entries) = std::fs::read_dir(dir) else { return };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_yaml_files(&path, out);
        } else if matches!(path.extension().and_then(|e| e.to_str()), Some("yaml") | Some("yml")) {
            out.push(path);
        }
    }
}

/// Evaluate every rule under `rules_dir` against `store`. `project_root`
/// is needed for the match families that re-read source text directly
/// (`ast_match`, `dataflow_match`) rather than querying already-indexed
/// rows.
pub fn evaluate_all(rules_dir: &Path, store: &Store, project_root: &Path) -> roam_storage::Result<Vec<RuleResult>> {
    load_rules(rules_dir)
        .into_iter()
        .map(|loaded| match loaded {
            LoadedRule::Valid(rule) => evaluate_rule(&rule, store, project_root),
            LoadedRule::Invalid { path, error } => Ok(RuleResult {
                name: path,
                severity: Severity::Error,
                passed: false,
                violations: vec![Violation {
                    symbol: None,
                    file: None,
                    line: None,
                    reason: format!("invalid rule YAML: {error}"),
                    kind: None,
                }],
            }),
        })
        .collect()
}

pub fn evaluate_rule(rule: &RuleFile, store: &Store, project_root: &Path) -> roam_storage::Result<RuleResult> {
    let violations = match rule.kind {
        RuleKind::SymbolMatch => evaluate_symbol_match(rule, store)?,
        RuleKind::PathMatch => evaluate_path_match(rule, store)?,
        RuleKind::AstMatch => evaluate_ast_match(rule, store, project_root)?,
        RuleKind::DataflowMatch => evaluate_dataflow_match(rule, store, project_root)?,
    };
    Ok(RuleResult { name: rule.name.clone(), severity: rule.severity, passed: violations.is_empty(), violations })
}

fn evaluate_symbol_match(rule: &RuleFile, store: &Store) -> roam_storage::Result<Vec<Violation>> {
    let require = &rule.match_spec.require;
    let name_regex = match &require.name_regex {
        Some(pattern) => match Regex::new(pattern) {
            Ok(re) => Some(re),
            Err(e) => {
                return Ok(vec![Violation {
                    symbol: None,
                    file: None,
                    line: None,
                    reason: format!("invalid require.name_regex: {e}"),
                    kind: None,
                }])
            }
        },
        None => None,
    };

    let files: HashMap<_, _> = store.list_files()?.into_iter().map(|f| (f.id, f)).collect();
    let metrics: HashMap<_, _> = store.all_symbol_metrics()?.into_iter().map(|m| (m.symbol_id, m)).collect();

    let mut violations = Vec::new();
    for symbol in store.all_symbols()? {
        let Some(file) = files.get(&symbol.file_id) else { continue };
        if is_exempt(&rule.exempt, &file.path) {
            continue;
        }
        if let Some(glob) = &rule.match_spec.file_glob {
            if !glob_match(glob, &file.path) {
                continue;
            }
        }
        if !rule.match_spec.kind.is_empty() && !rule.match_spec.kind.iter().any(|k| k == &symbol.kind) {
            continue;
        }

        let mut reasons = Vec::new();
        if let Some(re) = &name_regex {
            if !re.is_match(&symbol.name) {
                reasons.push(format!("name '{}' does not match pattern '{}'", symbol.name, re.as_str()));
            }
        }
        let param_count = metrics.get(&symbol.id).map(|m| m.param_count).unwrap_or(0);
        if let Some(max) = require.max_params {
            if param_count > max {
                reasons.push(format!("parameter count {param_count} exceeds max {max}"));
            }
        }
        let symbol_lines = symbol.line_end - symbol.line_start + 1;
        if let Some(max) = require.max_symbol_lines {
            if symbol_lines > max {
                reasons.push(format!("symbol line count {symbol_lines} exceeds max {max}"));
            }
        }
        if let Some(max) = require.max_file_lines {
            if file.line_count > max {
                reasons.push(format!("file line count {} exceeds max {max}", file.line_count));
            }
        }

        if !reasons.is_empty() {
            violations.push(Violation {
                symbol: Some(symbol.name.clone()),
                file: Some(file.path.clone()),
                line: Some(symbol.line_start),
                reason: reasons.join("; "),
                kind: None,
            });
        }
    }
    Ok(violations)
}

/// Files matching `match.file_glob`: a bare pattern with no `require`
/// bans the path outright, a `require.max_file_lines` flags only
/// files over the threshold.
fn evaluate_path_match(rule: &RuleFile, store: &Store) -> roam_storage::Result<Vec<Violation>> {
    let mut violations = Vec::new();
    for file in store.list_files()? {
        if is_exempt(&rule.exempt, &file.path) {
            continue;
        }
        let Some(glob) = &rule.match_spec.file_glob else { continue };
        if !glob_match(glob, &file.path) {
            continue;
        }
        if let Some(max) = rule.match_spec.require.max_file_lines {
            if file.line_count > max {
                violations.push(Violation {
                    symbol: None,
                    file: Some(file.path.clone()),
                    line: None,
                    reason: format!("file line count {} exceeds max {max}", file.line_count),
                    kind: None,
                });
            }
        } else {
            violations.push(Violation {
                symbol: None,
                file: Some(file.path.clone()),
                line: None,
                reason: format!("path matches forbidden pattern '{glob}'"),
                kind: None,
            });
        }
    }
    Ok(violations)
}

fn evaluate_ast_match(rule: &RuleFile, store: &Store, project_root: &Path) -> roam_storage::Result<Vec<Violation>> {
    let Some(pattern) = &rule.match_spec.ast else { return Ok(Vec::new()) };
    let Some(language) = &rule.match_spec.language else { return Ok(Vec::new()) };
    let registry = register_builtin_extractors();
    let Some(extractor) = registry.get(language) else { return Ok(Vec::new()) };
    let compiled = match ast_match::compile_ast_pattern(pattern, extractor.as_ref()) {
        Ok(c) => c,
        Err(e) => {
            return Ok(vec![Violation { symbol: None, file: None, line: None, reason: format!("invalid AST pattern: {e}"), kind: None }])
        }
    };

    let mut violations = Vec::new();
    for file in store.list_files()? {
        if is_exempt(&rule.exempt, &file.path) {
            continue;
        }
        if let Some(glob) = &rule.match_spec.file_glob {
            if !glob_match(glob, &file.path) {
                continue;
            }
        }
        let Ok(source) = std::fs::read_to_string(project_root.join(&file.path)) else { continue };
        let Some(ts_language) = extractor.ts_language() else { continue };
        let mut parser = Parser::new();
        if parser.set_language(&ts_language).is_err() {
            continue;
        }
        let Some(tree) = parser.parse(&source, None) else { continue };
        for m in ast_match::find_ast_matches(&tree, source.as_bytes(), &compiled, rule.match_spec.max_matches) {
            violations.push(Violation {
                symbol: None,
                file: Some(file.path.clone()),
                line: Some(m.line as i64),
                reason: format!("matched AST pattern '{pattern}': {}", m.snippet.trim()),
                kind: Some("ast_match".to_string()),
            });
        }
    }
    Ok(violations)
}

fn evaluate_dataflow_match(rule: &RuleFile, store: &Store, project_root: &Path) -> roam_storage::Result<Vec<Violation>> {
    let mut violations = Vec::new();
    for file in store.list_files()? {
        if is_exempt(&rule.exempt, &file.path) {
            continue;
        }
        if let Some(glob) = &rule.match_spec.file_glob {
            if !glob_match(glob, &file.path) {
                continue;
            }
        }
        let Ok(source) = std::fs::read_to_string(project_root.join(&file.path)) else { continue };
        let found = dataflow::scan(&file.path, &source, &rule.match_spec.patterns, rule.match_spec.max_matches);
        violations.extend(found);
    }
    Ok(violations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use roam_storage::{NewSymbol, Store};

    fn rule_yaml(text: &str) -> RuleFile {
        serde_yaml::from_str(text).unwrap()
    }

    #[test]
    fn type_defaults_to_symbol_match_when_omitted() {
        let rule = rule_yaml("name: \"B\"\nseverity: info\nmatch:\n  kind: [function]\n");
        assert_eq!(rule.kind, RuleKind::SymbolMatch);
    }

    #[test]
    fn load_rules_recurses_subdirectories_in_sorted_order() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("security")).unwrap();
        std::fs::create_dir_all(dir.path().join("style")).unwrap();
        std::fs::write(
            dir.path().join("security/a.yaml"),
            "name: \"A\"\nseverity: warning\ntype: ast_match\nmatch:\n  ast: \"eval($X)\"\n  language: python\n  file_glob: \"**/*.py\"\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("style/b.yml"), "name: \"B\"\nseverity: info\nmatch:\n  kind: [function]\n").unwrap();

        let rules = load_rules(dir.path());
        assert_eq!(rules.len(), 2);
        let names: Vec<String> = rules
            .iter()
            .map(|r| match r {
                LoadedRule::Valid(rule) => rule.name.clone(),
                LoadedRule::Invalid { path, .. } => path.clone(),
            })
            .collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(sorted, vec!["A".to_string(), "B".to_string()]);
    }

    #[test]
    fn symbol_match_reports_every_violated_requirement_in_one_violation() {
        let store = Store::open_in_memory().unwrap();
        let file_id = store.upsert_file("src/app.py", Some("python"), "h1", None, 920).unwrap();
        let symbol_id = store
            .insert_symbol(
                file_id,
                &NewSymbol {
                    name: "BadName".to_string(),
                    qualified_name: "BadName".to_string(),
                    kind: "function".to_string(),
                    signature: None,
                    line_start: 10,
                    line_end: 60,
                    docstring: None,
                    visibility: roam_storage::Visibility::Public,
                    is_exported: true,
                    parent_id: None,
                    default_value: None,
                },
            )
            .unwrap();
        store
            .put_symbol_metrics(&[roam_storage::SymbolMetricsRecord {
                symbol_id,
                cognitive_complexity: 0,
                nesting_depth: 0,
                param_count: 5,
                line_count: 51,
                return_count: 0,
                bool_op_count: 0,
                callback_depth: 0,
            }])
            .unwrap();

        let rule = rule_yaml(
            "name: \"style thresholds\"\nseverity: warning\ntype: symbol_match\nmatch:\n  kind: [function]\n  file_glob: \"src/**\"\n  require:\n    name_regex: \"^[a-z_][a-z0-9_]*$\"\n    max_params: 3\n    max_symbol_lines: 40\n",
        );
        let result = evaluate_rule(&rule, &store, Path::new(".")).unwrap();
        assert!(!result.passed);
        assert_eq!(result.violations.len(), 1);
        let reason = &result.violations[0].reason;
        assert!(reason.contains("does not match"));
        assert!(reason.contains("parameter count"));
        assert!(reason.contains("symbol line count"));
    }

    #[test]
    fn symbol_match_invalid_name_regex_fails_the_whole_rule() {
        let store = Store::open_in_memory().unwrap();
        let rule = rule_yaml(
            "name: \"bad regex\"\nseverity: error\ntype: symbol_match\nmatch:\n  kind: [function]\n  require:\n    name_regex: \"[unterminated\"\n",
        );
        let result = evaluate_rule(&rule, &store, Path::new(".")).unwrap();
        assert!(!result.passed);
        assert!(result.violations[0].reason.contains("invalid require.name_regex"));
    }

    #[test]
    fn glob_matches_double_star_segments() {
        assert!(glob_match("src/**", "src/a/b.py"));
        assert!(glob_match("**/*.py", "a/b/c.py"));
        assert!(!glob_match("**/*.py", "a/b/c.rs"));
    }
}
