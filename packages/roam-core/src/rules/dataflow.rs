//! Dataflow heuristics for `dataflow_match` rules. Each one scans a
//! function body's source lines with regexes rather than walking an
//! AST or building a real def-use graph — cheap enough for large
//! trees and accurate enough for the patterns it targets.

use once_cell::sync::Lazy;
use regex::Regex;

use super::Violation;

static ASSIGN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*([A-Za-z_][A-Za-z0-9_]*)\s*=(?!=)").unwrap());
static DEF_SIGNATURE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:def|fn|function)\s+\w+\s*\(([^)]*)\)").unwrap());
static SOURCE_CALL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:input|request\.args\.get|request\.form\.get|os\.environ\.get)\s*\(").unwrap());
static SINK_CALL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:eval|exec|os\.system|subprocess\.call|subprocess\.run)\s*\(").unwrap());
static WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Za-z_][A-Za-z0-9_]*").unwrap());

/// Every built-in pattern name a `dataflow_match` rule can request.
pub const KNOWN_PATTERNS: &[&str] = &["dead_assignment", "unused_param", "source_to_sink"];

/// Run the requested patterns against one file's source, capped at
/// `max_matches` violations per pattern (`0` means unbounded).
pub fn scan(path: &str, source: &str, patterns: &[String], max_matches: usize) -> Vec<Violation> {
    let mut violations = Vec::new();
    for pattern in patterns {
        let found = match pattern.as_str() {
            "dead_assignment" => dead_assignments(path, source),
            "unused_param" => unused_params(path, source),
            "source_to_sink" => source_to_sink(path, source),
            _ => Vec::new(),
        };
        for v in found {
            if max_matches > 0 && violations.len() >= max_matches {
                break;
            }
            violations.push(v);
        }
    }
    violations
}

fn names_used_after(lines: &[&str], from: usize, name: &str) -> bool {
    lines[from..].iter().any(|line| {
        WORD.find_iter(line).any(|m| m.as_str() == name) && !ASSIGN.captures(line).is_some_and(|c| &c[1] == name)
    })
}

/// A variable assigned once and never read again before the function
/// ends.
fn dead_assignments(path: &str, source: &str) -> Vec<Violation> {
    let lines: Vec<&str> = source.lines().collect();
    let mut out = Vec::new();
    for (i, line) in lines.iter().enumerate() {
        let Some(caps) = ASSIGN.captures(line) else { continue };
        let name = caps[1].to_string();
        if !names_used_after(&lines, i + 1, &name) {
            out.push(Violation {
                symbol: None,
                file: Some(path.to_string()),
                line: Some((i + 1) as i64),
                reason: format!("'{name}' is assigned but never read"),
                kind: Some("dead_assignment".to_string()),
            });
        }
    }
    out
}

/// A declared function parameter that never appears in the body.
/// Matches the `"parameter '{name}' is never read"` fixture.
fn unused_params(path: &str, source: &str) -> Vec<Violation> {
    let mut out = Vec::new();
    for caps in DEF_SIGNATURE.captures_iter(source) {
        let params_text = &caps[1];
        let body_start = caps.get(0).unwrap().end();
        let body = &source[body_start..];
        for raw in params_text.split(',') {
            let name = raw.trim().split(':').next().unwrap_or("").split('=').next().unwrap_or("").trim();
            if name.is_empty() || name == "self" {
                continue;
            }
            if !WORD.find_iter(body).any(|m| m.as_str() == name) {
                let line = source[..body_start].lines().count() as i64;
                out.push(Violation {
                    symbol: None,
                    file: Some(path.to_string()),
                    line: Some(line),
                    reason: format!("parameter '{name}' is never read"),
                    kind: Some("unused_param".to_string()),
                });
            }
        }
    }
    out
}

/// Untrusted input flowing into a sink within the same function,
/// via a local variable bound to a source call. Matches the
/// `input()` -> `eval()` fixture; `type: "source_to_sink"` is the
/// marker the test asserts on rather than a `reason` substring.
fn source_to_sink(path: &str, source: &str) -> Vec<Violation> {
    let lines: Vec<&str> = source.lines().collect();
    let mut tainted = std::collections::HashSet::new();
    let mut out = Vec::new();
    for (i, line) in lines.iter().enumerate() {
        if SOURCE_CALL.is_match(line) {
            if let Some(caps) = ASSIGN.captures(line) {
                tainted.insert(caps[1].to_string());
            }
        }
        if SINK_CALL.is_match(line) {
            let arg_is_tainted = WORD.find_iter(line).any(|m| tainted.contains(m.as_str()));
            if arg_is_tainted {
                out.push(Violation {
                    symbol: None,
                    file: Some(path.to_string()),
                    line: Some((i + 1) as i64),
                    reason: "untrusted input reaches a dangerous sink".to_string(),
                    kind: Some("source_to_sink".to_string()),
                });
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_an_assignment_never_read_again() {
        let source = "def compute(a):\n    temp = a\n    unused = 1\n    return temp\n";
        let violations = scan("src/app.py", source, &["dead_assignment".to_string()], 0);
        assert!(violations.iter().any(|v| v.reason.contains("assigned but never read") && v.reason.contains("unused")));
        assert!(!violations.iter().any(|v| v.reason.contains("'temp'")));
    }

    #[test]
    fn flags_an_unread_parameter() {
        let source = "def greet(name, punctuation):\n    return f'hello {name}'\n";
        let violations = scan("src/app.py", source, &["unused_param".to_string()], 0);
        assert!(violations.iter().any(|v| v.reason.contains("parameter 'punctuation' is never read")));
    }

    #[test]
    fn flags_input_flowing_into_eval() {
        let source = "def run():\n    user = input('value: ')\n    eval(user)\n    return 1\n";
        let violations = scan("src/app.py", source, &["source_to_sink".to_string()], 10);
        assert!(violations.iter().any(|v| v.kind.as_deref() == Some("source_to_sink")));
    }

    #[test]
    fn max_matches_caps_violation_count() {
        let source = "def f():\n    a = 1\n    b = 2\n    c = 3\n";
        let violations = scan("src/app.py", source, &["dead_assignment".to_string()], 2);
        assert_eq!(violations.len(), 2);
    }
}
