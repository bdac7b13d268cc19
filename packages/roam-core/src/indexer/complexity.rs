//! Per-symbol structural metrics computed directly from source text.
//!
//! Rather than walking 15 different tree-sitter grammars' node kinds
//! looking for the same handful of control-flow shapes, this scans
//! the symbol's own source lines with a small set of regexes that
//! already read naturally across every C-like, Python, and Ruby-
//! family language this system extracts. It is an approximation, not
//! a per-language cognitive-complexity analyzer; see DESIGN.md.

use once_cell::sync::Lazy;
use regex::Regex;

use roam_storage::SymbolMetricsRecord;

static CONTROL_FLOW: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(if|else if|elif|elsif|for|foreach|while|case|when|switch|catch|except|rescue)\b").unwrap()
});
static BOOL_OP: Lazy<Regex> = Lazy::new(|| Regex::new(r"&&|\|\||\band\b|\bor\b").unwrap());
static RETURN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\breturn\b|\byield\b").unwrap());
static CALLBACK_OPEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"=>|\blambda\b|\bfunction\s*\(|\bfn\s+\w*\s*\(.*\)\s*\{|\bdo\s*\|").unwrap());

/// Structural metrics for one symbol's body, derived from its source
/// lines and (for `param_count`) its signature text.
pub fn analyze(source: &str, line_start: i64, line_end: i64, signature: Option<&str>) -> SymbolMetricsRecord {
    let lines: Vec<&str> = source.lines().collect();
    let start = (line_start.max(1) - 1) as usize;
    let end = (line_end.max(line_start)).min(lines.len() as i64) as usize;
    let body: Vec<&str> = if start < end { lines[start..end].to_vec() } else { Vec::new() };

    let mut cognitive_complexity = 0i64;
    let mut nesting_depth = 0i64;
    let mut max_nesting = 0i64;
    let mut return_count = 0i64;
    let mut bool_op_count = 0i64;
    let mut callback_depth = 0i64;
    let mut max_callback_depth = 0i64;

    for line in &body {
        let opens = line.matches('{').count() as i64 + count_indent_block_openers(line);
        let closes = line.matches('}').count() as i64;

        let control_hits = CONTROL_FLOW.find_iter(line).count() as i64;
        if control_hits > 0 {
            cognitive_complexity += control_hits * (1 + nesting_depth);
        }
        bool_op_count += BOOL_OP.find_iter(line).count() as i64;
        return_count += RETURN.find_iter(line).count() as i64;

        let callback_hits = CALLBACK_OPEN.find_iter(line).count() as i64;
        if callback_hits > 0 {
            callback_depth += callback_hits;
            max_callback_depth = max_callback_depth.max(callback_depth);
        }

        nesting_depth = (nesting_depth + opens - closes).max(0);
        max_nesting = max_nesting.max(nesting_depth);
    }

    SymbolMetricsRecord {
        symbol_id: 0,
        cognitive_complexity,
        nesting_depth: max_nesting,
        param_count: count_params(signature),
        line_count: (line_end - line_start + 1).max(0),
        return_count,
        bool_op_count,
        callback_depth: max_callback_depth,
    }
}

/// Indentation-based languages (Python, Ruby without braces) open a
/// block with a trailing `:` and no `{` — treated as one more opener
/// so nesting isn't silently zero for those extractors.
fn count_indent_block_openers(line: &str) -> i64 {
    let trimmed = line.trim_end();
    if trimmed.ends_with(':') && CONTROL_FLOW.is_match(trimmed) {
        1
    } else {
        0
    }
}

/// Count comma-separated top-level parameters inside the first
/// balanced `(...)` in `signature`. Angle/square/curly brackets are
/// tracked too so generic types and default-value literals containing
/// commas don't inflate the count.
fn count_params(signature: Option<&str>) -> i64 {
    let Some(sig) = signature else { return 0 };
    let Some(open) = sig.find('(') else { return 0 };
    let mut depth = 0i32;
    let mut params = String::new();
    let mut started = false;
    for ch in sig[open..].chars() {
        match ch {
            '(' | '[' | '<' | '{' => {
                depth += 1;
                if depth > 1 || started {
                    params.push(ch);
                }
                started = true;
            }
            ')' | ']' | '>' | '}' => {
                depth -= 1;
                if depth == 0 {
                    break;
                }
                params.push(ch);
            }
            _ if depth >= 1 => params.push(ch),
            _ => {}
        }
    }
    let trimmed = params.trim();
    if trimmed.is_empty() {
        0
    } else {
        trimmed.split(',').filter(|p| !p.trim().is_empty()).count() as i64
    }
}
