//! AST pattern matching with `$METAVAR` placeholders: metavars are
//! rewritten to parser-safe sentinel identifiers before parsing, a
//! single meaningful pattern root is extracted by unwrapping
//! container/statement-wrapper nodes, and matching recurses
//! structurally with repeated-metavar consistency (`same($X, $X)`
//! only matches when both occurrences are the same normalized text).
//!
//! A `tree_sitter::Node` borrows its `Tree`, so the compiled pattern
//! can't hold a root node directly; instead it keeps the `Tree` and a
//! path of child indices into it, re-walking to the root node on each
//! access.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use tree_sitter::{Node, Parser, Tree};

use crate::parsing::extractor::LanguageExtractor;

static METAVAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$([A-Za-z_][A-Za-z0-9_]*)").unwrap());
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

const CONTAINER_NODE_TYPES: &[&str] = &["module", "program", "source_file", "translation_unit", "document", "script"];
const STATEMENT_WRAPPERS: &[&str] = &["expression_statement", "statement"];

fn normalize_text(text: &str) -> String {
    WHITESPACE_RE.replace_all(text.trim(), " ").into_owned()
}

fn node_text<'a>(node: Node, source: &'a [u8]) -> std::borrow::Cow<'a, str> {
    String::from_utf8_lossy(&source[node.start_byte()..node.end_byte()])
}

/// Named children with comment nodes filtered out.
fn meaningful_named_children(node: Node) -> Vec<Node> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor).filter(|c| c.kind() != "comment").collect()
}

fn rewrite_metavars(pattern: &str) -> (String, HashMap<String, String>) {
    let mut placeholder_map = HashMap::new();
    let rewritten = METAVAR_RE
        .replace_all(pattern, |caps: &regex::Captures| {
            let name = caps[1].to_string();
            let token = format!("ROAM_META_{name}_TOKEN");
            placeholder_map.insert(token.clone(), name);
            token
        })
        .into_owned();
    (rewritten, placeholder_map)
}

pub struct CompiledAstPattern {
    pub language: &'static str,
    pattern_source: Vec<u8>,
    tree: Tree,
    root_path: Vec<usize>,
    placeholder_map: HashMap<String, String>,
}

impl CompiledAstPattern {
    fn pattern_root(&self) -> Node<'_> {
        let mut node = self.tree.root_node();
        for &idx in &self.root_path {
            node = meaningful_named_children(node)[idx];
        }
        node
    }

    fn metavar_name(&self, pattern_node: Node) -> Option<&str> {
        let token = node_text(pattern_node, &self.pattern_source);
        self.placeholder_map.get(token.as_ref()).map(String::as_str)
    }
}

/// Walk from the root, unwrapping single-child container/statement
/// nodes, until a node with real structure (or no children at all) is
/// found. Returns the node's path as a sequence of indices into each
/// ancestor's `meaningful_named_children()`.
fn extract_pattern_root(root: Node) -> Option<(Node, Vec<usize>)> {
    let mut node = root;
    let mut path = Vec::new();
    loop {
        let children = meaningful_named_children(node);
        if children.is_empty() {
            return if node.is_named() { Some((node, path)) } else { None };
        }
        if CONTAINER_NODE_TYPES.contains(&node.kind()) {
            if children.len() != 1 {
                return None;
            }
            node = children[0];
            path.push(0);
            continue;
        }
        if STATEMENT_WRAPPERS.contains(&node.kind()) && children.len() == 1 {
            node = children[0];
            path.push(0);
            continue;
        }
        return Some((node, path));
    }
}

pub fn compile_ast_pattern(pattern: &str, extractor: &dyn LanguageExtractor) -> Result<CompiledAstPattern, String> {
    if pattern.trim().is_empty() {
        return Err("AST pattern is empty".to_string());
    }
    let language = extractor.ts_language().ok_or_else(|| {
        format!("{} has no tree-sitter grammar to match AST patterns against", extractor.language_name())
    })?;

    let (rewritten, placeholder_map) = rewrite_metavars(pattern);
    let mut parser = Parser::new();
    parser.set_language(&language).map_err(|e| e.to_string())?;
    let source = rewritten.into_bytes();
    let tree = parser.parse(&source, None).ok_or("pattern could not be parsed")?;

    let (root, path) =
        extract_pattern_root(tree.root_node()).ok_or("pattern must contain exactly one AST construct")?;
    if root.kind() == "ERROR" {
        return Err("pattern could not be parsed for this language".to_string());
    }

    Ok(CompiledAstPattern { language: extractor.language_name(), pattern_source: source, tree, root_path: path, placeholder_map })
}

#[derive(Debug, Clone)]
struct Capture {
    text: String,
    line: usize,
    normalized: String,
}

fn match_nodes(
    pattern_node: Node,
    code_node: Node,
    compiled: &CompiledAstPattern,
    code_source: &[u8],
    captures: &mut HashMap<String, Capture>,
) -> bool {
    if let Some(name) = compiled.metavar_name(pattern_node) {
        let text = node_text(code_node, code_source).into_owned();
        let normalized = normalize_text(&text);
        if let Some(existing) = captures.get(name) {
            return existing.normalized == normalized;
        }
        captures.insert(name.to_string(), Capture { text, line: code_node.start_position().row + 1, normalized });
        return true;
    }

    if pattern_node.kind() != code_node.kind() {
        return false;
    }

    let pattern_children = meaningful_named_children(pattern_node);
    let code_children = meaningful_named_children(code_node);
    if pattern_children.len() != code_children.len() {
        return false;
    }

    if pattern_children.is_empty() {
        let pattern_text = normalize_text(&node_text(pattern_node, &compiled.pattern_source));
        let code_text = normalize_text(&node_text(code_node, code_source));
        return pattern_text == code_text;
    }

    pattern_children
        .into_iter()
        .zip(code_children)
        .all(|(p, c)| match_nodes(p, c, compiled, code_source, captures))
}

fn walk_named_nodes(root: Node) -> Vec<Node> {
    let mut stack = vec![root];
    let mut out = Vec::new();
    while let Some(node) = stack.pop() {
        if node.is_named() {
            out.push(node);
            for child in meaningful_named_children(node).into_iter().rev() {
                stack.push(child);
            }
        }
    }
    out
}

#[derive(Debug, Clone)]
pub struct AstMatch {
    pub line: usize,
    pub snippet: String,
    pub captures: HashMap<String, String>,
}

/// Find every match of `compiled` in `tree`, in pre-order. `max_matches
/// == 0` means unbounded.
pub fn find_ast_matches(tree: &Tree, code_source: &[u8], compiled: &CompiledAstPattern, max_matches: usize) -> Vec<AstMatch> {
    if code_source.is_empty() {
        return Vec::new();
    }

    let root_is_metavar = compiled.metavar_name(compiled.pattern_root()).is_some();
    let mut results = Vec::new();

    for node in walk_named_nodes(tree.root_node()) {
        if !root_is_metavar && node.kind() != compiled.pattern_root().kind() {
            continue;
        }
        let mut captures = HashMap::new();
        if !match_nodes(compiled.pattern_root(), node, compiled, code_source, &mut captures) {
            continue;
        }
        results.push(AstMatch {
            line: node.start_position().row + 1,
            snippet: node_text(node, code_source).into_owned(),
            captures: captures.into_iter().map(|(k, v)| (k, v.text)).collect(),
        });
        if max_matches > 0 && results.len() >= max_matches {
            break;
        }
    }
    results
}
