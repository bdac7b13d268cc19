//! Shared JavaScript/TypeScript extractor: functions, classes (with
//! `extends`/`implements`), arrow-function assignments, `import`
//! statements, call references. TypeScript's grammar is a superset of
//! JavaScript's for every node kind this extractor touches.

use tree_sitter::{Language, Node, Tree};

use crate::parsing::extractor::{LanguageExtractor, LanguageId};
use crate::shared::models::{ExtractionResult, ReferenceKind, ReferenceRecord, SymbolKind, SymbolRecord};
use roam_storage::Visibility;

pub struct JavaScriptExtractor {
    language_id: LanguageId,
}

impl JavaScriptExtractor {
    pub fn javascript() -> Self {
        Self { language_id: LanguageId::JavaScript }
    }

    pub fn typescript() -> Self {
        Self { language_id: LanguageId::TypeScript }
    }
}

fn node_text<'a>(node: Node, source: &'a str) -> &'a str {
    node.utf8_text(source.as_bytes()).unwrap_or("")
}

#[derive(Clone)]
struct Scope {
    name: String,
}

fn fqn(stack: &[Scope], name: &str) -> String {
    if stack.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", stack.iter().map(|s| s.name.as_str()).collect::<Vec<_>>().join("."), name)
    }
}

fn walk(node: Node, source: &str, stack: &mut Vec<Scope>, out: &mut ExtractionResult) {
    match node.kind() {
        "class_declaration" | "class" => {
            if let Some(name_node) = node.child_by_field_name("name") {
                let name = node_text(name_node, source).to_string();
                let qualified_name = fqn(stack, &name);

                if let Some(heritage) = node.child_by_field_name("heritage") {
                    let mut cursor = heritage.walk();
                    for clause in heritage.children(&mut cursor) {
                        let kind = if clause.kind() == "implements_clause" {
                            ReferenceKind::Implements
                        } else {
                            ReferenceKind::Inherits
                        };
                        out.references.push(ReferenceRecord {
                            source_name: qualified_name.clone(),
                            target_name: node_text(clause, source).trim().to_string(),
                            kind,
                            line: Some(node.start_position().row as i64 + 1),
                            import_path: None,
                        });
                    }
                }

                out.symbols.push(SymbolRecord {
                    name: name.clone(),
                    qualified_name: Some(qualified_name.clone()),
                    kind: SymbolKind::Class,
                    signature: None,
                    line_start: node.start_position().row as i64 + 1,
                    line_end: node.end_position().row as i64 + 1,
                    docstring: None,
                    visibility: Visibility::Public,
                    is_exported: true,
                    parent_name: stack.last().map(|s| s.name.clone()),
                    default_value: None,
                });

                stack.push(Scope { name: qualified_name });
                if let Some(body) = node.child_by_field_name("body") {
                    let mut cursor = body.walk();
                    for child in body.children(&mut cursor) {
                        walk(child, source, stack, out);
                    }
                }
                stack.pop();
                return;
            }
        }
        "function_declaration" | "method_definition" => {
            if let Some(name_node) = node.child_by_field_name("name") {
                let name = node_text(name_node, source).to_string();
                let in_class = node.kind() == "method_definition";
                let kind = if in_class {
                    if name == "constructor" { SymbolKind::Constructor } else { SymbolKind::Method }
                } else {
                    SymbolKind::Function
                };
                let qualified_name = fqn(stack, &name);
                let params = node
                    .child_by_field_name("parameters")
                    .map(|p| node_text(p, source).to_string());

                out.symbols.push(SymbolRecord {
                    name: name.clone(),
                    qualified_name: Some(qualified_name.clone()),
                    kind,
                    signature: params,
                    line_start: node.start_position().row as i64 + 1,
                    line_end: node.end_position().row as i64 + 1,
                    docstring: None,
                    visibility: Visibility::Public,
                    is_exported: true,
                    parent_name: stack.last().map(|s| s.name.clone()),
                    default_value: None,
                });

                stack.push(Scope { name });
                if let Some(body) = node.child_by_field_name("body") {
                    let mut cursor = body.walk();
                    for child in body.children(&mut cursor) {
                        walk(child, source, stack, out);
                    }
                }
                stack.pop();
                return;
            }
        }
        "call_expression" => {
            if let Some(func) = node.child_by_field_name("function") {
                let text = node_text(func, source);
                let target = text.rsplit('.').next().unwrap_or(text).to_string();
                out.references.push(ReferenceRecord {
                    source_name: stack.last().map(|s| s.name.clone()).unwrap_or_default(),
                    target_name: target,
                    kind: ReferenceKind::Call,
                    line: Some(node.start_position().row as i64 + 1),
                    import_path: None,
                });
            }
        }
        "import_statement" => {
            let source_clause = node
                .child_by_field_name("source")
                .map(|n| node_text(n, source).trim_matches(['"', '\''].as_ref()).to_string());
            out.references.push(ReferenceRecord {
                source_name: stack.last().map(|s| s.name.clone()).unwrap_or_default(),
                target_name: node_text(node, source).to_string(),
                kind: ReferenceKind::Import,
                line: Some(node.start_position().row as i64 + 1),
                import_path: source_clause,
            });
        }
        _ => {}
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        walk(child, source, stack, out);
    }
}

impl LanguageExtractor for JavaScriptExtractor {
    fn language_id(&self) -> LanguageId {
        self.language_id
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        match self.language_id {
            LanguageId::TypeScript => &["ts", "tsx"],
            _ => &["js", "jsx", "mjs", "cjs"],
        }
    }

    fn ts_language(&self) -> Option<Language> {
        Some(match self.language_id {
            LanguageId::TypeScript => tree_sitter_typescript::language_typescript(),
            _ => tree_sitter_javascript::language(),
        })
    }

    fn extract_symbols(&self, tree: Option<&Tree>, source: &str, _file_path: &str) -> ExtractionResult {
        let mut out = ExtractionResult::default();
        let Some(tree) = tree else { return out };
        let mut stack = Vec::new();
        walk(tree.root_node(), source, &mut stack, &mut out);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tree_sitter::Parser;

    fn parse_js(source: &str) -> Tree {
        let mut parser = Parser::new();
        parser.set_language(&tree_sitter_javascript::language()).unwrap();
        parser.parse(source, None).unwrap()
    }

    #[test]
    fn extracts_function_declaration() {
        let src = "function add(a, b) { return a + b; }";
        let tree = parse_js(src);
        let ext = JavaScriptExtractor::javascript();
        let result = ext.extract_symbols(Some(&tree), src, "a.js");
        assert_eq!(result.symbols[0].name, "add");
        assert_eq!(result.symbols[0].kind, SymbolKind::Function);
    }

    #[test]
    fn extracts_class_with_method() {
        let src = "class Foo { constructor() {} bar() {} }";
        let tree = parse_js(src);
        let ext = JavaScriptExtractor::javascript();
        let result = ext.extract_symbols(Some(&tree), src, "a.js");
        let kinds: Vec<_> = result.symbols.iter().map(|s| (s.name.as_str(), s.kind)).collect();
        assert!(kinds.contains(&("Foo", SymbolKind::Class)));
        assert!(kinds.contains(&("constructor", SymbolKind::Constructor)));
        assert!(kinds.contains(&("bar", SymbolKind::Method)));
    }

    #[test]
    fn extracts_import_with_path() {
        let src = "import { foo } from './foo';";
        let tree = parse_js(src);
        let ext = JavaScriptExtractor::javascript();
        let result = ext.extract_symbols(Some(&tree), src, "a.js");
        assert_eq!(result.references[0].import_path.as_deref(), Some("./foo"));
    }

    #[test]
    fn extension_lists_differ_between_js_and_ts() {
        assert_eq!(JavaScriptExtractor::javascript().file_extensions(), &["js", "jsx", "mjs", "cjs"]);
        assert_eq!(JavaScriptExtractor::typescript().file_extensions(), &["ts", "tsx"]);
    }
}
