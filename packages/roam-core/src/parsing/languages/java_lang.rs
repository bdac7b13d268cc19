//! Java extractor: classes/interfaces with `extends`/`implements`,
//! methods/constructors, `import` statements, call references.

use tree_sitter::{Language, Node, Tree};

use crate::parsing::extractor::{LanguageExtractor, LanguageId};
use crate::shared::models::{ExtractionResult, ReferenceKind, ReferenceRecord, SymbolKind, SymbolRecord};
use roam_storage::Visibility;

pub struct JavaExtractor;

fn node_text<'a>(node: Node, source: &'a str) -> &'a str {
    node.utf8_text(source.as_bytes()).unwrap_or("")
}

fn has_modifier(node: Node, source: &str, modifier: &str) -> bool {
    let mut cursor = node.walk();
    node.children(&mut cursor).any(|c| {
        c.kind() == "modifiers"
            && {
                let mut mc = c.walk();
                c.children(&mut mc).any(|m| node_text(m, source) == modifier)
            }
    })
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
        "class_declaration" | "interface_declaration" => {
            let Some(name_node) = node.child_by_field_name("name") else { return };
            let name = node_text(name_node, source).to_string();
            let qualified_name = fqn(stack, &name);

            if let Some(superclass) = node.child_by_field_name("superclass") {
                out.references.push(ReferenceRecord {
                    source_name: qualified_name.clone(),
                    target_name: node_text(superclass, source).trim_start_matches("extends").trim().to_string(),
                    kind: ReferenceKind::Inherits,
                    line: Some(node.start_position().row as i64 + 1),
                    import_path: None,
                });
            }
            if let Some(interfaces) = node.child_by_field_name("interfaces") {
                let mut cursor = interfaces.walk();
                for t in interfaces.named_children(&mut cursor) {
                    out.references.push(ReferenceRecord {
                        source_name: qualified_name.clone(),
                        target_name: node_text(t, source).to_string(),
                        kind: ReferenceKind::Implements,
                        line: Some(node.start_position().row as i64 + 1),
                        import_path: None,
                    });
                }
            }

            out.symbols.push(SymbolRecord {
                name: name.clone(),
                qualified_name: Some(qualified_name.clone()),
                kind: if node.kind() == "interface_declaration" { SymbolKind::Interface } else { SymbolKind::Class },
                signature: None,
                line_start: node.start_position().row as i64 + 1,
                line_end: node.end_position().row as i64 + 1,
                docstring: None,
                visibility: if has_modifier(node, source, "public") { Visibility::Public } else { Visibility::Protected },
                is_exported: has_modifier(node, source, "public"),
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
        "method_declaration" | "constructor_declaration" => {
            let Some(name_node) = node.child_by_field_name("name") else { return };
            let name = node_text(name_node, source).to_string();
            let qualified_name = fqn(stack, &name);
            let params = node
                .child_by_field_name("parameters")
                .map(|p| node_text(p, source).to_string());

            out.symbols.push(SymbolRecord {
                name: name.clone(),
                qualified_name: Some(qualified_name.clone()),
                kind: if node.kind() == "constructor_declaration" { SymbolKind::Constructor } else { SymbolKind::Method },
                signature: params,
                line_start: node.start_position().row as i64 + 1,
                line_end: node.end_position().row as i64 + 1,
                docstring: None,
                visibility: if has_modifier(node, source, "public") { Visibility::Public } else { Visibility::Private },
                is_exported: has_modifier(node, source, "public"),
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
        "method_invocation" => {
            if let Some(name_node) = node.child_by_field_name("name") {
                out.references.push(ReferenceRecord {
                    source_name: stack.last().map(|s| s.name.clone()).unwrap_or_default(),
                    target_name: node_text(name_node, source).to_string(),
                    kind: ReferenceKind::Call,
                    line: Some(node.start_position().row as i64 + 1),
                    import_path: None,
                });
            }
        }
        "import_declaration" => {
            out.references.push(ReferenceRecord {
                source_name: stack.last().map(|s| s.name.clone()).unwrap_or_default(),
                target_name: node_text(node, source).to_string(),
                kind: ReferenceKind::Import,
                line: Some(node.start_position().row as i64 + 1),
                import_path: Some(
                    node_text(node, source)
                        .trim_start_matches("import")
                        .trim()
                        .trim_end_matches(';')
                        .to_string(),
                ),
            });
        }
        _ => {}
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        walk(child, source, stack, out);
    }
}

impl LanguageExtractor for JavaExtractor {
    fn language_id(&self) -> LanguageId {
        LanguageId::Java
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        &["java"]
    }

    fn ts_language(&self) -> Option<Language> {
        Some(tree_sitter_java::language())
    }

    fn extract_symbols(&self, tree: Option<&Tree>, source: &str, _file_path: &str) -> ExtractionResult {
        let mut out = ExtractionResult::default();
        let Some(tree) = tree else { return out };
        let mut stack = Vec::new();
        walk(tree.root_node(), source, &mut stack, &mut out);
        out
    }
}
