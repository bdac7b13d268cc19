//! Rust extractor: `fn`/`impl`/`trait`/`struct`/`enum`, `use`
//! statements, call references, `impl Trait for Type` as an
//! `implements` edge.

use tree_sitter::{Language, Node, Tree};

use crate::parsing::extractor::{LanguageExtractor, LanguageId};
use crate::shared::models::{ExtractionResult, ReferenceKind, ReferenceRecord, SymbolKind, SymbolRecord};
use roam_storage::Visibility;

pub struct RustExtractor;

fn node_text<'a>(node: Node, source: &'a str) -> &'a str {
    node.utf8_text(source.as_bytes()).unwrap_or("")
}

fn is_pub(node: Node, source: &str) -> bool {
    let mut cursor = node.walk();
    node.children(&mut cursor)
        .any(|c| c.kind() == "visibility_modifier" && node_text(c, source).starts_with("pub"))
}

#[derive(Clone)]
struct Scope {
    name: String,
}

fn fqn(stack: &[Scope], name: &str) -> String {
    if stack.is_empty() {
        name.to_string()
    } else {
        format!("{}::{}", stack.iter().map(|s| s.name.as_str()).collect::<Vec<_>>().join("::"), name)
    }
}

fn walk(node: Node, source: &str, stack: &mut Vec<Scope>, out: &mut ExtractionResult) {
    match node.kind() {
        "struct_item" | "enum_item" | "trait_item" => {
            let Some(name_node) = node.child_by_field_name("name") else { return };
            let name = node_text(name_node, source).to_string();
            let qualified_name = fqn(stack, &name);
            out.symbols.push(SymbolRecord {
                name,
                qualified_name: Some(qualified_name),
                kind: match node.kind() {
                    "struct_item" => SymbolKind::Struct,
                    "enum_item" => SymbolKind::Enum,
                    _ => SymbolKind::Interface,
                },
                signature: None,
                line_start: node.start_position().row as i64 + 1,
                line_end: node.end_position().row as i64 + 1,
                docstring: None,
                visibility: if is_pub(node, source) { Visibility::Public } else { Visibility::Private },
                is_exported: is_pub(node, source),
                parent_name: stack.last().map(|s| s.name.clone()),
                default_value: None,
            });
        }
        "impl_item" => {
            let type_node = node.child_by_field_name("type");
            let trait_node = node.child_by_field_name("trait");
            if let (Some(type_node), Some(trait_node)) = (type_node, trait_node) {
                out.references.push(ReferenceRecord {
                    source_name: node_text(type_node, source).to_string(),
                    target_name: node_text(trait_node, source).to_string(),
                    kind: ReferenceKind::Implements,
                    line: Some(node.start_position().row as i64 + 1),
                    import_path: None,
                });
            }
            if let Some(type_node) = type_node {
                stack.push(Scope { name: node_text(type_node, source).to_string() });
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
        "function_item" => {
            let Some(name_node) = node.child_by_field_name("name") else { return };
            let name = node_text(name_node, source).to_string();
            let qualified_name = fqn(stack, &name);
            let in_impl = !stack.is_empty();
            let params = node
                .child_by_field_name("parameters")
                .map(|p| node_text(p, source).to_string());
            out.symbols.push(SymbolRecord {
                name: name.clone(),
                qualified_name: Some(qualified_name),
                kind: if in_impl {
                    if name == "new" { SymbolKind::Constructor } else { SymbolKind::Method }
                } else {
                    SymbolKind::Function
                },
                signature: params,
                line_start: node.start_position().row as i64 + 1,
                line_end: node.end_position().row as i64 + 1,
                docstring: None,
                visibility: if is_pub(node, source) { Visibility::Public } else { Visibility::Private },
                is_exported: is_pub(node, source),
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
        "call_expression" => {
            if let Some(func) = node.child_by_field_name("function") {
                let text = node_text(func, source);
                let target = text.rsplit("::").next().unwrap_or(text).to_string();
                out.references.push(ReferenceRecord {
                    source_name: stack.last().map(|s| s.name.clone()).unwrap_or_default(),
                    target_name: target,
                    kind: ReferenceKind::Call,
                    line: Some(node.start_position().row as i64 + 1),
                    import_path: None,
                });
            }
        }
        "use_declaration" => {
            out.references.push(ReferenceRecord {
                source_name: stack.last().map(|s| s.name.clone()).unwrap_or_default(),
                target_name: node_text(node, source).to_string(),
                kind: ReferenceKind::Import,
                line: Some(node.start_position().row as i64 + 1),
                import_path: Some(node_text(node, source).trim_start_matches("use ").trim_end_matches(';').to_string()),
            });
        }
        _ => {}
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        walk(child, source, stack, out);
    }
}

impl LanguageExtractor for RustExtractor {
    fn language_id(&self) -> LanguageId {
        LanguageId::Rust
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        &["rs"]
    }

    fn ts_language(&self) -> Option<Language> {
        Some(tree_sitter_rust::language())
    }

    fn extract_symbols(&self, tree: Option<&Tree>, source: &str, _file_path: &str) -> ExtractionResult {
        let mut out = ExtractionResult::default();
        let Some(tree) = tree else { return out };
        let mut stack = Vec::new();
        walk(tree.root_node(), source, &mut stack, &mut out);
        out
    }
}
