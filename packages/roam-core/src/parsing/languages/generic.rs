//! Generic tree-walking extractor shared by languages whose node
//! kinds are close enough to drive from a small per-language table:
//! Go, Kotlin, C++, C#, Ruby, PHP, Swift. Each gets its own grammar
//! and its own "what counts as a function/type/call/import" node-kind
//! list; the walk itself is identical.

use tree_sitter::{Language, Node, Tree};

use crate::parsing::extractor::{LanguageExtractor, LanguageId};
use crate::shared::models::{ExtractionResult, ReferenceKind, ReferenceRecord, SymbolKind, SymbolRecord};
use roam_storage::Visibility;

fn node_text<'a>(node: Node, source: &'a str) -> &'a str {
    node.utf8_text(source.as_bytes()).unwrap_or("")
}

struct LangSpec {
    language_id: LanguageId,
    extensions: &'static [&'static str],
    ts_language: fn() -> Language,
    function_kinds: &'static [&'static str],
    type_kinds: &'static [&'static str],
    call_kinds: &'static [&'static str],
    import_kinds: &'static [&'static str],
    mixin_kinds: &'static [&'static str],
}

pub struct GenericExtractor {
    spec: LangSpec,
}

impl GenericExtractor {
    pub fn go() -> Self {
        Self {
            spec: LangSpec {
                language_id: LanguageId::Go,
                extensions: &["go"],
                ts_language: tree_sitter_go::language,
                function_kinds: &["function_declaration", "method_declaration"],
                type_kinds: &["type_declaration"],
                call_kinds: &["call_expression"],
                import_kinds: &["import_spec"],
                mixin_kinds: &[],
            },
        }
    }

    pub fn kotlin() -> Self {
        Self {
            spec: LangSpec {
                language_id: LanguageId::Kotlin,
                extensions: &["kt", "kts"],
                ts_language: tree_sitter_kotlin::language,
                function_kinds: &["function_declaration"],
                type_kinds: &["class_declaration", "object_declaration"],
                call_kinds: &["call_expression"],
                import_kinds: &["import_header"],
                mixin_kinds: &["delegation_specifier"],
            },
        }
    }

    pub fn cpp() -> Self {
        Self {
            spec: LangSpec {
                language_id: LanguageId::Cpp,
                extensions: &["cpp", "cc", "cxx", "hpp", "h"],
                ts_language: tree_sitter_cpp::language,
                function_kinds: &["function_definition"],
                type_kinds: &["class_specifier", "struct_specifier"],
                call_kinds: &["call_expression"],
                import_kinds: &["preproc_include"],
                mixin_kinds: &["base_class_clause"],
            },
        }
    }

    pub fn csharp() -> Self {
        Self {
            spec: LangSpec {
                language_id: LanguageId::CSharp,
                extensions: &["cs"],
                ts_language: tree_sitter_c_sharp::language,
                function_kinds: &["method_declaration", "constructor_declaration"],
                type_kinds: &["class_declaration", "interface_declaration"],
                call_kinds: &["invocation_expression"],
                import_kinds: &["using_directive"],
                mixin_kinds: &["base_list"],
            },
        }
    }

    pub fn ruby() -> Self {
        Self {
            spec: LangSpec {
                language_id: LanguageId::Ruby,
                extensions: &["rb"],
                ts_language: tree_sitter_ruby::language,
                function_kinds: &["method", "singleton_method"],
                type_kinds: &["class", "module"],
                call_kinds: &["call", "method_call"],
                import_kinds: &["call"],
                mixin_kinds: &[],
            },
        }
    }

    pub fn php() -> Self {
        Self {
            spec: LangSpec {
                language_id: LanguageId::Php,
                extensions: &["php"],
                ts_language: tree_sitter_php::language_php,
                function_kinds: &["function_definition", "method_declaration"],
                type_kinds: &["class_declaration", "interface_declaration"],
                call_kinds: &["function_call_expression", "member_call_expression"],
                import_kinds: &["namespace_use_declaration"],
                mixin_kinds: &["base_clause", "class_interface_clause"],
            },
        }
    }

    pub fn swift() -> Self {
        Self {
            spec: LangSpec {
                language_id: LanguageId::Swift,
                extensions: &["swift"],
                ts_language: tree_sitter_swift::language,
                function_kinds: &["function_declaration"],
                type_kinds: &["class_declaration", "protocol_declaration"],
                call_kinds: &["call_expression"],
                import_kinds: &["import_declaration"],
                mixin_kinds: &["inheritance_specifier"],
            },
        }
    }
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

fn type_kind_for(node_kind: &str) -> SymbolKind {
    match node_kind {
        "interface_declaration" | "protocol_declaration" => SymbolKind::Interface,
        "struct_specifier" => SymbolKind::Struct,
        "module" => SymbolKind::Module,
        "object_declaration" => SymbolKind::Namespace,
        _ => SymbolKind::Class,
    }
}

fn walk(node: Node, source: &str, spec: &LangSpec, stack: &mut Vec<Scope>, out: &mut ExtractionResult) {
    let kind = node.kind();

    if spec.type_kinds.contains(&kind) {
        if let Some(name_node) = node.child_by_field_name("name") {
            let name = node_text(name_node, source).to_string();
            let qualified_name = fqn(stack, &name);

            for mixin_kind in spec.mixin_kinds {
                let mut cursor = node.walk();
                for child in node.children(&mut cursor) {
                    if child.kind() == *mixin_kind {
                        out.references.push(ReferenceRecord {
                            source_name: qualified_name.clone(),
                            target_name: node_text(child, source).trim_start_matches(':').trim().to_string(),
                            kind: ReferenceKind::Inherits,
                            line: Some(node.start_position().row as i64 + 1),
                            import_path: None,
                        });
                    }
                }
            }

            out.symbols.push(SymbolRecord {
                name: name.clone(),
                qualified_name: Some(qualified_name.clone()),
                kind: type_kind_for(kind),
                signature: None,
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
                    walk(child, source, spec, stack, out);
                }
            }
            stack.pop();
            return;
        }
    }

    if spec.function_kinds.contains(&kind) {
        if let Some(name_node) = node.child_by_field_name("name") {
            let name = node_text(name_node, source).to_string();
            let in_type = !stack.is_empty();
            let qualified_name = fqn(stack, &name);
            let params = node
                .child_by_field_name("parameters")
                .map(|p| node_text(p, source).to_string());

            out.symbols.push(SymbolRecord {
                name: name.clone(),
                qualified_name: Some(qualified_name.clone()),
                kind: if in_type {
                    if matches!(name.as_str(), "init" | "initialize" | "Init" | "constructor") {
                        SymbolKind::Constructor
                    } else {
                        SymbolKind::Method
                    }
                } else {
                    SymbolKind::Function
                },
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
                    walk(child, source, spec, stack, out);
                }
            }
            stack.pop();
            return;
        }
    }

    if spec.call_kinds.contains(&kind) {
        let callee = node
            .child_by_field_name("function")
            .or_else(|| node.child_by_field_name("method"))
            .or_else(|| node.named_child(0));
        if let Some(callee) = callee {
            let text = node_text(callee, source);
            let target = text.rsplit(['.', ':']).next().unwrap_or(text).to_string();
            out.references.push(ReferenceRecord {
                source_name: stack.last().map(|s| s.name.clone()).unwrap_or_default(),
                target_name: target,
                kind: ReferenceKind::Call,
                line: Some(node.start_position().row as i64 + 1),
                import_path: None,
            });
        }
    }

    if spec.import_kinds.contains(&kind) && is_import_node(node, source, spec) {
        out.references.push(ReferenceRecord {
            source_name: stack.last().map(|s| s.name.clone()).unwrap_or_default(),
            target_name: node_text(node, source).to_string(),
            kind: ReferenceKind::Import,
            line: Some(node.start_position().row as i64 + 1),
            import_path: Some(node_text(node, source).trim().to_string()),
        });
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        walk(child, source, spec, stack, out);
    }
}

/// Ruby has no `import` node kind; a `require`/`require_relative` call
/// is its closest structural equivalent, so the generic `call` kind
/// doubles as `import_kinds` for Ruby and needs filtering here.
fn is_import_node(node: Node, source: &str, spec: &LangSpec) -> bool {
    if spec.language_id != LanguageId::Ruby {
        return true;
    }
    let text = node_text(node, source);
    text.starts_with("require") || text.starts_with("include") || text.starts_with("extend")
}

impl LanguageExtractor for GenericExtractor {
    fn language_id(&self) -> LanguageId {
        self.spec.language_id
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        self.spec.extensions
    }

    fn ts_language(&self) -> Option<Language> {
        Some((self.spec.ts_language)())
    }

    fn extract_symbols(&self, tree: Option<&Tree>, source: &str, _file_path: &str) -> ExtractionResult {
        let mut out = ExtractionResult::default();
        let Some(tree) = tree else { return out };
        let mut stack = Vec::new();
        walk(tree.root_node(), source, &self.spec, &mut stack, &mut out);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tree_sitter::Parser;

    fn parse(spec: &LangSpec, source: &str) -> Tree {
        let mut parser = Parser::new();
        parser.set_language(&(spec.ts_language)()).unwrap();
        parser.parse(source, None).unwrap()
    }

    #[test]
    fn go_extracts_function() {
        let ext = GenericExtractor::go();
        let src = "package main\n\nfunc Add(a int, b int) int {\n\treturn a + b\n}\n";
        let tree = parse(&ext.spec, src);
        let result = ext.extract_symbols(Some(&tree), src, "a.go");
        assert!(result.symbols.iter().any(|s| s.name == "Add" && s.kind == SymbolKind::Function));
    }

    #[test]
    fn kotlin_extracts_class_and_function() {
        let ext = GenericExtractor::kotlin();
        let src = "class Widget {\n    fun render() {}\n}\n";
        let tree = parse(&ext.spec, src);
        let result = ext.extract_symbols(Some(&tree), src, "a.kt");
        let kinds: Vec<_> = result.symbols.iter().map(|s| (s.name.as_str(), s.kind)).collect();
        assert!(kinds.contains(&("Widget", SymbolKind::Class)));
        assert!(kinds.contains(&("render", SymbolKind::Method)));
    }

    #[test]
    fn ruby_require_is_an_import_but_other_calls_are_not() {
        let ext = GenericExtractor::ruby();
        let src = "require 'json'\nputs 'hi'\n";
        let tree = parse(&ext.spec, src);
        let result = ext.extract_symbols(Some(&tree), src, "a.rb");
        assert!(result.references.iter().any(|r| r.kind == ReferenceKind::Import));
        assert!(result.references.iter().any(|r| r.kind == ReferenceKind::Call));
    }

    #[test]
    fn swift_extracts_protocol_conformance() {
        let ext = GenericExtractor::swift();
        let src = "class Widget: Renderable {\n    func render() {}\n}\n";
        let tree = parse(&ext.spec, src);
        let result = ext.extract_symbols(Some(&tree), src, "a.swift");
        assert!(result
            .references
            .iter()
            .any(|r| r.kind == ReferenceKind::Inherits && r.target_name.contains("Renderable")));
    }

    #[test]
    fn extension_lists_are_language_specific() {
        assert_eq!(GenericExtractor::go().file_extensions(), &["go"]);
        assert_eq!(GenericExtractor::php().file_extensions(), &["php"]);
    }
}
