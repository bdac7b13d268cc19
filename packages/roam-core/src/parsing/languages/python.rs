//! Python extractor: functions/methods (with `self.x = …` constructor
//! properties), classes, decorators-as-route markers, `import`/`from`
//! statements, call references.

use tree_sitter::{Language, Node, Tree};

use crate::parsing::extractor::{LanguageExtractor, LanguageId};
use crate::shared::models::{ExtractionResult, ReferenceKind, ReferenceRecord, SymbolKind, SymbolRecord};
use roam_storage::Visibility;

pub struct PythonExtractor;

fn node_text<'a>(node: Node, source: &'a str) -> &'a str {
    node.utf8_text(source.as_bytes()).unwrap_or("")
}

fn docstring_of(body: Node, source: &str) -> Option<String> {
    let first = body.named_child(0)?;
    if first.kind() != "expression_statement" {
        return None;
    }
    let expr = first.named_child(0)?;
    if expr.kind() == "string" {
        Some(node_text(expr, source).trim_matches(['"', '\''].as_ref()).to_string())
    } else {
        None
    }
}

/// The attribute name if `node` is an assignment whose left side is
/// `self.<attr>`.
fn self_attr_name(node: Node, source: &str) -> Option<String> {
    let left = node.child_by_field_name("left")?;
    if left.kind() != "attribute" {
        return None;
    }
    let object = left.child_by_field_name("object")?;
    if node_text(object, source) != "self" {
        return None;
    }
    let attr = left.child_by_field_name("attribute")?;
    Some(node_text(attr, source).to_string())
}

/// Every `self.<attr> = …` assignment under `node`, one entry per
/// occurrence (callers dedupe by name). Does not descend into nested
/// function or class bodies, so a property assigned inside a closure
/// or inner class isn't attributed to the outer one.
fn collect_self_assignments(node: Node, source: &str, out: &mut Vec<(String, i64)>) {
    if node.kind() == "assignment" {
        if let Some(name) = self_attr_name(node, source) {
            out.push((name, node.start_position().row as i64 + 1));
        }
    }
    if node.kind() == "function_definition" || node.kind() == "class_definition" {
        return;
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_self_assignments(child, source, out);
    }
}

fn has_route_decorator(decorated: Node, source: &str) -> bool {
    let mut cursor = decorated.walk();
    decorated.children(&mut cursor).any(|child| {
        child.kind() == "decorator"
            && ["route", "get", "post", "put", "delete", "patch"]
                .iter()
                .any(|kw| node_text(child, source).to_lowercase().contains(kw))
    })
}

#[derive(Clone)]
struct Scope {
    name: String,
    is_class: bool,
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
        "class_definition" => {
            let Some(name_node) = node.child_by_field_name("name") else { return };
            let name = node_text(name_node, source).to_string();
            let qualified_name = fqn(stack, &name);
            let body = node.child_by_field_name("body");
            let docstring = body.and_then(|b| docstring_of(b, source));

            if let Some(superclasses) = node.child_by_field_name("superclasses") {
                let mut cursor = superclasses.walk();
                for arg in superclasses.named_children(&mut cursor) {
                    out.references.push(ReferenceRecord {
                        source_name: qualified_name.clone(),
                        target_name: node_text(arg, source).to_string(),
                        kind: ReferenceKind::Inherits,
                        line: Some(node.start_position().row as i64 + 1),
                        import_path: None,
                    });
                }
            }

            out.symbols.push(SymbolRecord {
                name,
                qualified_name: Some(qualified_name.clone()),
                kind: SymbolKind::Class,
                signature: None,
                line_start: node.start_position().row as i64 + 1,
                line_end: node.end_position().row as i64 + 1,
                docstring,
                visibility: Visibility::Public,
                is_exported: true,
                parent_name: stack.last().map(|s| s.name.clone()),
                default_value: None,
            });

            stack.push(Scope { name: qualified_name.rsplit('.').next().unwrap().to_string(), is_class: true });
            if let Some(body) = body {
                let mut cursor = body.walk();
                for child in body.children(&mut cursor) {
                    walk(child, source, stack, out);
                }
            }
            stack.pop();
            return;
        }
        "function_definition" | "decorated_definition" => {
            let func_node = if node.kind() == "decorated_definition" {
                match node.child_by_field_name("definition") {
                    Some(d) if d.kind() == "function_definition" => d,
                    _ => {
                        let mut cursor = node.walk();
                        for child in node.children(&mut cursor) {
                            walk(child, source, stack, out);
                        }
                        return;
                    }
                }
            } else {
                node
            };

            let Some(name_node) = func_node.child_by_field_name("name") else { return };
            let name = node_text(name_node, source).to_string();
            let in_class = stack.last().map(|s| s.is_class).unwrap_or(false);
            let kind = if in_class {
                if name == "__init__" { SymbolKind::Constructor } else { SymbolKind::Method }
            } else {
                SymbolKind::Function
            };
            let qualified_name = fqn(stack, &name);
            let body = func_node.child_by_field_name("body");
            let docstring = body.and_then(|b| docstring_of(b, source));
            let params = func_node
                .child_by_field_name("parameters")
                .map(|p| node_text(p, source).to_string());
            let is_route = node.kind() == "decorated_definition" && has_route_decorator(node, source);

            out.symbols.push(SymbolRecord {
                name: name.clone(),
                qualified_name: Some(qualified_name.clone()),
                kind: if is_route { SymbolKind::Route } else { kind },
                signature: params,
                line_start: node.start_position().row as i64 + 1,
                line_end: node.end_position().row as i64 + 1,
                docstring,
                visibility: if name.starts_with('_') { Visibility::Private } else { Visibility::Public },
                is_exported: !name.starts_with('_'),
                parent_name: stack.last().map(|s| s.name.clone()),
                default_value: None,
            });

            if in_class {
                if let Some(body) = body {
                    let mut finds = Vec::new();
                    collect_self_assignments(body, source, &mut finds);
                    for (attr, line) in finds {
                        let prop_qn = fqn(stack, &attr);
                        let already_seen = out
                            .symbols
                            .iter()
                            .any(|s| s.kind == SymbolKind::Property && s.qualified_name.as_deref() == Some(prop_qn.as_str()));
                        if already_seen {
                            continue;
                        }
                        out.symbols.push(SymbolRecord {
                            name: attr,
                            qualified_name: Some(prop_qn),
                            kind: SymbolKind::Property,
                            signature: None,
                            line_start: line,
                            line_end: line,
                            docstring: None,
                            visibility: Visibility::Public,
                            is_exported: true,
                            parent_name: stack.last().map(|s| s.name.clone()),
                            default_value: None,
                        });
                    }
                }
            }

            stack.push(Scope { name, is_class: false });
            if let Some(body) = body {
                let mut cursor = body.walk();
                for child in body.children(&mut cursor) {
                    walk(child, source, stack, out);
                }
            }
            stack.pop();
            return;
        }
        "call" => {
            if let Some(func) = node.child_by_field_name("function") {
                let target = node_text(func, source);
                let target = target.rsplit('.').next().unwrap_or(target).to_string();
                out.references.push(ReferenceRecord {
                    source_name: stack.last().map(|s| s.name.clone()).unwrap_or_default(),
                    target_name: target,
                    kind: ReferenceKind::Call,
                    line: Some(node.start_position().row as i64 + 1),
                    import_path: None,
                });
            }
        }
        "import_statement" | "import_from_statement" => {
            out.references.push(ReferenceRecord {
                source_name: stack.last().map(|s| s.name.clone()).unwrap_or_default(),
                target_name: node_text(node, source).to_string(),
                kind: ReferenceKind::Import,
                line: Some(node.start_position().row as i64 + 1),
                import_path: Some(node_text(node, source).to_string()),
            });
        }
        _ => {}
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        walk(child, source, stack, out);
    }
}

impl LanguageExtractor for PythonExtractor {
    fn language_id(&self) -> LanguageId {
        LanguageId::Python
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        &["py", "pyi"]
    }

    fn ts_language(&self) -> Option<Language> {
        Some(tree_sitter_python::language())
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

    fn parse(source: &str) -> Tree {
        let mut parser = Parser::new();
        parser.set_language(&tree_sitter_python::language()).unwrap();
        parser.parse(source, None).unwrap()
    }

    #[test]
    fn extracts_top_level_function() {
        let src = "def greet(name):\n    \"\"\"Say hi.\"\"\"\n    return name\n";
        let tree = parse(src);
        let ext = PythonExtractor;
        let result = ext.extract_symbols(Some(&tree), src, "a.py");
        assert_eq!(result.symbols.len(), 1);
        assert_eq!(result.symbols[0].name, "greet");
        assert_eq!(result.symbols[0].kind, SymbolKind::Function);
        assert_eq!(result.symbols[0].docstring.as_deref(), Some("Say hi."));
    }

    #[test]
    fn extracts_class_with_constructor_and_method() {
        let src = "class Widget:\n    def __init__(self):\n        self.x = 1\n    def render(self):\n        pass\n";
        let tree = parse(src);
        let ext = PythonExtractor;
        let result = ext.extract_symbols(Some(&tree), src, "a.py");
        let kinds: Vec<_> = result.symbols.iter().map(|s| (s.name.as_str(), s.kind)).collect();
        assert!(kinds.contains(&("Widget", SymbolKind::Class)));
        assert!(kinds.contains(&("__init__", SymbolKind::Constructor)));
        assert!(kinds.contains(&("render", SymbolKind::Method)));
    }

    #[test]
    fn self_assignment_in_constructor_is_a_property() {
        let src = "class Widget:\n    def __init__(self):\n        self.x = 1\n    def render(self):\n        pass\n";
        let tree = parse(src);
        let ext = PythonExtractor;
        let result = ext.extract_symbols(Some(&tree), src, "a.py");
        let prop = result
            .symbols
            .iter()
            .find(|s| s.kind == SymbolKind::Property)
            .expect("self.x = 1 should extract a property");
        assert_eq!(prop.name, "x");
        assert_eq!(prop.qualified_name.as_deref(), Some("Widget.x"));
    }

    #[test]
    fn repeated_self_assignment_is_not_duplicated() {
        let src = "class Widget:\n    def __init__(self):\n        self.x = 1\n    def reset(self):\n        self.x = 0\n";
        let tree = parse(src);
        let ext = PythonExtractor;
        let result = ext.extract_symbols(Some(&tree), src, "a.py");
        let props: Vec<_> = result.symbols.iter().filter(|s| s.kind == SymbolKind::Property).collect();
        assert_eq!(props.len(), 1);
    }

    #[test]
    fn extracts_inheritance_edge() {
        let src = "class Base:\n    pass\nclass Child(Base):\n    pass\n";
        let tree = parse(src);
        let ext = PythonExtractor;
        let result = ext.extract_symbols(Some(&tree), src, "a.py");
        assert!(result
            .references
            .iter()
            .any(|r| r.kind == ReferenceKind::Inherits && r.target_name == "Base"));
    }

    #[test]
    fn extracts_call_reference() {
        let src = "def a():\n    b()\n";
        let tree = parse(src);
        let ext = PythonExtractor;
        let result = ext.extract_symbols(Some(&tree), src, "a.py");
        assert!(result
            .references
            .iter()
            .any(|r| r.kind == ReferenceKind::Call && r.target_name == "b"));
    }

    #[test]
    fn private_functions_are_not_exported() {
        let src = "def _helper():\n    pass\n";
        let tree = parse(src);
        let ext = PythonExtractor;
        let result = ext.extract_symbols(Some(&tree), src, "a.py");
        assert!(!result.symbols[0].is_exported);
    }
}
