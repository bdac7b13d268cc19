//! Plain records that flow between pipeline stages before anything is
//! store-assigned an id. Extractors produce these; the resolver and
//! indexer consume them and turn them into `roam_storage` rows.

use roam_storage::Visibility;
use serde::{Deserialize, Serialize};

/// A symbol as extracted from one file's AST, before resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolRecord {
    pub name: String,
    pub qualified_name: Option<String>,
    pub kind: SymbolKind,
    pub signature: Option<String>,
    pub line_start: i64,
    pub line_end: i64,
    pub docstring: Option<String>,
    pub visibility: Visibility,
    pub is_exported: bool,
    pub parent_name: Option<String>,
    pub default_value: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    Function,
    Method,
    Class,
    Interface,
    Struct,
    Enum,
    Constructor,
    Property,
    Field,
    Variable,
    Constant,
    Module,
    Namespace,
    Trigger,
    Route,
    Other,
}

impl SymbolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolKind::Function => "function",
            SymbolKind::Method => "method",
            SymbolKind::Class => "class",
            SymbolKind::Interface => "interface",
            SymbolKind::Struct => "struct",
            SymbolKind::Enum => "enum",
            SymbolKind::Constructor => "constructor",
            SymbolKind::Property => "property",
            SymbolKind::Field => "field",
            SymbolKind::Variable => "variable",
            SymbolKind::Constant => "constant",
            SymbolKind::Module => "module",
            SymbolKind::Namespace => "namespace",
            SymbolKind::Trigger => "trigger",
            SymbolKind::Route => "route",
            SymbolKind::Other => "other",
        }
    }
}

/// A local (unresolved) reference from one symbol name to another,
/// found while walking a single file's AST.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceRecord {
    pub source_name: String,
    pub target_name: String,
    pub kind: ReferenceKind,
    pub line: Option<i64>,
    pub import_path: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKind {
    Call,
    Import,
    Inherits,
    Implements,
    Template,
}

impl ReferenceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferenceKind::Call => "call",
            ReferenceKind::Import => "import",
            ReferenceKind::Inherits => "inherits",
            ReferenceKind::Implements => "implements",
            ReferenceKind::Template => "template",
        }
    }

    /// Resolution priority when collapsing multiple reference kinds
    /// between the same symbol pair down to one edge for display:
    /// `call > inherits > implements > import`.
    pub fn display_priority(&self) -> u8 {
        match self {
            ReferenceKind::Call => 3,
            ReferenceKind::Inherits => 2,
            ReferenceKind::Implements => 1,
            ReferenceKind::Import => 0,
            ReferenceKind::Template => 0,
        }
    }
}

/// One file's raw extraction output, before cross-file resolution.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub symbols: Vec<SymbolRecord>,
    pub references: Vec<ReferenceRecord>,
    pub errors: Vec<String>,
}

impl ExtractionResult {
    pub fn merge(&mut self, other: ExtractionResult) {
        self.symbols.extend(other.symbols);
        self.references.extend(other.references);
        self.errors.extend(other.errors);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_priority_orders_call_highest() {
        assert!(ReferenceKind::Call.display_priority() > ReferenceKind::Inherits.display_priority());
        assert!(
            ReferenceKind::Inherits.display_priority() > ReferenceKind::Implements.display_priority()
        );
        assert!(
            ReferenceKind::Implements.display_priority() > ReferenceKind::Import.display_priority()
        );
    }

    #[test]
    fn extraction_result_merge_concatenates() {
        let mut a = ExtractionResult::default();
        a.symbols.push(SymbolRecord {
            name: "a".into(),
            qualified_name: None,
            kind: SymbolKind::Function,
            signature: None,
            line_start: 1,
            line_end: 1,
            docstring: None,
            visibility: Visibility::Public,
            is_exported: true,
            parent_name: None,
            default_value: None,
        });
        let mut b = ExtractionResult::default();
        b.errors.push("oops".into());
        a.merge(b);
        assert_eq!(a.symbols.len(), 1);
        assert_eq!(a.errors.len(), 1);
    }
}
