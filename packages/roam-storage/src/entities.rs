//! Row types for every table in `schema.rs`.
//!
//! Each struct mirrors a table 1:1 with `serde` derives so callers can
//! forward rows straight into an envelope without an intermediate DTO.

use serde::{Deserialize, Serialize};

pub type FileId = i64;
pub type SymbolId = i64;
pub type EdgeId = i64;
pub type CommitId = i64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: FileId,
    pub path: String,
    pub language: Option<String>,
    pub hash: String,
    pub mtime: Option<f64>,
    pub line_count: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Public,
    Protected,
    Private,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Protected => "protected",
            Visibility::Private => "private",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "protected" => Visibility::Protected,
            "private" => Visibility::Private,
            _ => Visibility::Public,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolRecord {
    pub id: SymbolId,
    pub file_id: FileId,
    pub name: String,
    pub qualified_name: String,
    pub kind: String,
    pub signature: Option<String>,
    pub line_start: i64,
    pub line_end: i64,
    pub docstring: Option<String>,
    pub visibility: Visibility,
    pub is_exported: bool,
    pub parent_id: Option<SymbolId>,
    pub default_value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub id: EdgeId,
    pub source_id: SymbolId,
    pub target_id: SymbolId,
    pub kind: String,
    pub line: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileEdgeRecord {
    pub id: i64,
    pub source_file_id: FileId,
    pub target_file_id: FileId,
    pub kind: String,
    pub symbol_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GitCommitRecord {
    pub id: CommitId,
    pub hash: String,
    pub author: Option<String>,
    pub timestamp: i64,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GitFileChangeRecord {
    pub id: i64,
    pub commit_id: CommitId,
    pub file_id: Option<FileId>,
    pub path: String,
    pub lines_added: i64,
    pub lines_removed: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GitCochangeRecord {
    pub file_id_a: FileId,
    pub file_id_b: FileId,
    pub cochange_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GitHyperedgeRecord {
    pub id: i64,
    pub commit_id: CommitId,
    pub file_count: i64,
    pub sig_hash: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GitHyperedgeMemberRecord {
    pub hyperedge_id: i64,
    pub file_id: FileId,
    pub ordinal: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FileStatsRecord {
    pub file_id: FileId,
    pub commit_count: i64,
    pub total_churn: i64,
    pub distinct_authors: i64,
    pub complexity: Option<f64>,
    pub health_score: Option<f64>,
    pub cochange_entropy: Option<f64>,
    pub cognitive_load: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GraphMetricsRecord {
    pub symbol_id: SymbolId,
    pub pagerank: f64,
    pub in_degree: i64,
    pub out_degree: i64,
    pub betweenness: f64,
    pub closeness: f64,
    pub eigenvector: f64,
    pub clustering_coefficient: f64,
    pub debt_score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SymbolMetricsRecord {
    pub symbol_id: SymbolId,
    pub cognitive_complexity: i64,
    pub nesting_depth: i64,
    pub param_count: i64,
    pub line_count: i64,
    pub return_count: i64,
    pub bool_op_count: i64,
    pub callback_depth: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterRecord {
    pub symbol_id: SymbolId,
    pub cluster_id: i64,
    pub cluster_label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    pub id: i64,
    pub timestamp: i64,
    pub tag: Option<String>,
    pub source: Option<String>,
    pub git_branch: Option<String>,
    pub git_commit: Option<String>,
    pub files: i64,
    pub symbols: i64,
    pub edges: i64,
    pub cycles: i64,
    pub god_components: i64,
    pub bottlenecks: i64,
    pub dead_exports: i64,
    pub layer_violations: i64,
    pub health_score: Option<f64>,
    pub tangle_ratio: Option<f64>,
    pub avg_complexity: Option<f64>,
    pub brain_methods: i64,
}

/// A new symbol ready for insertion, before an id has been assigned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSymbol {
    pub name: String,
    pub qualified_name: String,
    pub kind: String,
    pub signature: Option<String>,
    pub line_start: i64,
    pub line_end: i64,
    pub docstring: Option<String>,
    pub visibility: Visibility,
    pub is_exported: bool,
    pub parent_id: Option<SymbolId>,
    pub default_value: Option<String>,
}

/// A new edge ready for insertion, before an id has been assigned.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NewEdge {
    pub source_id: SymbolId,
    pub target_id: SymbolId,
    pub line: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn visibility_roundtrips_through_str() {
        for v in [Visibility::Public, Visibility::Protected, Visibility::Private] {
            assert_eq!(Visibility::parse(v.as_str()), v);
        }
    }

    #[test]
    fn visibility_defaults_unknown_to_public() {
        assert_eq!(Visibility::parse("garbage"), Visibility::Public);
    }

    #[test]
    fn symbol_record_serializes_with_stable_fields() {
        let rec = SymbolRecord {
            id: 1,
            file_id: 1,
            name: "foo".into(),
            qualified_name: "mod::foo".into(),
            kind: "function".into(),
            signature: Some("fn foo()".into()),
            line_start: 10,
            line_end: 12,
            docstring: None,
            visibility: Visibility::Public,
            is_exported: true,
            parent_id: None,
            default_value: None,
        };
        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(json["qualified_name"], "mod::foo");
        assert_eq!(json["visibility"], "public");
    }
}
