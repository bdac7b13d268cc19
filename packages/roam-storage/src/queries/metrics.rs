//! Derived analysis tables: graph_metrics, symbol_metrics, file_stats,
//! clusters. Every writer here is `INSERT OR REPLACE` since these
//! tables are fully recomputed on each analysis pass rather than
//! incrementally updated.

use rusqlite::{params, OptionalExtension};

use crate::entities::{
    ClusterRecord, FileId, FileStatsRecord, GraphMetricsRecord, SymbolId, SymbolMetricsRecord,
};
use crate::error::Result;
use crate::store::Store;

fn row_to_graph_metrics(row: &rusqlite::Row) -> rusqlite::Result<GraphMetricsRecord> {
    Ok(GraphMetricsRecord {
        symbol_id: row.get(0)?,
        pagerank: row.get(1)?,
        in_degree: row.get(2)?,
        out_degree: row.get(3)?,
        betweenness: row.get(4)?,
        closeness: row.get(5)?,
        eigenvector: row.get(6)?,
        clustering_coefficient: row.get(7)?,
        debt_score: row.get(8)?,
    })
}

impl Store {
    pub fn put_graph_metrics(&self, rows: &[GraphMetricsRecord]) -> Result<()> {
        self.with_transaction(|tx| {
            for r in rows {
                tx.execute(
                    "INSERT OR REPLACE INTO graph_metrics(symbol_id, pagerank, in_degree, out_degree, \
                     betweenness, closeness, eigenvector, clustering_coefficient, debt_score) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                    params![
                        r.symbol_id,
                        r.pagerank,
                        r.in_degree,
                        r.out_degree,
                        r.betweenness,
                        r.closeness,
                        r.eigenvector,
                        r.clustering_coefficient,
                        r.debt_score,
                    ],
                )?;
            }
            Ok(())
        })
    }

    pub fn get_graph_metrics(&self, symbol_id: SymbolId) -> Result<Option<GraphMetricsRecord>> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT symbol_id, pagerank, in_degree, out_degree, betweenness, \
                     closeness, eigenvector, clustering_coefficient, debt_score \
                     FROM graph_metrics WHERE symbol_id = ?1",
                    params![symbol_id],
                    row_to_graph_metrics,
                )
                .optional()?)
        })
    }

    pub fn top_pagerank(&self, limit: i64) -> Result<Vec<GraphMetricsRecord>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT symbol_id, pagerank, in_degree, out_degree, betweenness, \
                 closeness, eigenvector, clustering_coefficient, debt_score \
                 FROM graph_metrics ORDER BY pagerank DESC LIMIT ?1",
            )?;
            let rows = stmt.query_map(params![limit], row_to_graph_metrics)?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })
    }

    pub fn put_symbol_metrics(&self, rows: &[SymbolMetricsRecord]) -> Result<()> {
        self.with_transaction(|tx| {
            for r in rows {
                tx.execute(
                    "INSERT OR REPLACE INTO symbol_metrics(symbol_id, cognitive_complexity, \
                     nesting_depth, param_count, line_count, return_count, bool_op_count, callback_depth) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    params![
                        r.symbol_id,
                        r.cognitive_complexity,
                        r.nesting_depth,
                        r.param_count,
                        r.line_count,
                        r.return_count,
                        r.bool_op_count,
                        r.callback_depth,
                    ],
                )?;
            }
            Ok(())
        })
    }

    pub fn top_cognitive_complexity(&self, limit: i64) -> Result<Vec<SymbolMetricsRecord>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT symbol_id, cognitive_complexity, nesting_depth, param_count, \
                 line_count, return_count, bool_op_count, callback_depth \
                 FROM symbol_metrics ORDER BY cognitive_complexity DESC LIMIT ?1",
            )?;
            let rows = stmt.query_map(params![limit], |row| {
                Ok(SymbolMetricsRecord {
                    symbol_id: row.get(0)?,
                    cognitive_complexity: row.get(1)?,
                    nesting_depth: row.get(2)?,
                    param_count: row.get(3)?,
                    line_count: row.get(4)?,
                    return_count: row.get(5)?,
                    bool_op_count: row.get(6)?,
                    callback_depth: row.get(7)?,
                })
            })?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })
    }

    /// Every `symbol_metrics` row, for whole-repo rollups (snapshot's
    /// `avg_complexity`/`brain_methods`) rather than a top-N cut.
    pub fn all_symbol_metrics(&self) -> Result<Vec<SymbolMetricsRecord>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT symbol_id, cognitive_complexity, nesting_depth, param_count, \
                 line_count, return_count, bool_op_count, callback_depth FROM symbol_metrics",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok(SymbolMetricsRecord {
                    symbol_id: row.get(0)?,
                    cognitive_complexity: row.get(1)?,
                    nesting_depth: row.get(2)?,
                    param_count: row.get(3)?,
                    line_count: row.get(4)?,
                    return_count: row.get(5)?,
                    bool_op_count: row.get(6)?,
                    callback_depth: row.get(7)?,
                })
            })?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })
    }

    pub fn put_file_stats(&self, rows: &[FileStatsRecord]) -> Result<()> {
        self.with_transaction(|tx| {
            for r in rows {
                tx.execute(
                    "INSERT OR REPLACE INTO file_stats(file_id, commit_count, total_churn, \
                     distinct_authors, complexity, health_score, cochange_entropy, cognitive_load) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    params![
                        r.file_id,
                        r.commit_count,
                        r.total_churn,
                        r.distinct_authors,
                        r.complexity,
                        r.health_score,
                        r.cochange_entropy,
                        r.cognitive_load,
                    ],
                )?;
            }
            Ok(())
        })
    }

    pub fn get_file_stats(&self, file_id: FileId) -> Result<Option<FileStatsRecord>> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT file_id, commit_count, total_churn, distinct_authors, \
                     complexity, health_score, cochange_entropy, cognitive_load \
                     FROM file_stats WHERE file_id = ?1",
                    params![file_id],
                    |row| {
                        Ok(FileStatsRecord {
                            file_id: row.get(0)?,
                            commit_count: row.get(1)?,
                            total_churn: row.get(2)?,
                            distinct_authors: row.get(3)?,
                            complexity: row.get(4)?,
                            health_score: row.get(5)?,
                            cochange_entropy: row.get(6)?,
                            cognitive_load: row.get(7)?,
                        })
                    },
                )
                .optional()?)
        })
    }

    /// Every `file_stats` row, for callers that need a full `file_id
    /// -> commit_count` map (dark-matter NPMI) rather than a top-N cut.
    pub fn all_file_stats(&self) -> Result<Vec<FileStatsRecord>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT file_id, commit_count, total_churn, distinct_authors, \
                 complexity, health_score, cochange_entropy, cognitive_load FROM file_stats",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok(FileStatsRecord {
                    file_id: row.get(0)?,
                    commit_count: row.get(1)?,
                    total_churn: row.get(2)?,
                    distinct_authors: row.get(3)?,
                    complexity: row.get(4)?,
                    health_score: row.get(5)?,
                    cochange_entropy: row.get(6)?,
                    cognitive_load: row.get(7)?,
                })
            })?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })
    }

    pub fn top_churn(&self, limit: i64) -> Result<Vec<FileStatsRecord>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT file_id, commit_count, total_churn, distinct_authors, \
                 complexity, health_score, cochange_entropy, cognitive_load \
                 FROM file_stats ORDER BY total_churn DESC LIMIT ?1",
            )?;
            let rows = stmt.query_map(params![limit], |row| {
                Ok(FileStatsRecord {
                    file_id: row.get(0)?,
                    commit_count: row.get(1)?,
                    total_churn: row.get(2)?,
                    distinct_authors: row.get(3)?,
                    complexity: row.get(4)?,
                    health_score: row.get(5)?,
                    cochange_entropy: row.get(6)?,
                    cognitive_load: row.get(7)?,
                })
            })?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })
    }

    pub fn put_clusters(&self, rows: &[ClusterRecord]) -> Result<()> {
        self.with_transaction(|tx| {
            tx.execute("DELETE FROM clusters", [])?;
            for r in rows {
                tx.execute(
                    "INSERT INTO clusters(symbol_id, cluster_id, cluster_label) VALUES (?1, ?2, ?3)",
                    params![r.symbol_id, r.cluster_id, r.cluster_label],
                )?;
            }
            Ok(())
        })
    }

    pub fn cluster_members(&self, cluster_id: i64) -> Result<Vec<ClusterRecord>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT symbol_id, cluster_id, cluster_label FROM clusters WHERE cluster_id = ?1",
            )?;
            let rows = stmt.query_map(params![cluster_id], |row| {
                Ok(ClusterRecord {
                    symbol_id: row.get(0)?,
                    cluster_id: row.get(1)?,
                    cluster_label: row.get(2)?,
                })
            })?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{NewSymbol, Visibility};

    fn sample_symbol(store: &Store, file_id: FileId, name: &str) -> SymbolId {
        store
            .insert_symbol(
                file_id,
                &NewSymbol {
                    name: name.to_string(),
                    qualified_name: format!("m::{name}"),
                    kind: "function".into(),
                    signature: None,
                    line_start: 1,
                    line_end: 2,
                    docstring: None,
                    visibility: Visibility::Public,
                    is_exported: true,
                    parent_id: None,
                    default_value: None,
                },
            )
            .unwrap()
    }

    fn gm(symbol_id: SymbolId, pagerank: f64) -> GraphMetricsRecord {
        GraphMetricsRecord {
            symbol_id,
            pagerank,
            in_degree: 0,
            out_degree: 0,
            betweenness: 0.0,
            closeness: 0.0,
            eigenvector: 0.0,
            clustering_coefficient: 0.0,
            debt_score: 0.0,
        }
    }

    #[test]
    fn put_and_get_graph_metrics() {
        let store = Store::open_in_memory().unwrap();
        let f = store.upsert_file("a.rs", None, "h", None, 1).unwrap();
        let s = sample_symbol(&store, f, "foo");
        store.put_graph_metrics(&[gm(s, 0.42)]).unwrap();
        let rec = store.get_graph_metrics(s).unwrap().unwrap();
        assert!((rec.pagerank - 0.42).abs() < 1e-9);
    }

    #[test]
    fn top_pagerank_orders_descending() {
        let store = Store::open_in_memory().unwrap();
        let f = store.upsert_file("a.rs", None, "h", None, 1).unwrap();
        let s1 = sample_symbol(&store, f, "low");
        let s2 = sample_symbol(&store, f, "high");
        store.put_graph_metrics(&[gm(s1, 0.1), gm(s2, 0.9)]).unwrap();
        let top = store.top_pagerank(1).unwrap();
        assert_eq!(top[0].symbol_id, s2);
    }

    #[test]
    fn put_clusters_replaces_prior_set() {
        let store = Store::open_in_memory().unwrap();
        let f = store.upsert_file("a.rs", None, "h", None, 1).unwrap();
        let s1 = sample_symbol(&store, f, "a");
        store
            .put_clusters(&[ClusterRecord { symbol_id: s1, cluster_id: 1, cluster_label: None }])
            .unwrap();
        store.put_clusters(&[]).unwrap();
        assert!(store.cluster_members(1).unwrap().is_empty());
    }
}
