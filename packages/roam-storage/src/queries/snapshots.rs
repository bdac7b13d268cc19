//! Point-in-time health snapshots, used to show trend deltas across
//! index runs.

use rusqlite::{params, OptionalExtension};

use crate::entities::SnapshotRecord;
use crate::error::Result;
use crate::store::Store;

fn row_to_snapshot(row: &rusqlite::Row) -> rusqlite::Result<SnapshotRecord> {
    Ok(SnapshotRecord {
        id: row.get(0)?,
        timestamp: row.get(1)?,
        tag: row.get(2)?,
        source: row.get(3)?,
        git_branch: row.get(4)?,
        git_commit: row.get(5)?,
        files: row.get(6)?,
        symbols: row.get(7)?,
        edges: row.get(8)?,
        cycles: row.get(9)?,
        god_components: row.get(10)?,
        bottlenecks: row.get(11)?,
        dead_exports: row.get(12)?,
        layer_violations: row.get(13)?,
        health_score: row.get(14)?,
        tangle_ratio: row.get(15)?,
        avg_complexity: row.get(16)?,
        brain_methods: row.get(17)?,
    })
}

const SELECT_COLS: &str = "id, timestamp, tag, source, git_branch, git_commit, files, symbols, \
    edges, cycles, god_components, bottlenecks, dead_exports, layer_violations, health_score, \
    tangle_ratio, avg_complexity, brain_methods";

impl Store {
    #[allow(clippy::too_many_arguments)]
    pub fn insert_snapshot(&self, snap: &SnapshotRecord) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                &format!(
                    "INSERT INTO snapshots(timestamp, tag, source, git_branch, git_commit, \
                     files, symbols, edges, cycles, god_components, bottlenecks, dead_exports, \
                     layer_violations, health_score, tangle_ratio, avg_complexity, brain_methods) \
                     VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17)"
                ),
                params![
                    snap.timestamp,
                    snap.tag,
                    snap.source,
                    snap.git_branch,
                    snap.git_commit,
                    snap.files,
                    snap.symbols,
                    snap.edges,
                    snap.cycles,
                    snap.god_components,
                    snap.bottlenecks,
                    snap.dead_exports,
                    snap.layer_violations,
                    snap.health_score,
                    snap.tangle_ratio,
                    snap.avg_complexity,
                    snap.brain_methods,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn latest_snapshot(&self) -> Result<Option<SnapshotRecord>> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    &format!("SELECT {SELECT_COLS} FROM snapshots ORDER BY timestamp DESC LIMIT 1"),
                    [],
                    row_to_snapshot,
                )
                .optional()?)
        })
    }

    pub fn list_snapshots(&self, limit: i64) -> Result<Vec<SnapshotRecord>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SELECT_COLS} FROM snapshots ORDER BY timestamp DESC LIMIT ?1"
            ))?;
            let rows = stmt.query_map(params![limit], row_to_snapshot)?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })
    }
}
