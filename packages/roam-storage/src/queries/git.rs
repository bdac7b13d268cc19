//! Git history tables: commits, per-commit file changes, pairwise
//! co-change counters, and co-change hyperedges (one hyperedge per
//! commit touching more than one tracked file).

use rusqlite::{params, OptionalExtension};

use crate::entities::{
    CommitId, FileId, GitCochangeRecord, GitCommitRecord, GitFileChangeRecord,
    GitHyperedgeMemberRecord, GitHyperedgeRecord,
};
use crate::error::Result;
use crate::store::Store;

impl Store {
    pub fn upsert_commit(
        &self,
        hash: &str,
        author: Option<&str>,
        timestamp: i64,
        message: Option<&str>,
    ) -> Result<CommitId> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO git_commits(hash, author, timestamp, message)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(hash) DO NOTHING",
                params![hash, author, timestamp, message],
            )?;
            let id = conn.query_row(
                "SELECT id FROM git_commits WHERE hash = ?1",
                params![hash],
                |row| row.get(0),
            )?;
            Ok(id)
        })
    }

    pub fn get_commit_by_hash(&self, hash: &str) -> Result<Option<GitCommitRecord>> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT id, hash, author, timestamp, message FROM git_commits WHERE hash = ?1",
                    params![hash],
                    |row| {
                        Ok(GitCommitRecord {
                            id: row.get(0)?,
                            hash: row.get(1)?,
                            author: row.get(2)?,
                            timestamp: row.get(3)?,
                            message: row.get(4)?,
                        })
                    },
                )
                .optional()?)
        })
    }

    pub fn insert_file_change(
        &self,
        commit_id: CommitId,
        file_id: Option<FileId>,
        path: &str,
        lines_added: i64,
        lines_removed: i64,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO git_file_changes(commit_id, file_id, path, lines_added, lines_removed) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![commit_id, file_id, path, lines_added, lines_removed],
            )?;
            Ok(())
        })
    }

    pub fn file_changes_for_commit(&self, commit_id: CommitId) -> Result<Vec<GitFileChangeRecord>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, commit_id, file_id, path, lines_added, lines_removed \
                 FROM git_file_changes WHERE commit_id = ?1",
            )?;
            let rows = stmt.query_map(params![commit_id], |row| {
                Ok(GitFileChangeRecord {
                    id: row.get(0)?,
                    commit_id: row.get(1)?,
                    file_id: row.get(2)?,
                    path: row.get(3)?,
                    lines_added: row.get(4)?,
                    lines_removed: row.get(5)?,
                })
            })?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })
    }

    /// Bump the co-change counter for an ordered pair (`a < b` by
    /// convention so each unordered pair has exactly one row).
    pub fn bump_cochange(&self, file_id_a: FileId, file_id_b: FileId) -> Result<()> {
        let (a, b) = if file_id_a <= file_id_b {
            (file_id_a, file_id_b)
        } else {
            (file_id_b, file_id_a)
        };
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO git_cochange(file_id_a, file_id_b, cochange_count)
                 VALUES (?1, ?2, 1)
                 ON CONFLICT(file_id_a, file_id_b)
                 DO UPDATE SET cochange_count = cochange_count + 1",
                params![a, b],
            )?;
            Ok(())
        })
    }

    pub fn cochange_pairs(&self, min_count: i64) -> Result<Vec<GitCochangeRecord>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT file_id_a, file_id_b, cochange_count FROM git_cochange \
                 WHERE cochange_count >= ?1 ORDER BY cochange_count DESC",
            )?;
            let rows = stmt.query_map(params![min_count], |row| {
                Ok(GitCochangeRecord {
                    file_id_a: row.get(0)?,
                    file_id_b: row.get(1)?,
                    cochange_count: row.get(2)?,
                })
            })?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })
    }

    /// Every co-change row involving `file_id`, in either position,
    /// regardless of count — used to build one file's co-change
    /// distribution (`file_stats.cochange_entropy`) rather than the
    /// globally-thresholded pairs `cochange_pairs` returns.
    pub fn cochange_for_file(&self, file_id: FileId) -> Result<Vec<GitCochangeRecord>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT file_id_a, file_id_b, cochange_count FROM git_cochange \
                 WHERE file_id_a = ?1 OR file_id_b = ?1",
            )?;
            let rows = stmt.query_map(params![file_id], |row| {
                Ok(GitCochangeRecord {
                    file_id_a: row.get(0)?,
                    file_id_b: row.get(1)?,
                    cochange_count: row.get(2)?,
                })
            })?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })
    }

    /// Total number of commits ingested so far, at least 1 so callers
    /// dividing by it never hit a zero denominator.
    pub fn commit_count(&self) -> Result<i64> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM git_commits", [], |row| row.get(0))?;
            Ok(count.max(1))
        })
    }

    pub fn insert_hyperedge(
        &self,
        commit_id: CommitId,
        sig_hash: &str,
        member_file_ids: &[FileId],
    ) -> Result<()> {
        self.with_transaction(|tx| {
            tx.execute(
                "INSERT INTO git_hyperedges(commit_id, file_count, sig_hash) VALUES (?1, ?2, ?3)",
                params![commit_id, member_file_ids.len() as i64, sig_hash],
            )?;
            let hyperedge_id = tx.last_insert_rowid();
            for (ordinal, file_id) in member_file_ids.iter().enumerate() {
                tx.execute(
                    "INSERT INTO git_hyperedge_members(hyperedge_id, file_id, ordinal) \
                     VALUES (?1, ?2, ?3)",
                    params![hyperedge_id, file_id, ordinal as i64],
                )?;
            }
            Ok(())
        })
    }

    pub fn hyperedges_for_file(&self, file_id: FileId) -> Result<Vec<GitHyperedgeRecord>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT h.id, h.commit_id, h.file_count, h.sig_hash
                 FROM git_hyperedges h
                 JOIN git_hyperedge_members m ON m.hyperedge_id = h.id
                 WHERE m.file_id = ?1",
            )?;
            let rows = stmt.query_map(params![file_id], |row| {
                Ok(GitHyperedgeRecord {
                    id: row.get(0)?,
                    commit_id: row.get(1)?,
                    file_count: row.get(2)?,
                    sig_hash: row.get(3)?,
                })
            })?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })
    }

    pub fn hyperedge_members(&self, hyperedge_id: i64) -> Result<Vec<GitHyperedgeMemberRecord>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT hyperedge_id, file_id, ordinal FROM git_hyperedge_members \
                 WHERE hyperedge_id = ?1 ORDER BY ordinal",
            )?;
            let rows = stmt.query_map(params![hyperedge_id], |row| {
                Ok(GitHyperedgeMemberRecord {
                    hyperedge_id: row.get(0)?,
                    file_id: row.get(1)?,
                    ordinal: row.get(2)?,
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
