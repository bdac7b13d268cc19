//! Symbol table CRUD.

use rusqlite::{params, OptionalExtension};

use crate::entities::{FileId, NewSymbol, SymbolId, SymbolRecord, Visibility};
use crate::error::{ErrorKind, Result};
use crate::store::{batched, not_found, placeholders, Store};

const SELECT_COLS: &str = "id, file_id, name, qualified_name, kind, signature, \
    line_start, line_end, docstring, visibility, is_exported, parent_id, default_value";

fn row_to_symbol(row: &rusqlite::Row) -> rusqlite::Result<SymbolRecord> {
    let visibility: String = row.get(9)?;
    Ok(SymbolRecord {
        id: row.get(0)?,
        file_id: row.get(1)?,
        name: row.get(2)?,
        qualified_name: row.get(3)?,
        kind: row.get(4)?,
        signature: row.get(5)?,
        line_start: row.get(6)?,
        line_end: row.get(7)?,
        docstring: row.get(8)?,
        visibility: Visibility::parse(&visibility),
        is_exported: row.get::<_, i64>(10)? != 0,
        parent_id: row.get(11)?,
        default_value: row.get(12)?,
    })
}

impl Store {
    pub fn insert_symbol(&self, file_id: FileId, sym: &NewSymbol) -> Result<SymbolId> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO symbols(file_id, name, qualified_name, kind, signature, \
                 line_start, line_end, docstring, visibility, is_exported, parent_id, default_value) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    file_id,
                    sym.name,
                    sym.qualified_name,
                    sym.kind,
                    sym.signature,
                    sym.line_start,
                    sym.line_end,
                    sym.docstring,
                    sym.visibility.as_str(),
                    sym.is_exported as i64,
                    sym.parent_id,
                    sym.default_value,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn get_symbol(&self, id: SymbolId) -> Result<SymbolRecord> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {SELECT_COLS} FROM symbols WHERE id = ?1"),
                params![id],
                row_to_symbol,
            )
            .optional()?
            .ok_or_else(|| not_found(ErrorKind::SymbolNotFound, "symbol", id))
        })
    }

    pub fn get_symbols(&self, ids: &[SymbolId]) -> Result<Vec<SymbolRecord>> {
        self.with_conn(|conn| {
            let mut out = Vec::with_capacity(ids.len());
            for chunk in batched(ids) {
                if chunk.is_empty() {
                    continue;
                }
                let sql = format!(
                    "SELECT {SELECT_COLS} FROM symbols WHERE id IN ({})",
                    placeholders(chunk.len())
                );
                let mut stmt = conn.prepare(&sql)?;
                let params: Vec<&dyn rusqlite::ToSql> =
                    chunk.iter().map(|id| id as &dyn rusqlite::ToSql).collect();
                let rows = stmt.query_map(params.as_slice(), row_to_symbol)?;
                for row in rows {
                    out.push(row?);
                }
            }
            Ok(out)
        })
    }

    pub fn symbols_in_file(&self, file_id: FileId) -> Result<Vec<SymbolRecord>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SELECT_COLS} FROM symbols WHERE file_id = ?1 ORDER BY line_start"
            ))?;
            let rows = stmt.query_map(params![file_id], row_to_symbol)?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })
    }

    /// Drop every symbol belonging to `file_id` ahead of a re-extract;
    /// `ON DELETE CASCADE` takes `edges`, `graph_metrics`,
    /// `symbol_metrics`, and `clusters` rows along with them.
    pub fn delete_symbols_for_file(&self, file_id: FileId) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM symbols WHERE file_id = ?1", params![file_id])?;
            Ok(())
        })
    }

    pub fn find_symbols_by_name(&self, name: &str) -> Result<Vec<SymbolRecord>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT {SELECT_COLS} FROM symbols WHERE name = ?1"))?;
            let rows = stmt.query_map(params![name], row_to_symbol)?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })
    }

    pub fn find_symbol_by_qualified_name(
        &self,
        qualified_name: &str,
    ) -> Result<Option<SymbolRecord>> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    &format!("SELECT {SELECT_COLS} FROM symbols WHERE qualified_name = ?1"),
                    params![qualified_name],
                    row_to_symbol,
                )
                .optional()?)
        })
    }

    pub fn symbol_count(&self) -> Result<i64> {
        self.with_conn(|conn| Ok(conn.query_row("SELECT count(*) FROM symbols", [], |r| r.get(0))?))
    }

    /// Every symbol in the index, ordered by id. Used by the resolver,
    /// which needs the whole symbol universe to join cross-file
    /// references — there is no cheaper query that would do.
    pub fn all_symbols(&self) -> Result<Vec<SymbolRecord>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("SELECT {SELECT_COLS} FROM symbols ORDER BY id"))?;
            let rows = stmt.query_map([], row_to_symbol)?;
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

    fn sample(name: &str) -> NewSymbol {
        NewSymbol {
            name: name.to_string(),
            qualified_name: format!("mod::{name}"),
            kind: "function".into(),
            signature: None,
            line_start: 1,
            line_end: 2,
            docstring: None,
            visibility: Visibility::Public,
            is_exported: true,
            parent_id: None,
            default_value: None,
        }
    }

    #[test]
    fn insert_then_get_roundtrips() {
        let store = Store::open_in_memory().unwrap();
        let file_id = store.upsert_file("a.rs", None, "h", None, 5).unwrap();
        let sym_id = store.insert_symbol(file_id, &sample("foo")).unwrap();
        let rec = store.get_symbol(sym_id).unwrap();
        assert_eq!(rec.name, "foo");
        assert_eq!(rec.qualified_name, "mod::foo");
        assert!(rec.is_exported);
    }

    #[test]
    fn symbols_in_file_orders_by_line() {
        let store = Store::open_in_memory().unwrap();
        let file_id = store.upsert_file("a.rs", None, "h", None, 5).unwrap();
        let mut second = sample("second");
        second.line_start = 20;
        let mut first = sample("first");
        first.line_start = 5;
        store.insert_symbol(file_id, &second).unwrap();
        store.insert_symbol(file_id, &first).unwrap();
        let syms = store.symbols_in_file(file_id).unwrap();
        assert_eq!(syms[0].name, "first");
        assert_eq!(syms[1].name, "second");
    }

    #[test]
    fn all_symbols_orders_by_id() {
        let store = Store::open_in_memory().unwrap();
        let file_id = store.upsert_file("a.rs", None, "h", None, 5).unwrap();
        let first = store.insert_symbol(file_id, &sample("first")).unwrap();
        let second = store.insert_symbol(file_id, &sample("second")).unwrap();
        let all = store.all_symbols().unwrap();
        assert_eq!(all.iter().map(|s| s.id).collect::<Vec<_>>(), vec![first, second]);
    }

    #[test]
    fn find_by_qualified_name_missing_returns_none() {
        let store = Store::open_in_memory().unwrap();
        assert!(store
            .find_symbol_by_qualified_name("nope::nope")
            .unwrap()
            .is_none());
    }

    #[test]
    fn cascades_delete_when_file_removed() {
        let store = Store::open_in_memory().unwrap();
        let file_id = store.upsert_file("a.rs", None, "h", None, 5).unwrap();
        let sym_id = store.insert_symbol(file_id, &sample("foo")).unwrap();
        store.delete_file(file_id).unwrap();
        assert_eq!(store.get_symbol(sym_id).unwrap_err().kind, ErrorKind::SymbolNotFound);
    }
}
