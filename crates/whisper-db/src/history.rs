use anyhow::{Result, bail};

use crate::Database;
use crate::models::SearchRow;

pub const HISTORY_LIMIT: u32 = 20;

impl Database {
    // -- Search history --

    pub fn insert_search(&self, id: &str, user_id: &str, term: &str, category: Option<&str>) -> Result<SearchRow> {
        let term = term.trim();
        if term.is_empty() {
            bail!("Refusing to record an empty search term");
        }

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO search_history (id, user_id, search_term, category) VALUES (?1, ?2, ?3, ?4)",
                (id, user_id, term, category),
            )?;
            let row = conn.query_row(
                "SELECT id, user_id, search_term, category, created_at FROM search_history WHERE id = ?1",
                [id],
                search_from_row,
            )?;
            Ok(row)
        })
    }

    /// Most recent searches first.
    pub fn list_search_history(&self, user_id: &str, limit: u32) -> Result<Vec<SearchRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, search_term, category, created_at FROM search_history
                 WHERE user_id = ?1
                 ORDER BY created_at DESC, rowid DESC
                 LIMIT ?2",
            )?;
            let rows = stmt
                .query_map(rusqlite::params![user_id, limit], search_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Removes one entry. Entries owned by other users are left alone.
    pub fn delete_search_item(&self, user_id: &str, id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let deleted = conn.execute(
                "DELETE FROM search_history WHERE id = ?1 AND user_id = ?2",
                [id, user_id],
            )?;
            Ok(deleted > 0)
        })
    }

    pub fn clear_search_history(&self, user_id: &str) -> Result<usize> {
        self.with_conn(|conn| Ok(conn.execute("DELETE FROM search_history WHERE user_id = ?1", [user_id])?))
    }
}

fn search_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SearchRow> {
    Ok(SearchRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        search_term: row.get(2)?,
        category: row.get(3)?,
        created_at: row.get(4)?,
    })
}
