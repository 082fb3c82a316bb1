use anyhow::Result;
use rusqlite::types::Value;
use rusqlite::{Connection, ErrorCode, Row, TransactionBehavior};
use tracing::debug;
use whisper_types::models::{Category, SortMode};

use crate::models::{CommentRow, CreateUserOutcome, DeleteOutcome, ProfileRow, UserRow, WhisperRow};
use crate::{Database, OptionalExt};

pub const DEFAULT_LIST_LIMIT: u32 = 100;
pub const MAX_LIST_LIMIT: u32 = 200;

const WHISPER_COLUMNS: &str = "id, user_id, content, category, is_anonymous, likes_count, comments_count, created_at, updated_at";
const COMMENT_COLUMNS: &str = "id, whisper_id, user_id, content, is_anonymous, likes_count, created_at";

/// Filters for the wall listing.
#[derive(Debug, Clone, Default)]
pub struct WhisperFilter<'a> {
    /// `None` lists every category.
    pub category: Option<Category>,
    pub sort: SortMode,
    /// Case-insensitive substring match on content.
    pub search: Option<&'a str>,
    pub limit: Option<u32>,
}

impl Database {
    // -- Users --

    /// Creates the account and its profile together. The email's UNIQUE
    /// constraint is the authority on duplicates, so two racing sign-ups
    /// cannot both succeed.
    pub fn create_user(
        &self,
        id: &str,
        email: &str,
        password_hash: &str,
        full_name: Option<&str>,
    ) -> Result<CreateUserOutcome> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let inserted = tx.execute(
                "INSERT INTO users (id, email, password) VALUES (?1, ?2, ?3)",
                (id, email, password_hash),
            );
            match inserted {
                Ok(_) => {}
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.code == ErrorCode::ConstraintViolation
                        && e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
                {
                    debug!("Email {} is already registered", email);
                    return Ok(CreateUserOutcome::EmailTaken);
                }
                Err(e) => return Err(e.into()),
            }
            tx.execute(
                "INSERT INTO profiles (user_id, email, full_name) VALUES (?1, ?2, ?3)",
                (id, email, full_name),
            )?;
            tx.commit()?;
            Ok(CreateUserOutcome::Created)
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email", email))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", id))
    }

    // -- Profiles --

    pub fn get_profile(&self, user_id: &str) -> Result<Option<ProfileRow>> {
        self.with_conn(|conn| query_profile(conn, user_id))
    }

    /// Updates whichever fields are given and returns the new row.
    pub fn update_profile(
        &self,
        user_id: &str,
        full_name: Option<&str>,
        avatar_url: Option<&str>,
    ) -> Result<Option<ProfileRow>> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE profiles
                 SET full_name = COALESCE(?2, full_name),
                     avatar_url = COALESCE(?3, avatar_url),
                     updated_at = strftime('%Y-%m-%d %H:%M:%f', 'now')
                 WHERE user_id = ?1",
                (user_id, full_name, avatar_url),
            )?;
            query_profile(conn, user_id)
        })
    }

    // -- Whispers --

    pub fn insert_whisper(
        &self,
        id: &str,
        user_id: &str,
        content: &str,
        category: Category,
        is_anonymous: bool,
    ) -> Result<WhisperRow> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO whispers (id, user_id, content, category, is_anonymous) VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![id, user_id, content, category.as_str(), is_anonymous],
            )?;
            debug!("Inserted whisper {} in {}", id, category);
            query_whisper(conn, id)?.ok_or_else(|| anyhow::anyhow!("Whisper {} vanished after insert", id))
        })
    }

    pub fn get_whisper(&self, id: &str) -> Result<Option<WhisperRow>> {
        self.with_conn(|conn| query_whisper(conn, id))
    }

    pub fn list_whispers(&self, filter: &WhisperFilter<'_>) -> Result<Vec<WhisperRow>> {
        self.with_conn(|conn| query_whispers(conn, filter))
    }

    /// Deletes a whisper owned by `user_id`. Its comments and likes go with it.
    pub fn delete_whisper(&self, id: &str, user_id: &str) -> Result<DeleteOutcome> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let owner: Option<String> = tx
                .query_row("SELECT user_id FROM whispers WHERE id = ?1", [id], |row| row.get(0))
                .optional()?;

            let outcome = match owner {
                None => DeleteOutcome::NotFound,
                Some(owner) if owner != user_id => DeleteOutcome::Forbidden,
                Some(_) => {
                    tx.execute("DELETE FROM whispers WHERE id = ?1", [id])?;
                    DeleteOutcome::Deleted
                }
            };
            tx.commit()?;
            debug!("Delete of whisper {} by {}: {:?}", id, user_id, outcome);
            Ok(outcome)
        })
    }

    // -- Comments --

    /// Inserts a comment and bumps the parent's `comments_count` in the same
    /// transaction. Returns `None` when the parent whisper does not exist.
    pub fn insert_comment(
        &self,
        id: &str,
        whisper_id: &str,
        user_id: &str,
        content: &str,
        is_anonymous: bool,
    ) -> Result<Option<CommentRow>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let updated = tx.execute(
                "UPDATE whispers SET comments_count = comments_count + 1 WHERE id = ?1",
                [whisper_id],
            )?;
            if updated == 0 {
                debug!("Comment on missing whisper {}", whisper_id);
                return Ok(None);
            }

            tx.execute(
                "INSERT INTO comments (id, whisper_id, user_id, content, is_anonymous) VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![id, whisper_id, user_id, content, is_anonymous],
            )?;
            let row = tx.query_row(
                &format!("SELECT {COMMENT_COLUMNS} FROM comments WHERE id = ?1"),
                [id],
                comment_from_row,
            )?;
            tx.commit()?;
            debug!("Inserted comment {} on whisper {}", id, whisper_id);
            Ok(Some(row))
        })
    }

    /// Comments on a whisper, newest first.
    pub fn list_comments(&self, whisper_id: &str) -> Result<Vec<CommentRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COMMENT_COLUMNS} FROM comments
                 WHERE whisper_id = ?1
                 ORDER BY created_at DESC, rowid DESC"
            ))?;
            let rows = stmt
                .query_map([whisper_id], comment_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT id, email, password, created_at FROM users WHERE {column} = ?1"
    ))?;

    let row = stmt
        .query_row([value], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                email: row.get(1)?,
                password: row.get(2)?,
                created_at: row.get(3)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn query_profile(conn: &Connection, user_id: &str) -> Result<Option<ProfileRow>> {
    let mut stmt = conn.prepare(
        "SELECT user_id, email, full_name, avatar_url, created_at, updated_at FROM profiles WHERE user_id = ?1",
    )?;

    let row = stmt
        .query_row([user_id], |row| {
            Ok(ProfileRow {
                user_id: row.get(0)?,
                email: row.get(1)?,
                full_name: row.get(2)?,
                avatar_url: row.get(3)?,
                created_at: row.get(4)?,
                updated_at: row.get(5)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn query_whisper(conn: &Connection, id: &str) -> Result<Option<WhisperRow>> {
    conn.query_row(
        &format!("SELECT {WHISPER_COLUMNS} FROM whispers WHERE id = ?1"),
        [id],
        whisper_from_row,
    )
    .optional()
}

fn query_whispers(conn: &Connection, filter: &WhisperFilter<'_>) -> Result<Vec<WhisperRow>> {
    let mut sql = format!("SELECT {WHISPER_COLUMNS} FROM whispers WHERE 1 = 1");
    let mut params: Vec<Value> = Vec::new();

    if let Some(category) = filter.category {
        params.push(Value::Text(category.as_str().to_string()));
        sql.push_str(&format!(" AND category = ?{}", params.len()));
    }

    if let Some(search) = filter.search.filter(|s| !s.is_empty()) {
        params.push(Value::Text(format!("%{}%", escape_like(&search.to_lowercase()))));
        sql.push_str(&format!(
            " AND unicode_lower(content) LIKE ?{} ESCAPE '\\'",
            params.len()
        ));
    }

    sql.push_str(match filter.sort {
        SortMode::Recent => " ORDER BY created_at DESC, rowid DESC",
        SortMode::Popular => " ORDER BY likes_count DESC, created_at DESC, rowid DESC",
        SortMode::Discussed => " ORDER BY comments_count DESC, created_at DESC, rowid DESC",
    });

    let limit = filter.limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT);
    params.push(Value::Integer(i64::from(limit)));
    sql.push_str(&format!(" LIMIT ?{}", params.len()));

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(rusqlite::params_from_iter(params), whisper_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

/// Escapes LIKE wildcards so user input only ever matches literally.
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

fn whisper_from_row(row: &Row<'_>) -> rusqlite::Result<WhisperRow> {
    Ok(WhisperRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        content: row.get(2)?,
        category: row.get(3)?,
        is_anonymous: row.get(4)?,
        likes_count: row.get(5)?,
        comments_count: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

pub(crate) fn comment_from_row(row: &Row<'_>) -> rusqlite::Result<CommentRow> {
    Ok(CommentRow {
        id: row.get(0)?,
        whisper_id: row.get(1)?,
        user_id: row.get(2)?,
        content: row.get(3)?,
        is_anonymous: row.get(4)?,
        likes_count: row.get(5)?,
        created_at: row.get(6)?,
    })
}
