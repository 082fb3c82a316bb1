/// Database row types. These map directly to SQLite rows.
/// Distinct from whisper-types API models to keep the DB layer independent.

pub struct UserRow {
    pub id: String,
    pub email: String,
    pub password: String,
    pub created_at: String,
}

pub struct ProfileRow {
    pub user_id: String,
    pub email: String,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

pub struct WhisperRow {
    pub id: String,
    pub user_id: String,
    pub content: String,
    pub category: String,
    pub is_anonymous: bool,
    pub likes_count: u32,
    pub comments_count: u32,
    pub created_at: String,
    pub updated_at: String,
}

pub struct CommentRow {
    pub id: String,
    pub whisper_id: String,
    pub user_id: String,
    pub content: String,
    pub is_anonymous: bool,
    pub likes_count: u32,
    pub created_at: String,
}

pub struct SearchRow {
    pub id: String,
    pub user_id: String,
    pub search_term: String,
    pub category: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateUserOutcome {
    Created,
    /// Another account already holds the email. Nothing was written.
    EmailTaken,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
    /// The row exists but belongs to someone else.
    Forbidden,
}
