//! Row → API model conversion. Corrupt stored values are logged and
//! replaced with defaults instead of failing the whole response.

use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use whisper_db::models::{CommentRow, ProfileRow, SearchRow, WhisperRow};
use whisper_types::models::{Category, Comment, Profile, SearchHistoryItem, Whisper};

fn parse_uuid(field: &str, raw: &str, row_id: &str) -> Uuid {
    raw.parse().unwrap_or_else(|e| {
        warn!("Corrupt {} '{}' on row '{}': {}", field, raw, row_id, e);
        Uuid::default()
    })
}

/// SQLite stores timestamps as "YYYY-MM-DD HH:MM:SS.fff" without timezone.
pub fn parse_timestamp(raw: &str, row_id: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f").map(|ndt| ndt.and_utc()))
        .unwrap_or_else(|e| {
            warn!("Corrupt timestamp '{}' on row '{}': {}", raw, row_id, e);
            DateTime::default()
        })
}

fn parse_category(raw: &str, row_id: &str) -> Category {
    raw.parse().unwrap_or_else(|e| {
        warn!("{} on row '{}'", e, row_id);
        Category::default()
    })
}

/// Builds the viewer-specific whisper. The author stays hidden on anonymous
/// whispers unless the viewer is the author.
pub fn whisper(row: WhisperRow, viewer: Option<Uuid>, user_has_liked: bool) -> Whisper {
    let author = parse_uuid("user_id", &row.user_id, &row.id);
    let is_own = viewer == Some(author);

    Whisper {
        id: parse_uuid("id", &row.id, &row.id),
        category: parse_category(&row.category, &row.id),
        author_id: (!row.is_anonymous || is_own).then_some(author),
        created_at: parse_timestamp(&row.created_at, &row.id),
        updated_at: parse_timestamp(&row.updated_at, &row.id),
        content: row.content,
        is_anonymous: row.is_anonymous,
        likes_count: row.likes_count,
        comments_count: row.comments_count,
        user_has_liked,
        is_own,
    }
}

pub fn comment(row: CommentRow, viewer: Option<Uuid>, user_has_liked: bool) -> Comment {
    let author = parse_uuid("user_id", &row.user_id, &row.id);
    let is_own = viewer == Some(author);

    Comment {
        id: parse_uuid("id", &row.id, &row.id),
        whisper_id: parse_uuid("whisper_id", &row.whisper_id, &row.id),
        author_id: (!row.is_anonymous || is_own).then_some(author),
        created_at: parse_timestamp(&row.created_at, &row.id),
        content: row.content,
        is_anonymous: row.is_anonymous,
        likes_count: row.likes_count,
        user_has_liked,
        is_own,
    }
}

pub fn profile(row: ProfileRow) -> Profile {
    Profile {
        user_id: parse_uuid("user_id", &row.user_id, &row.user_id),
        created_at: parse_timestamp(&row.created_at, &row.user_id),
        updated_at: parse_timestamp(&row.updated_at, &row.user_id),
        email: row.email,
        full_name: row.full_name,
        avatar_url: row.avatar_url,
    }
}

pub fn search_item(row: SearchRow) -> SearchHistoryItem {
    SearchHistoryItem {
        id: parse_uuid("id", &row.id, &row.id),
        category: row.category.as_deref().map(|c| parse_category(c, &row.id)),
        created_at: parse_timestamp(&row.created_at, &row.id),
        search_term: row.search_term,
    }
}
