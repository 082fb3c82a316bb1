use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

const NOW: &str = "(strftime('%Y-%m-%d %H:%M:%f', 'now'))";

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(&format!(
            "
            BEGIN;

            CREATE TABLE users (
                id          TEXT PRIMARY KEY,
                email       TEXT NOT NULL UNIQUE,
                password    TEXT NOT NULL,
                created_at  TEXT NOT NULL DEFAULT {NOW}
            );

            CREATE TABLE profiles (
                user_id     TEXT PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
                email       TEXT NOT NULL,
                full_name   TEXT,
                avatar_url  TEXT,
                created_at  TEXT NOT NULL DEFAULT {NOW},
                updated_at  TEXT NOT NULL DEFAULT {NOW}
            );

            CREATE TABLE whispers (
                id              TEXT PRIMARY KEY,
                user_id         TEXT NOT NULL REFERENCES users(id),
                content         TEXT NOT NULL,
                category        TEXT NOT NULL CHECK (category IN
                                    ('general', 'confession', 'advice', 'question', 'thought', 'story')),
                is_anonymous    INTEGER NOT NULL DEFAULT 1,
                likes_count     INTEGER NOT NULL DEFAULT 0 CHECK (likes_count >= 0),
                comments_count  INTEGER NOT NULL DEFAULT 0 CHECK (comments_count >= 0),
                created_at      TEXT NOT NULL DEFAULT {NOW},
                updated_at      TEXT NOT NULL DEFAULT {NOW}
            );

            CREATE INDEX idx_whispers_created ON whispers(created_at);
            CREATE INDEX idx_whispers_category ON whispers(category, created_at);

            CREATE TABLE comments (
                id              TEXT PRIMARY KEY,
                whisper_id      TEXT NOT NULL REFERENCES whispers(id) ON DELETE CASCADE,
                user_id         TEXT NOT NULL REFERENCES users(id),
                content         TEXT NOT NULL,
                is_anonymous    INTEGER NOT NULL DEFAULT 1,
                likes_count     INTEGER NOT NULL DEFAULT 0 CHECK (likes_count >= 0),
                created_at      TEXT NOT NULL DEFAULT {NOW}
            );

            CREATE INDEX idx_comments_whisper ON comments(whisper_id, created_at);

            CREATE TABLE whisper_likes (
                id          TEXT PRIMARY KEY,
                whisper_id  TEXT NOT NULL REFERENCES whispers(id) ON DELETE CASCADE,
                user_id     TEXT NOT NULL REFERENCES users(id),
                created_at  TEXT NOT NULL DEFAULT {NOW},
                UNIQUE(whisper_id, user_id)
            );

            CREATE TABLE comment_likes (
                id          TEXT PRIMARY KEY,
                comment_id  TEXT NOT NULL REFERENCES comments(id) ON DELETE CASCADE,
                user_id     TEXT NOT NULL REFERENCES users(id),
                created_at  TEXT NOT NULL DEFAULT {NOW},
                UNIQUE(comment_id, user_id)
            );

            CREATE TABLE search_history (
                id          TEXT PRIMARY KEY,
                user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                search_term TEXT NOT NULL,
                category    TEXT,
                created_at  TEXT NOT NULL DEFAULT {NOW}
            );

            CREATE INDEX idx_search_history_user ON search_history(user_id, created_at);

            INSERT INTO schema_version (version) VALUES (1);

            COMMIT;
            "
        ))?;
    }

    info!("Database migrations complete");
    Ok(())
}
