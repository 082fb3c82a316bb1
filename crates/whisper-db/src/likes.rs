use anyhow::Result;
use rusqlite::{Transaction, TransactionBehavior};
use uuid::Uuid;
use whisper_types::models::{LikeState, LikeTarget};

use crate::{Database, OptionalExt, placeholders};

/// Table layout behind each kind of like.
trait LikeTables {
    fn parent_table(self) -> &'static str;
    fn like_table(self) -> &'static str;
    fn target_column(self) -> &'static str;
}

impl LikeTables for LikeTarget {
    fn parent_table(self) -> &'static str {
        match self {
            Self::Whisper => "whispers",
            Self::Comment => "comments",
        }
    }

    fn like_table(self) -> &'static str {
        match self {
            Self::Whisper => "whisper_likes",
            Self::Comment => "comment_likes",
        }
    }

    fn target_column(self) -> &'static str {
        match self {
            Self::Whisper => "whisper_id",
            Self::Comment => "comment_id",
        }
    }
}

impl Database {
    /// Sets membership of `user_id` in the target's likes to `liked`.
    ///
    /// The like row and the parent's `likes_count` change in one transaction,
    /// and the counter only moves when a row was actually inserted or removed,
    /// so repeating a like or an unlike is a no-op. Returns `None` when the
    /// target does not exist.
    pub fn set_like(
        &self,
        target: LikeTarget,
        target_id: &str,
        user_id: &str,
        liked: bool,
    ) -> Result<Option<LikeState>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let state = apply_like(&tx, target, target_id, user_id, liked)?;
            tx.commit()?;
            Ok(state)
        })
    }

    /// Flips membership of `user_id` in the target's likes. The current
    /// membership is read inside the same transaction as the write.
    pub fn toggle_like(&self, target: LikeTarget, target_id: &str, user_id: &str) -> Result<Option<LikeState>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let liked = is_liked(&tx, target, target_id, user_id)?;
            let state = apply_like(&tx, target, target_id, user_id, !liked)?;
            tx.commit()?;
            Ok(state)
        })
    }

    /// Batch membership lookup: which of `target_ids` has `user_id` liked.
    pub fn liked_ids(&self, target: LikeTarget, user_id: &str, target_ids: &[String]) -> Result<Vec<String>> {
        if target_ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {col} FROM {table} WHERE user_id = ?1 AND {col} IN ({})",
                placeholders(2, target_ids.len()),
                col = target.target_column(),
                table = target.like_table(),
            );

            let mut stmt = conn.prepare(&sql)?;
            let mut params: Vec<&dyn rusqlite::types::ToSql> = Vec::with_capacity(target_ids.len() + 1);
            params.push(&user_id);
            params.extend(target_ids.iter().map(|id| id as &dyn rusqlite::types::ToSql));

            let rows = stmt
                .query_map(params.as_slice(), |row| row.get(0))?
                .collect::<std::result::Result<Vec<String>, _>>()?;

            Ok(rows)
        })
    }

    /// Recomputes every stored counter from the relation rows.
    /// Returns how many parent rows had drifted and were corrected.
    pub fn reconcile_counters(&self) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let mut fixed = 0;

            for (table, counter, source) in [
                ("whispers", "likes_count", "SELECT COUNT(*) FROM whisper_likes l WHERE l.whisper_id = whispers.id"),
                ("whispers", "comments_count", "SELECT COUNT(*) FROM comments c WHERE c.whisper_id = whispers.id"),
                ("comments", "likes_count", "SELECT COUNT(*) FROM comment_likes l WHERE l.comment_id = comments.id"),
            ] {
                fixed += tx.execute(
                    &format!("UPDATE {table} SET {counter} = ({source}) WHERE {counter} != ({source})"),
                    [],
                )?;
            }

            tx.commit()?;
            Ok(fixed)
        })
    }
}

fn is_liked(tx: &Transaction<'_>, target: LikeTarget, target_id: &str, user_id: &str) -> Result<bool> {
    let found = tx
        .query_row(
            &format!(
                "SELECT 1 FROM {} WHERE {} = ?1 AND user_id = ?2",
                target.like_table(),
                target.target_column()
            ),
            [target_id, user_id],
            |_| Ok(()),
        )
        .optional()?;
    Ok(found.is_some())
}

fn apply_like(
    tx: &Transaction<'_>,
    target: LikeTarget,
    target_id: &str,
    user_id: &str,
    liked: bool,
) -> Result<Option<LikeState>> {
    let parent = target.parent_table();
    let exists = tx
        .query_row(&format!("SELECT 1 FROM {parent} WHERE id = ?1"), [target_id], |_| Ok(()))
        .optional()?
        .is_some();
    if !exists {
        return Ok(None);
    }

    let changed = if liked {
        tx.execute(
            &format!(
                "INSERT OR IGNORE INTO {} (id, {}, user_id) VALUES (?1, ?2, ?3)",
                target.like_table(),
                target.target_column()
            ),
            (Uuid::new_v4().to_string(), target_id, user_id),
        )?
    } else {
        tx.execute(
            &format!(
                "DELETE FROM {} WHERE {} = ?1 AND user_id = ?2",
                target.like_table(),
                target.target_column()
            ),
            [target_id, user_id],
        )?
    };

    if changed > 0 {
        let adjust = if liked { "likes_count + 1" } else { "MAX(0, likes_count - 1)" };
        tx.execute(&format!("UPDATE {parent} SET likes_count = {adjust} WHERE id = ?1"), [target_id])?;
    }

    let likes_count: u32 =
        tx.query_row(&format!("SELECT likes_count FROM {parent} WHERE id = ?1"), [target_id], |r| r.get(0))?;

    Ok(Some(LikeState { liked, likes_count }))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;
    use crate::queries::tests::{user, whisper};
    use whisper_types::models::Category;

    fn like_rows(db: &Database, whisper_id: &str) -> u32 {
        db.with_conn(|conn| {
            Ok(conn.query_row(
                "SELECT COUNT(*) FROM whisper_likes WHERE whisper_id = ?1",
                [whisper_id],
                |r| r.get(0),
            )?)
        })
        .unwrap()
    }

    #[test]
    fn like_then_unlike_round_trips_counter() {
        let db = Database::open_in_memory().unwrap();
        let a = user(&db, "a@example.com");
        let b = user(&db, "b@example.com");
        let w = whisper(&db, &a, "test", Category::General);

        let liked = db.set_like(LikeTarget::Whisper, &w, &b, true).unwrap().unwrap();
        assert_eq!(liked, LikeState { liked: true, likes_count: 1 });
        assert_eq!(like_rows(&db, &w), 1);

        let unliked = db.set_like(LikeTarget::Whisper, &w, &b, false).unwrap().unwrap();
        assert_eq!(unliked, LikeState { liked: false, likes_count: 0 });
        assert_eq!(like_rows(&db, &w), 0);
    }

    #[test]
    fn repeated_set_is_idempotent() {
        let db = Database::open_in_memory().unwrap();
        let a = user(&db, "a@example.com");
        let w = whisper(&db, &a, "test", Category::General);

        db.set_like(LikeTarget::Whisper, &w, &a, true).unwrap();
        let again = db.set_like(LikeTarget::Whisper, &w, &a, true).unwrap().unwrap();
        assert_eq!(again.likes_count, 1);

        db.set_like(LikeTarget::Whisper, &w, &a, false).unwrap();
        let again = db.set_like(LikeTarget::Whisper, &w, &a, false).unwrap().unwrap();
        assert_eq!(again, LikeState { liked: false, likes_count: 0 });
    }

    #[test]
    fn unlike_never_drives_counter_negative() {
        let db = Database::open_in_memory().unwrap();
        let a = user(&db, "a@example.com");
        let b = user(&db, "b@example.com");
        let w = whisper(&db, &a, "test", Category::General);

        // A like row whose counter update was lost
        db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO whisper_likes (id, whisper_id, user_id) VALUES ('x', ?1, ?2)",
                [&w, &b],
            )?;
            Ok(())
        })
        .unwrap();

        let state = db.set_like(LikeTarget::Whisper, &w, &b, false).unwrap().unwrap();
        assert_eq!(state.likes_count, 0);
    }

    #[test]
    fn toggle_parity_decides_membership() {
        let db = Database::open_in_memory().unwrap();
        let a = user(&db, "a@example.com");
        let w = whisper(&db, &a, "test", Category::General);

        for n in 1..=7u32 {
            let state = db.toggle_like(LikeTarget::Whisper, &w, &a).unwrap().unwrap();
            assert_eq!(state.liked, n % 2 == 1);
            assert_eq!(state.likes_count, like_rows(&db, &w));
        }
    }

    #[test]
    fn missing_target_is_none() {
        let db = Database::open_in_memory().unwrap();
        let a = user(&db, "a@example.com");
        assert!(db.set_like(LikeTarget::Whisper, "nope", &a, true).unwrap().is_none());
        assert!(db.toggle_like(LikeTarget::Comment, "nope", &a).unwrap().is_none());
    }

    #[test]
    fn concurrent_toggles_keep_counter_consistent() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let author = user(&db, "author@example.com");
        let w = whisper(&db, &author, "race", Category::General);
        let users: Vec<String> = (0..8).map(|i| user(&db, &format!("u{}@example.com", i))).collect();

        let handles: Vec<_> = users
            .into_iter()
            .enumerate()
            .map(|(i, uid)| {
                let db = db.clone();
                let w = w.clone();
                thread::spawn(move || {
                    // Odd-indexed users end liked, even-indexed users end unliked
                    for _ in 0..(10 + i % 2) {
                        db.toggle_like(LikeTarget::Whisper, &w, &uid).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let row = db.get_whisper(&w).unwrap().unwrap();
        assert_eq!(like_rows(&db, &w), 4);
        assert_eq!(row.likes_count, 4);
    }

    #[test]
    fn comment_likes_and_batch_lookup() {
        let db = Database::open_in_memory().unwrap();
        let a = user(&db, "a@example.com");
        let w1 = whisper(&db, &a, "one", Category::General);
        let w2 = whisper(&db, &a, "two", Category::General);
        let c = db
            .insert_comment(&Uuid::new_v4().to_string(), &w1, &a, "nice", true)
            .unwrap()
            .unwrap();

        let state = db.set_like(LikeTarget::Comment, &c.id, &a, true).unwrap().unwrap();
        assert_eq!(state.likes_count, 1);

        db.set_like(LikeTarget::Whisper, &w2, &a, true).unwrap();
        let liked = db
            .liked_ids(LikeTarget::Whisper, &a, &[w1.clone(), w2.clone()])
            .unwrap();
        assert_eq!(liked, vec![w2]);
        assert_eq!(db.liked_ids(LikeTarget::Comment, &a, &[c.id.clone()]).unwrap(), vec![c.id]);
        assert!(db.liked_ids(LikeTarget::Whisper, &a, &[]).unwrap().is_empty());
    }

    #[test]
    fn reconcile_repairs_drifted_counters() {
        let db = Database::open_in_memory().unwrap();
        let a = user(&db, "a@example.com");
        let w = whisper(&db, &a, "drift", Category::General);
        db.set_like(LikeTarget::Whisper, &w, &a, true).unwrap();
        db.insert_comment(&Uuid::new_v4().to_string(), &w, &a, "c", true).unwrap();

        db.with_conn(|conn| {
            conn.execute(
                "UPDATE whispers SET likes_count = 9, comments_count = 0 WHERE id = ?1",
                [&w],
            )?;
            Ok(())
        })
        .unwrap();

        assert_eq!(db.reconcile_counters().unwrap(), 2);
        let row = db.get_whisper(&w).unwrap().unwrap();
        assert_eq!(row.likes_count, 1);
        assert_eq!(row.comments_count, 1);
        assert_eq!(db.reconcile_counters().unwrap(), 0);
    }
}
