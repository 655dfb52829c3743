// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation lookup keyed by session id.

use parley_core::ParleyError;
use parley_core::types::Conversation;
use rusqlite::{OptionalExtension, params};

use crate::database::Database;

/// Returns the conversation id for `session_id`, creating the row if absent.
///
/// The insert and the lookup share one transaction, so two concurrent
/// callers for the same session always observe the same id.
pub async fn resolve_or_create(db: &Database, session_id: &str) -> Result<String, ParleyError> {
    let session_id = session_id.to_string();
    let candidate = uuid::Uuid::new_v4().to_string();
    db.connection()
        .call(move |conn| -> Result<String, rusqlite::Error> {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO conversations (id, session_id) VALUES (?1, ?2)
                 ON CONFLICT(session_id) DO NOTHING",
                params![candidate, session_id],
            )?;
            let id: String = tx.query_row(
                "SELECT id FROM conversations WHERE session_id = ?1",
                params![session_id],
                |row| row.get(0),
            )?;
            tx.commit()?;
            Ok(id)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Looks up the conversation for `session_id` without creating one.
pub async fn find_by_session(
    db: &Database,
    session_id: &str,
) -> Result<Option<Conversation>, ParleyError> {
    let session_id = session_id.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<Conversation>, rusqlite::Error> {
            conn.query_row(
                "SELECT id, session_id, created_at FROM conversations WHERE session_id = ?1",
                params![session_id],
                |row| {
                    Ok(Conversation {
                        id: row.get(0)?,
                        session_id: row.get(1)?,
                        created_at: row.get(2)?,
                    })
                },
            )
            .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn setup() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("conversations.db");
        let db = Database::open(path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    #[tokio::test]
    async fn resolve_is_idempotent_per_session() {
        let (db, _dir) = setup().await;

        let first = resolve_or_create(&db, "session-a").await.unwrap();
        let second = resolve_or_create(&db, "session-a").await.unwrap();
        let other = resolve_or_create(&db, "session-b").await.unwrap();

        assert_eq!(first, second);
        assert_ne!(first, other);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn concurrent_resolves_agree() {
        let (db, _dir) = setup().await;

        let mut handles = Vec::new();
        for _ in 0..8 {
            let db = db.clone();
            handles.push(tokio::spawn(async move {
                resolve_or_create(&db, "racy").await.unwrap()
            }));
        }
        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap());
        }
        ids.dedup();
        assert_eq!(ids.len(), 1);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn find_does_not_create() {
        let (db, _dir) = setup().await;

        assert!(find_by_session(&db, "ghost").await.unwrap().is_none());
        let id = resolve_or_create(&db, "ghost").await.unwrap();
        let found = find_by_session(&db, "ghost").await.unwrap().unwrap();
        assert_eq!(found.id, id);
        assert_eq!(found.session_id, "ghost");
        assert!(found.created_at.ends_with('Z'));
        db.close().await.unwrap();
    }
}
