// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Append-only message log per conversation.

use std::str::FromStr;

use parley_core::ParleyError;
use parley_core::types::{Role, StoredMessage};
use rusqlite::params;
use rusqlite::types::Type;

use crate::database::Database;

/// Appends a message and returns its generated id.
pub async fn insert_message(
    db: &Database,
    conversation_id: &str,
    role: Role,
    content: &str,
) -> Result<String, ParleyError> {
    let id = uuid::Uuid::new_v4().to_string();
    let conversation_id = conversation_id.to_string();
    let content = content.to_string();
    let role = role.to_string();
    db.connection()
        .call(move |conn| -> Result<String, rusqlite::Error> {
            conn.execute(
                "INSERT INTO messages (id, conversation_id, role, content) VALUES (?1, ?2, ?3, ?4)",
                params![id, conversation_id, role, content],
            )?;
            Ok(id)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Lists messages oldest first. With `limit`, keeps only the most recent ones.
pub async fn list_messages(
    db: &Database,
    conversation_id: &str,
    limit: Option<usize>,
) -> Result<Vec<StoredMessage>, ParleyError> {
    let conversation_id = conversation_id.to_string();
    // SQLite treats a negative LIMIT as unbounded.
    let limit = limit.map_or(-1, |n| i64::try_from(n).unwrap_or(i64::MAX));
    db.connection()
        .call(move |conn| -> Result<Vec<StoredMessage>, rusqlite::Error> {
            let mut stmt = conn.prepare(
                "SELECT id, conversation_id, role, content, created_at FROM (
                     SELECT seq, id, conversation_id, role, content, created_at
                     FROM messages
                     WHERE conversation_id = ?1
                     ORDER BY seq DESC
                     LIMIT ?2
                 ) ORDER BY seq ASC",
            )?;
            let rows = stmt.query_map(params![conversation_id, limit], |row| {
                let role: String = row.get(2)?;
                let role = Role::from_str(&role).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e))
                })?;
                Ok(StoredMessage {
                    id: row.get(0)?,
                    conversation_id: row.get(1)?,
                    role,
                    content: row.get(3)?,
                    created_at: row.get(4)?,
                })
            })?;
            rows.collect()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::conversations::resolve_or_create;
    use tempfile::tempdir;

    async fn setup() -> (Database, tempfile::TempDir, String) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("messages.db");
        let db = Database::open(path.to_str().unwrap()).await.unwrap();
        let conversation = resolve_or_create(&db, "session-1").await.unwrap();
        (db, dir, conversation)
    }

    #[tokio::test]
    async fn messages_come_back_in_insertion_order() {
        let (db, _dir, conv) = setup().await;

        insert_message(&db, &conv, Role::User, "Hello").await.unwrap();
        insert_message(&db, &conv, Role::Assistant, "Hi there!").await.unwrap();
        insert_message(&db, &conv, Role::User, "Thanks").await.unwrap();

        let all = list_messages(&db, &conv, None).await.unwrap();
        let contents: Vec<&str> = all.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["Hello", "Hi there!", "Thanks"]);
        assert_eq!(all[1].role, Role::Assistant);
        assert!(all.iter().all(|m| m.conversation_id == conv));
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn limit_keeps_most_recent_oldest_first() {
        let (db, _dir, conv) = setup().await;

        for i in 0..5 {
            insert_message(&db, &conv, Role::User, &format!("m{i}")).await.unwrap();
        }

        let recent = list_messages(&db, &conv, Some(2)).await.unwrap();
        let contents: Vec<&str> = recent.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["m3", "m4"]);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn unknown_conversation_is_empty() {
        let (db, _dir, _conv) = setup().await;
        assert!(list_messages(&db, "nope", None).await.unwrap().is_empty());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn foreign_key_rejects_orphans() {
        let (db, _dir, _conv) = setup().await;
        let result = insert_message(&db, "missing-conversation", Role::User, "x").await;
        assert!(matches!(result, Err(ParleyError::Storage { .. })));
        db.close().await.unwrap();
    }
}
