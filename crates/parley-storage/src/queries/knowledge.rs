// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Knowledge snippets used to augment prompts.

use parley_core::ParleyError;
use rusqlite::params;

use crate::database::Database;

/// Words shorter than this carry too little signal to search on.
const MIN_TERM_CHARS: usize = 4;

/// Upper bound on terms per search, keeping the statement small.
const MAX_TERMS: usize = 8;

/// Stores a snippet and returns its row id.
pub async fn insert_snippet(
    db: &Database,
    text: &str,
    metadata: Option<&str>,
) -> Result<i64, ParleyError> {
    let text = text.to_string();
    let metadata = metadata.map(str::to_string);
    db.connection()
        .call(move |conn| -> Result<i64, rusqlite::Error> {
            conn.execute(
                "INSERT INTO knowledge (text, metadata) VALUES (?1, ?2)",
                params![text, metadata],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Splits a free-form query into distinct, lowercased search terms.
pub fn search_terms(query: &str) -> Vec<String> {
    let mut terms: Vec<String> = Vec::new();
    for word in query.split(|c: char| !c.is_alphanumeric()) {
        if word.chars().count() < MIN_TERM_CHARS {
            continue;
        }
        let word = word.to_lowercase();
        if !terms.contains(&word) {
            terms.push(word);
        }
        if terms.len() == MAX_TERMS {
            break;
        }
    }
    terms
}

/// Returns up to `limit` snippets containing any significant word of `query`.
///
/// Snippets matching more terms rank first; ties keep insertion order.
pub async fn search_snippets(
    db: &Database,
    query: &str,
    limit: usize,
) -> Result<Vec<String>, ParleyError> {
    let terms = search_terms(query);
    if terms.is_empty() || limit == 0 {
        return Ok(Vec::new());
    }

    let score = (1..=terms.len())
        .map(|i| format!("(instr(lower(text), ?{i}) > 0)"))
        .collect::<Vec<_>>()
        .join(" + ");
    let sql = format!(
        "SELECT text FROM (SELECT id, text, {score} AS score FROM knowledge)
         WHERE score > 0
         ORDER BY score DESC, id ASC
         LIMIT {limit}"
    );

    db.connection()
        .call(move |conn| -> Result<Vec<String>, rusqlite::Error> {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(rusqlite::params_from_iter(terms.iter()), |row| row.get(0))?;
            rows.collect()
        })
        .await
        .map_err(crate::database::map_tr_err)
}
