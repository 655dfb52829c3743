// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedded schema migrations, applied automatically on database open.

use parley_core::ParleyError;

mod embedded {
    use refinery::embed_migrations;
    embed_migrations!("migrations");
}

/// Applies every pending migration. Refinery records applied versions in
/// `refinery_schema_history`, so repeated runs are no-ops.
pub fn run_migrations(conn: &mut rusqlite::Connection) -> Result<(), ParleyError> {
    let report = embedded::migrations::runner()
        .run(conn)
        .map_err(|e| ParleyError::Storage {
            source: Box::new(e),
        })?;
    for migration in report.applied_migrations() {
        tracing::info!(version = migration.version(), name = migration.name(), "applied migration");
    }
    Ok(())
}
