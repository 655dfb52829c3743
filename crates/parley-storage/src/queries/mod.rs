// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed query functions over the shared [`Database`](crate::Database).

pub mod conversations;
pub mod jobs;
pub mod knowledge;
pub mod messages;

/// Formats a signed SQLite date modifier such as `+2.500 seconds`.
pub(crate) fn seconds_modifier(sign: char, duration: std::time::Duration) -> String {
    format!("{sign}{:.3} seconds", duration.as_secs_f64())
}
