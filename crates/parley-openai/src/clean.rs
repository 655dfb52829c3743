// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Strips model reasoning markup from replies.

use std::sync::LazyLock;

use regex::Regex;

static REASONING_BLOCKS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?is)<think>.*?</think>|<reasoning>.*?</reasoning>|<internal>.*?</internal>|<thought>.*?</thought>|\[REASONING\].*?\[/REASONING\]|\[THINKING\].*?\[/THINKING\]",
    )
    .expect("reasoning block pattern is valid")
});

static ANY_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("tag pattern is valid"));

/// Removes reasoning blocks and any leftover tags, then trims.
///
/// If nothing survives, the trimmed original is returned instead so a reply
/// is never blanked out by cleaning alone.
pub fn clean_response(content: &str) -> String {
    let without_blocks = REASONING_BLOCKS.replace_all(content, "");
    let without_tags = ANY_TAG.replace_all(&without_blocks, "");
    let cleaned = without_tags.trim();
    if cleaned.is_empty() {
        content.trim().to_string()
    } else {
        cleaned.to_string()
    }
}
