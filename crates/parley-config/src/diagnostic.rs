// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Figment-to-miette error bridge with fuzzy match suggestions.
//!
//! Converts Figment deserialization errors into miette diagnostics with
//! source spans, valid key listings, and "did you mean?" suggestions
//! using Jaro-Winkler string similarity.

#![allow(unused_assignments)] // miette's Diagnostic derive generates code triggering this lint

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// Minimum Jaro-Winkler similarity score to suggest a correction.
/// 0.75 catches typos like `concurency` -> `concurrency` and
/// `max_request` -> `max_requests` without suggesting unrelated keys.
const SUGGESTION_THRESHOLD: f64 = 0.75;

/// Prefix of environment variables that override `parley.toml`.
const ENV_PREFIX: &str = "PARLEY_";

/// A configuration error with rich diagnostic information.
///
/// Each variant carries enough context for miette to point at the offending
/// line of `parley.toml`, or at the `PARLEY_*` variable when the value came
/// from the environment.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    /// An unknown key was found in the configuration.
    #[error("unknown configuration key `{key}`")]
    #[diagnostic(
        code(parley::config::unknown_key),
        help(
            "{}",
            format_unknown_key_help(
                suggestion.as_deref(),
                section.as_deref(),
                valid_keys,
                env_var.as_deref()
            )
        )
    )]
    UnknownKey {
        /// The unrecognized key name.
        key: String,
        /// Suggested correction via fuzzy matching, if any.
        suggestion: Option<String>,
        /// Table holding the key, `None` at the top level.
        section: Option<String>,
        /// Valid keys for that table, comma separated.
        valid_keys: String,
        /// Variable that would have set the key, when no TOML source has it.
        env_var: Option<String>,
        #[label("this key is not recognized")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    /// A configuration value has the wrong type.
    #[error("invalid type for key `{key}`: {detail}")]
    #[diagnostic(code(parley::config::invalid_type), help("expected {expected}"))]
    InvalidType {
        /// Dotted path of the key, e.g. `gateway.port`.
        key: String,
        detail: String,
        expected: String,
        #[label("wrong type here")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    /// A required configuration key is missing.
    #[error("missing required key `{key}`")]
    #[diagnostic(
        code(parley::config::missing_key),
        help("add `{key} = <value>` to parley.toml or set `{env_var}`")
    )]
    MissingKey { key: String, env_var: String },

    /// A semantic constraint on a value was violated.
    #[error("validation error: {message}")]
    #[diagnostic(code(parley::config::validation))]
    Validation { message: String },

    /// Catch-all for other configuration errors.
    #[error("configuration error: {0}")]
    #[diagnostic(code(parley::config::other))]
    Other(String),
}

fn format_unknown_key_help(
    suggestion: Option<&str>,
    section: Option<&str>,
    valid_keys: &str,
    env_var: Option<&str>,
) -> String {
    let mut help = match suggestion {
        Some(s) => format!("did you mean `{s}`? "),
        None => String::new(),
    };
    match section {
        Some(section) => help.push_str(&format!("valid keys in [{section}]: {valid_keys}")),
        None => help.push_str(&format!("valid sections: {valid_keys}")),
    }
    if let Some(var) = env_var {
        help.push_str(&format!("; check the `{var}` environment variable"));
    }
    help
}

/// Environment variable that maps onto `path.field`.
///
/// The inverse of the loader's `PARLEY_<SECTION>_<KEY>` mapping, e.g.
/// `["rate_limit"]` and `max_requests` give `PARLEY_RATE_LIMIT_MAX_REQUESTS`.
pub fn env_var_name(path: &[String], field: &str) -> String {
    let mut name = ENV_PREFIX.to_string();
    for part in path.iter().map(String::as_str).chain(std::iter::once(field)) {
        if name.len() > ENV_PREFIX.len() {
            name.push('_');
        }
        name.push_str(&part.to_ascii_uppercase());
    }
    name
}

/// Convert a `figment::Error` into a list of `ConfigError` diagnostics.
///
/// A figment error may carry several underlying errors; each becomes one
/// diagnostic. Unknown keys get a fuzzy-matched suggestion, and both unknown
/// keys and mistyped values are located in `toml_sources` when possible.
pub fn figment_to_config_errors(
    err: figment::Error,
    toml_sources: &[(String, String)],
) -> Vec<ConfigError> {
    use figment::error::Kind;

    let mut errors = Vec::new();

    for error in err {
        let path: Vec<String> = error.path.clone();
        let config_error = match &error.kind {
            Kind::UnknownField(field, expected) => {
                let valid_keys: Vec<&str> = expected.to_vec();
                let suggestion = suggest_key(field, &valid_keys);
                let (span, src) = find_source_span(&error, &path, field, toml_sources);
                // Not in any file we read, so it most likely came from the environment.
                let env_var = span.is_none().then(|| env_var_name(&path, field));

                ConfigError::UnknownKey {
                    key: field.clone(),
                    suggestion,
                    section: path.first().cloned(),
                    valid_keys: valid_keys.join(", "),
                    env_var,
                    span,
                    src,
                }
            }
            Kind::MissingField(field) => ConfigError::MissingKey {
                key: field.to_string(),
                env_var: env_var_name(&path, field),
            },
            Kind::InvalidType(actual, expected) => {
                let (section, field) = match path.split_last() {
                    Some((field, section)) => (section, field.as_str()),
                    None => (&path[..], ""),
                };
                let (span, src) = if field.is_empty() {
                    (None, None)
                } else {
                    find_source_span(&error, section, field, toml_sources)
                };
                ConfigError::InvalidType {
                    key: path.join("."),
                    detail: format!("found {actual}, expected {expected}"),
                    expected: expected.to_string(),
                    span,
                    src,
                }
            }
            _ => ConfigError::Other(format!("{error}")),
        };

        errors.push(config_error);
    }

    errors
}

/// Locates `field` under the `section` table in the source that produced
/// `error`.
fn find_source_span(
    error: &figment::error::Error,
    section: &[String],
    field: &str,
    toml_sources: &[(String, String)],
) -> (Option<SourceSpan>, Option<NamedSource<String>>) {
    let source_path = error
        .metadata
        .as_ref()
        .and_then(|m| m.source.as_ref())
        .and_then(|s| match s {
            figment::Source::File(path) => Some(path.display().to_string()),
            _ => None,
        });

    // Inline sources have no file path; fall back to the only source given.
    let source = match source_path {
        Some(path) => toml_sources
            .iter()
            .find(|(p, _)| *p == path)
            .map(|(p, content)| (p.as_str(), content.as_str())),
        None if toml_sources.len() == 1 => toml_sources
            .first()
            .map(|(p, content)| (p.as_str(), content.as_str())),
        None => None,
    };

    if let Some((path, content)) = source
        && let Some(offset) = find_key_offset(content, section, field)
    {
        let span = SourceSpan::new(offset.into(), field.len());
        let named = NamedSource::new(path, content.to_string());
        return (Some(span), Some(named));
    }

    (None, None)
}

/// Find the byte offset of a key in TOML content, relative to a section path.
///
/// For `path = ["worker"]` and `field = "concurency"`, finds the `[worker]`
/// header then searches for `concurency` after it. Top-level keys are
/// searched from the start of the file.
pub fn find_key_offset(content: &str, path: &[String], field: &str) -> Option<usize> {
    let search_start = match path.first() {
        None => 0,
        Some(section) => {
            let header = format!("[{section}]");
            content.find(&header).map(|pos| pos + header.len())?
        }
    };

    let remaining = &content[search_start..];

    let mut byte_offset = 0;
    for line in remaining.lines() {
        let trimmed = line.trim_start();
        if let Some(after) = trimmed.strip_prefix(field)
            && (after.starts_with(' ') || after.starts_with('=') || after.starts_with('\t'))
        {
            let field_start_in_line = line.len() - trimmed.len();
            return Some(search_start + byte_offset + field_start_in_line);
        }
        byte_offset += line.len() + 1;
    }

    None
}

/// Suggest a similar key name using Jaro-Winkler string similarity.
///
/// Returns the best match above the similarity threshold, or `None` if
/// no valid key is close enough to the unknown key.
pub fn suggest_key(unknown: &str, valid_keys: &[&str]) -> Option<String> {
    let mut best_score = SUGGESTION_THRESHOLD;
    let mut best_match = None;

    for &key in valid_keys {
        let score = strsim::jaro_winkler(unknown, key);
        if score > best_score {
            best_score = score;
            best_match = Some(key.to_string());
        }
    }

    best_match
}

/// Render a list of `ConfigError`s to stderr using miette's graphical handler.
pub fn render_errors(errors: &[ConfigError]) {
    use miette::GraphicalReportHandler;

    let handler = GraphicalReportHandler::new();
    for error in errors {
        let mut buf = String::new();
        let diagnostic: &dyn Diagnostic = error;
        if handler.render_report(&mut buf, diagnostic).is_ok() {
            eprint!("{buf}");
        } else {
            eprintln!("Error: {error}");
        }
    }
}
