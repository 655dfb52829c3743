// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Parley chat service.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::time::Duration;

use parley_core::RetentionPolicy;
use serde::{Deserialize, Serialize};

/// Top-level Parley configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ParleyConfig {
    /// Chat behaviour: prompts, limits, wait timing.
    #[serde(default)]
    pub agent: AgentConfig,

    /// HTTP listener settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Per-caller admission control.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Job retry and retention settings.
    #[serde(default)]
    pub queue: QueueConfig,

    /// Worker pool sizing and throughput.
    #[serde(default)]
    pub worker: WorkerConfig,

    /// Chat-completions provider settings.
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Prompt context augmentation.
    #[serde(default)]
    pub retrieval: RetrievalConfig,
}

/// Chat behaviour configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    /// Display name of the service.
    #[serde(default = "default_agent_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Inline system prompt string. Overridden by `system_prompt_file` if both set.
    #[serde(default)]
    pub system_prompt: Option<String>,

    /// Path to a file containing the system prompt.
    #[serde(default)]
    pub system_prompt_file: Option<String>,

    /// Longest accepted user message, in characters, after trimming.
    #[serde(default = "default_max_message_chars")]
    pub max_message_chars: usize,

    /// Replies longer than this are cut and suffixed with `...`.
    #[serde(default = "default_max_reply_chars")]
    pub max_reply_chars: usize,

    /// Number of prior messages included in each prompt.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    /// Upper bound on a synchronous chat request's wait for its job.
    #[serde(default = "default_wait_timeout_secs")]
    pub wait_timeout_secs: u64,

    /// Interval between job state checks while waiting.
    #[serde(default = "default_wait_poll_interval_ms")]
    pub wait_poll_interval_ms: u64,
}

impl AgentConfig {
    pub fn wait_timeout(&self) -> Duration {
        Duration::from_secs(self.wait_timeout_secs)
    }

    pub fn wait_poll_interval(&self) -> Duration {
        Duration::from_millis(self.wait_poll_interval_ms)
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: default_agent_name(),
            log_level: default_log_level(),
            system_prompt: None,
            system_prompt_file: None,
            max_message_chars: default_max_message_chars(),
            max_reply_chars: default_max_reply_chars(),
            history_limit: default_history_limit(),
            wait_timeout_secs: default_wait_timeout_secs(),
            wait_poll_interval_ms: default_wait_poll_interval_ms(),
        }
    }
}

fn default_agent_name() -> String {
    "parley".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_message_chars() -> usize {
    5000
}

fn default_max_reply_chars() -> usize {
    10_000
}

fn default_history_limit() -> usize {
    20
}

fn default_wait_timeout_secs() -> u64 {
    60
}

fn default_wait_poll_interval_ms() -> u64 {
    500
}

/// HTTP gateway configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Host address to bind.
    #[serde(default = "default_gateway_host")]
    pub host: String,

    /// Port to bind.
    #[serde(default = "default_gateway_port")]
    pub port: u16,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_gateway_host(),
            port: default_gateway_port(),
        }
    }
}

fn default_gateway_host() -> String {
    "0.0.0.0".to_string()
}

fn default_gateway_port() -> u16 {
    3000
}

/// Fixed-window rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RateLimitConfig {
    /// When false every request is admitted.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Requests admitted per key per window.
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,

    /// Window length; also the retry hint sent on denial.
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_requests: default_max_requests(),
            window_secs: default_window_secs(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_max_requests() -> u32 {
    30
}

fn default_window_secs() -> u64 {
    60
}

/// Job retry and retention configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct QueueConfig {
    /// Attempts per job, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the second attempt; doubles for each further attempt.
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    #[serde(default = "default_completed_retention_secs")]
    pub completed_retention_secs: u64,

    /// Completed jobs kept regardless of age.
    #[serde(default = "default_completed_retention_count")]
    pub completed_retention_count: u64,

    #[serde(default = "default_failed_retention_secs")]
    pub failed_retention_secs: u64,

    /// How often the retention sweeper runs.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// Seconds a job may stay active before the sweeper requeues it.
    #[serde(default = "default_stall_timeout_secs")]
    pub stall_timeout_secs: u64,
}

impl QueueConfig {
    pub fn retention(&self) -> RetentionPolicy {
        RetentionPolicy {
            completed_max_age: Duration::from_secs(self.completed_retention_secs),
            completed_max_count: self.completed_retention_count,
            failed_max_age: Duration::from_secs(self.failed_retention_secs),
        }
    }

    pub fn stall_timeout(&self) -> Duration {
        Duration::from_secs(self.stall_timeout_secs)
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
            completed_retention_secs: default_completed_retention_secs(),
            completed_retention_count: default_completed_retention_count(),
            failed_retention_secs: default_failed_retention_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
            stall_timeout_secs: default_stall_timeout_secs(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_base_ms() -> u64 {
    2000
}

fn default_completed_retention_secs() -> u64 {
    3600
}

fn default_completed_retention_count() -> u64 {
    100
}

fn default_failed_retention_secs() -> u64 {
    24 * 3600
}

fn default_sweep_interval_secs() -> u64 {
    60
}

fn default_stall_timeout_secs() -> u64 {
    300
}

/// Worker pool configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WorkerConfig {
    /// Maximum jobs processed at the same time.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Maximum job starts per throughput window, across the whole pool.
    #[serde(default = "default_max_starts")]
    pub max_starts: u32,

    #[serde(default = "default_throughput_window_ms")]
    pub throughput_window_ms: u64,

    /// Idle delay between queue checks when nothing is ready.
    #[serde(default = "default_worker_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            max_starts: default_max_starts(),
            throughput_window_ms: default_throughput_window_ms(),
            poll_interval_ms: default_worker_poll_interval_ms(),
        }
    }
}

fn default_concurrency() -> usize {
    5
}

fn default_max_starts() -> u32 {
    10
}

fn default_throughput_window_ms() -> u64 {
    1000
}

fn default_worker_poll_interval_ms() -> u64 {
    100
}

/// OpenAI-compatible chat completions provider configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    /// API key. Falls back to the `CEREBRAS_API_KEY` environment variable.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Base URL; `/chat/completions` is appended.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_top_p")]
    pub top_p: f32,

    /// Per-request HTTP timeout.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Send a tiny request at startup and log whether it worked.
    #[serde(default = "default_true")]
    pub check_on_startup: bool,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            top_p: default_top_p(),
            request_timeout_secs: default_request_timeout_secs(),
            check_on_startup: true,
        }
    }
}

fn default_base_url() -> String {
    "https://api.cerebras.ai/v1".to_string()
}

fn default_model() -> String {
    "llama-3.3-70b".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    2000
}

fn default_top_p() -> f32 {
    0.9
}

fn default_request_timeout_secs() -> u64 {
    30
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_true")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: true,
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("parley").join("parley.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("parley.db"))
        .to_string_lossy()
        .into_owned()
}

/// Retrieval configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RetrievalConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Snippets joined into the prompt context.
    #[serde(default = "default_max_snippets")]
    pub max_snippets: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_snippets: default_max_snippets(),
        }
    }
}

fn default_max_snippets() -> usize {
    3
}
