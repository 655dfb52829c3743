// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as valid bind addresses, positive limits, and coherent timings.

use crate::diagnostic::ConfigError;
use crate::model::ParleyConfig;

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &ParleyConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ConfigError::Validation { message });

    let host = config.gateway.host.trim();
    if host.is_empty() {
        fail("gateway.host must not be empty".to_string());
    } else {
        let is_valid_ip = host.parse::<std::net::IpAddr>().is_ok();
        let is_valid_hostname = host
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-' || c == ':');
        if !is_valid_ip && !is_valid_hostname {
            fail(format!(
                "gateway.host `{host}` is not a valid IP address or hostname"
            ));
        }
    }

    if config.storage.database_path.trim().is_empty() {
        fail("storage.database_path must not be empty".to_string());
    }

    if config.rate_limit.max_requests == 0 {
        fail("rate_limit.max_requests must be at least 1".to_string());
    }
    if config.rate_limit.window_secs == 0 {
        fail("rate_limit.window_secs must be at least 1".to_string());
    }

    if config.queue.max_attempts == 0 {
        fail("queue.max_attempts must be at least 1".to_string());
    }
    if config.queue.stall_timeout_secs <= config.provider.request_timeout_secs {
        fail(format!(
            "queue.stall_timeout_secs ({}) must exceed provider.request_timeout_secs ({})",
            config.queue.stall_timeout_secs, config.provider.request_timeout_secs
        ));
    }

    if config.worker.concurrency == 0 {
        fail("worker.concurrency must be at least 1".to_string());
    }
    if config.worker.max_starts == 0 {
        fail("worker.max_starts must be at least 1".to_string());
    }
    if config.worker.throughput_window_ms == 0 {
        fail("worker.throughput_window_ms must be at least 1".to_string());
    }

    if config.agent.max_message_chars == 0 {
        fail("agent.max_message_chars must be at least 1".to_string());
    }
    if config.agent.max_reply_chars == 0 {
        fail("agent.max_reply_chars must be at least 1".to_string());
    }
    if config.agent.wait_poll_interval_ms == 0 {
        fail("agent.wait_poll_interval_ms must be at least 1".to_string());
    }
    if config.agent.wait_timeout().as_millis() <= u128::from(config.agent.wait_poll_interval_ms) {
        fail(format!(
            "agent.wait_timeout_secs ({}s) must exceed agent.wait_poll_interval_ms ({}ms)",
            config.agent.wait_timeout_secs, config.agent.wait_poll_interval_ms
        ));
    }

    let temperature = config.provider.temperature;
    if !(0.0..=2.0).contains(&temperature) {
        fail(format!(
            "provider.temperature must be between 0 and 2, got {temperature}"
        ));
    }
    let top_p = config.provider.top_p;
    if !(top_p > 0.0 && top_p <= 1.0) {
        fail(format!("provider.top_p must be in (0, 1], got {top_p}"));
    }
    if config.provider.max_tokens == 0 {
        fail("provider.max_tokens must be at least 1".to_string());
    }
    if !config.provider.base_url.starts_with("http://")
        && !config.provider.base_url.starts_with("https://")
    {
        fail(format!(
            "provider.base_url `{}` must start with http:// or https://",
            config.provider.base_url
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(validate_config(&ParleyConfig::default()).is_ok());
    }

    #[test]
    fn collects_every_violation() {
        let mut config = ParleyConfig::default();
        config.worker.concurrency = 0;
        config.rate_limit.max_requests = 0;
        config.provider.temperature = 3.5;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn wait_timeout_must_exceed_poll_interval() {
        let mut config = ParleyConfig::default();
        config.agent.wait_timeout_secs = 1;
        config.agent.wait_poll_interval_ms = 1500;

        let errors = validate_config(&config).unwrap_err();
        assert!(errors[0].to_string().contains("wait_timeout_secs"));
    }

    #[test]
    fn stall_timeout_must_outlast_a_provider_call() {
        let mut config = ParleyConfig::default();
        config.queue.stall_timeout_secs = config.provider.request_timeout_secs;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("queue.stall_timeout_secs"));
    }

    #[test]
    fn rejects_garbage_host() {
        let mut config = ParleyConfig::default();
        config.gateway.host = "not a host!".to_string();
        assert!(validate_config(&config).is_err());
    }
}
