// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `parley check`: configuration and provider connectivity.

use parley_config::ParleyConfig;
use parley_core::{ParleyError, PluginAdapter};
use parley_openai::OpenAiProvider;

/// Configuration has already been validated by the time this runs.
pub async fn run_check(config: &ParleyConfig) -> Result<(), ParleyError> {
    println!("config: ok");
    println!(
        "gateway: {}:{}",
        config.gateway.host, config.gateway.port
    );
    println!("database: {}", config.storage.database_path);

    let provider = OpenAiProvider::new(config)?;
    println!("provider: {} ({})", provider.name(), config.provider.model);
    match provider.test_connection().await {
        Ok(()) => {
            println!("provider connection: ok");
            Ok(())
        }
        Err(e) => {
            println!("provider connection: failed ({e})");
            Err(e)
        }
    }
}
