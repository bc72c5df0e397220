//! Config command handlers

use anyhow::{Context, Result};

use todoist_core::Config;

use crate::output::{Output, OutputFormat};

/// Show current configuration
pub fn show(output: &Output) -> Result<()> {
    let config = Config::load().context("Failed to load configuration")?;
    let token = config.api_token.as_deref().map(mask_token);

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "data_dir": config.data_dir,
                    "api_token": token,
                    "api_url": config.api_url,
                    "timeout_secs": config.timeout_secs,
                    "log_file": config.log_file
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", config.data_dir.display());
        }
        OutputFormat::Human => {
            println!("Configuration:");
            println!("  data_dir:     {}", config.data_dir.display());
            println!(
                "  api_token:    {}",
                token.as_deref().unwrap_or("(not set)")
            );
            println!("  api_url:      {}", config.api_url);
            println!("  timeout_secs: {}", config.timeout_secs);
            println!(
                "  log_file:     {}",
                config
                    .log_file
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "(not set)".to_string())
            );
            println!();
            println!("Config file: {}", Config::config_file_path().display());
        }
    }

    Ok(())
}

/// Set a configuration value
pub fn set(key: String, value: String, output: &Output) -> Result<()> {
    let mut config = Config::load().context("Failed to load configuration")?;
    config.set(&key, &value)?;
    config.save().context("Failed to save configuration")?;

    let shown = if key == "api_token" {
        mask_token(&value)
    } else {
        value
    };
    output.success(&format!("Set {} = {}", key, shown));
    Ok(())
}

/// Keep the last four characters of a secret
fn mask_token(token: &str) -> String {
    let count = token.chars().count();
    if count <= 4 {
        return "*".repeat(count);
    }
    let tail: String = token.chars().skip(count - 4).collect();
    format!("{}{}", "*".repeat(count - 4), tail)
}
