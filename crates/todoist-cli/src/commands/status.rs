//! Status command handler

use anyhow::Result;

use todoist_core::{Client, Config, Persistence, Transport};

use crate::output::{Output, OutputFormat};

/// Show cache location, sync token and record counts
pub fn show<T: Transport, P: Persistence>(
    client: &Client<T, P>,
    config: &Config,
    output: &Output,
) -> Result<()> {
    let stores = client.stores();
    let token = client.sync_token();
    let synced = (!token.is_empty()).then(|| token.as_wire());

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "cache": config.cache_path(),
                    "api_url": config.api_url,
                    "api_token_set": config.api_token.is_some(),
                    "sync_token": synced,
                    "counts": {
                        "items": stores.items.len(),
                        "projects": stores.projects.len(),
                        "labels": stores.labels.len(),
                        "notes": stores.notes.len(),
                        "filters": stores.filters.len(),
                        "reminders": stores.reminders.len()
                    }
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", token.as_wire());
        }
        OutputFormat::Human => {
            println!("Todoist Status");
            println!("==============");
            println!();
            println!("Cache:      {}", config.cache_path().display());
            println!("Endpoint:   {}", config.api_url);
            println!(
                "API token:  {}",
                if config.api_token.is_some() {
                    "set"
                } else {
                    "(not set)"
                }
            );
            println!("Sync token: {}", synced.unwrap_or("(never synced)"));
            println!();
            println!("Records:");
            println!("  Items:     {}", stores.items.len());
            println!("  Projects:  {}", stores.projects.len());
            println!("  Labels:    {}", stores.labels.len());
            println!("  Notes:     {}", stores.notes.len());
            println!("  Filters:   {}", stores.filters.len());
            println!("  Reminders: {}", stores.reminders.len());
        }
    }

    Ok(())
}
