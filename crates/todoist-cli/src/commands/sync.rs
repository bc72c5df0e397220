//! Sync command handler

use anyhow::{Context, Result};

use todoist_core::{Client, Persistence, Transport};

use crate::output::Output;

/// Pull changes from the server; `full` forgets the sync token first
pub fn sync<T: Transport, P: Persistence>(
    client: &mut Client<T, P>,
    full: bool,
    output: &Output,
) -> Result<()> {
    if full {
        client.reset_sync_token();
        output.message("Fetching all resources...");
    } else {
        output.message("Syncing...");
    }

    let ctx = client.context();
    let report = client.full_sync(&ctx).context("Sync failed")?;

    output.print_sync_report(&report);
    if !output.is_quiet() {
        output.message(&format!(
            "  Items: {}, Projects: {}, Labels: {}",
            client.items().len(),
            client.projects().len(),
            client.labels().len()
        ));
    }
    Ok(())
}
