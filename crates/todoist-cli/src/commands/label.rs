//! Label command handlers

use anyhow::{bail, Context, Result};

use todoist_core::{Client, Label, Persistence, Transport};

use super::resolve_id;
use crate::output::Output;
use crate::prompt::confirm;

/// List labels in server order
pub fn list<T: Transport, P: Persistence>(client: &Client<T, P>, output: &Output) -> Result<()> {
    let mut labels = client.labels().get_all();
    labels.sort_by_key(|l| l.item_order);
    output.print_labels(&labels)
}

pub fn add<T: Transport, P: Persistence>(
    client: &mut Client<T, P>,
    name: String,
    output: &Output,
) -> Result<()> {
    let name = label_name(&name)?;

    let id = client.labels_mut().add(Label::new(name));
    let ctx = client.context();
    let label: Label = client.submit(&ctx, id).context("Failed to add label")?;

    output.success(&format!("Added label: {}", label.id));
    output.print_label(&label)
}

/// Rename a label
pub fn update<T: Transport, P: Persistence>(
    client: &mut Client<T, P>,
    id: String,
    name: String,
    output: &Output,
) -> Result<()> {
    let name = label_name(&name)?;
    let mut label = find(client, &id)?;
    label.name = name;

    let id = client.labels_mut().update(label)?;
    let ctx = client.context();
    let label: Label = client.submit(&ctx, id).context("Failed to update label")?;

    output.success("Label updated");
    output.print_label(&label)
}

pub fn delete<T: Transport, P: Persistence>(
    client: &mut Client<T, P>,
    id: String,
    output: &Output,
) -> Result<()> {
    let label = find(client, &id)?;

    if output.should_prompt() {
        println!("Delete label: {} - @{}", label.id, label.name);
        if !confirm("Are you sure?")? {
            output.message("aborted");
            return Ok(());
        }
    }

    client.labels_mut().delete(label.id)?;
    let ctx = client.context();
    client.push(&ctx).context("Failed to delete label")?;

    output.success(&format!("Deleted label: {}", label.id));
    Ok(())
}

fn find<T: Transport, P: Persistence>(client: &Client<T, P>, text: &str) -> Result<Label> {
    let text = text.trim_start_matches('@');
    let id = resolve_id(client.labels(), text)?;
    client
        .labels()
        .resolve(id)
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("Label not found: {}", text))
}

/// Accepts `name` or `@name`
fn label_name(input: &str) -> Result<String> {
    let name = input.trim().trim_start_matches('@');
    if name.is_empty() {
        bail!("Label name cannot be empty");
    }
    Ok(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_name() {
        assert_eq!(label_name("@home").unwrap(), "home");
        assert_eq!(label_name(" phone ").unwrap(), "phone");
        assert!(label_name("@").is_err());
    }
}
