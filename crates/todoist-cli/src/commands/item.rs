//! Item command handlers

use std::collections::HashMap;

use anyhow::{bail, Context, Result};

use todoist_core::{Client, Due, Id, Item, ItemMoveOpts, Persistence, Time, Transport};

use super::{resolve_id, resolve_ids, resolve_project};
use crate::output::{ItemRow, Output};
use crate::prompt::confirm;

/// Fields shared by `add` and `update`
#[derive(Debug, Default)]
pub struct ItemFields {
    pub content: Vec<String>,
    pub labels: Option<String>,
    pub due: Option<String>,
    pub priority: Option<u8>,
}

impl ItemFields {
    fn content(&self) -> Option<String> {
        let text = self.content.join(" ");
        let text = text.trim();
        (!text.is_empty()).then(|| text.to_string())
    }

    fn apply<T: Transport, P: Persistence>(
        &self,
        client: &Client<T, P>,
        item: &mut Item,
    ) -> Result<()> {
        if let Some(content) = self.content() {
            item.content = content;
        }
        if let Some(ref labels) = self.labels {
            item.labels = resolve_ids(client.labels(), labels)?;
        }
        if let Some(ref due) = self.due {
            item.due = if due.trim().is_empty() {
                None
            } else {
                Some(Due::from_string(due.trim()))
            };
        }
        if let Some(priority) = self.priority {
            item.priority = priority;
        }
        Ok(())
    }
}

/// List open items (or all with `all`) in project and tree order
pub fn list<T: Transport, P: Persistence>(
    client: &Client<T, P>,
    all: bool,
    output: &Output,
) -> Result<()> {
    let items: Vec<Item> = client
        .items()
        .iter()
        .filter(|item| all || !item.checked)
        .cloned()
        .collect();

    let project_rank: HashMap<Id, usize> = client
        .projects()
        .iter()
        .enumerate()
        .map(|(rank, p)| (p.id, rank))
        .collect();

    let relations = client.relations();
    let linked = relations.item_relations(&items);
    let rows: Vec<ItemRow> = tree_order(&items, &project_rank)
        .into_iter()
        .map(|item| {
            let depth = relations.depth_of(item);
            ItemRow::new(item.clone(), depth, linked.get(&item.id))
        })
        .collect();

    output.print_items(&rows)
}

/// Create an item, sync, and show the server's copy
pub fn add<T: Transport, P: Persistence>(
    client: &mut Client<T, P>,
    fields: ItemFields,
    project: Option<String>,
    output: &Output,
) -> Result<()> {
    let Some(content) = fields.content() else {
        bail!("Item content cannot be empty");
    };

    let mut item = Item::new(content);
    item.project_id = match project {
        Some(ref name) => Some(resolve_project(client.projects(), name)?),
        // Before the first sync the inbox is unknown; the server defaults to it
        None => resolve_project(client.projects(), "inbox").ok(),
    };
    fields.apply(client, &mut item)?;

    let id = client.items_mut().add(item);
    let ctx = client.context();
    let item: Item = client.submit(&ctx, id).context("Failed to add item")?;

    output.success(&format!("Added item: {}", item.id));
    show(client, &item, output)
}

/// Edit content, labels, due date or priority
pub fn update<T: Transport, P: Persistence>(
    client: &mut Client<T, P>,
    id: String,
    fields: ItemFields,
    output: &Output,
) -> Result<()> {
    let mut item = find(client, &id)?;
    fields.apply(client, &mut item)?;

    let id = client.items_mut().update(item)?;
    let ctx = client.context();
    let item: Item = client.submit(&ctx, id).context("Failed to update item")?;

    output.success("Item updated");
    show(client, &item, output)
}

/// Delete an item after confirmation
pub fn delete<T: Transport, P: Persistence>(
    client: &mut Client<T, P>,
    id: String,
    output: &Output,
) -> Result<()> {
    let item = find(client, &id)?;

    if output.should_prompt() {
        show(client, &item, output)?;
        if !confirm("Delete this item?")? {
            output.message("aborted");
            return Ok(());
        }
    }

    client.items_mut().delete(item.id)?;
    let ctx = client.context();
    client.push(&ctx).context("Failed to delete item")?;

    output.success(&format!("Deleted item: {}", item.id));
    Ok(())
}

/// Move an item under another item or into a project
pub fn move_item<T: Transport, P: Persistence>(
    client: &mut Client<T, P>,
    id: String,
    parent: Option<String>,
    project: Option<String>,
    output: &Output,
) -> Result<()> {
    let item = find(client, &id)?;
    let opts = ItemMoveOpts {
        parent_id: parent
            .map(|p| resolve_id(client.items(), &p))
            .transpose()?,
        project_id: project
            .map(|p| resolve_project(client.projects(), &p))
            .transpose()?,
    };

    client.items_mut().move_item(item.id, opts)?;
    let ctx = client.context();
    let item: Item = client.submit(&ctx, item.id).context("Failed to move item")?;

    output.success("Item moved");
    show(client, &item, output)
}

/// Complete an item; sub-items are completed too unless `no_force`
pub fn complete<T: Transport, P: Persistence>(
    client: &mut Client<T, P>,
    id: String,
    no_force: bool,
    output: &Output,
) -> Result<()> {
    let item = find(client, &id)?;

    client
        .items_mut()
        .complete(item.id, Time::now(), !no_force)?;
    let ctx = client.context();
    client.push(&ctx).context("Failed to complete item")?;

    output.success(&format!("Completed item: {}", item.id));
    Ok(())
}

pub fn uncomplete<T: Transport, P: Persistence>(
    client: &mut Client<T, P>,
    id: String,
    output: &Output,
) -> Result<()> {
    let item = find(client, &id)?;

    client.items_mut().uncomplete(item.id)?;
    let ctx = client.context();
    client.push(&ctx).context("Failed to reopen item")?;

    output.success(&format!("Reopened item: {}", item.id));
    Ok(())
}

fn find<T: Transport, P: Persistence>(client: &Client<T, P>, text: &str) -> Result<Item> {
    let id = resolve_id(client.items(), text)?;
    client
        .items()
        .resolve(id)
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("Item not found: {}", text))
}

fn show<T: Transport, P: Persistence>(
    client: &Client<T, P>,
    item: &Item,
    output: &Output,
) -> Result<()> {
    let relations = client.relations().item_relations(std::slice::from_ref(item));
    output.print_item(item, relations.get(&item.id))
}

/// Depth-first order: roots by project then `child_order`, each followed by
/// its sub-items. Items whose parent is not listed count as roots; items
/// caught in a parent cycle are unreachable and left out.
fn tree_order<'a>(items: &'a [Item], project_rank: &HashMap<Id, usize>) -> Vec<&'a Item> {
    let listed: HashMap<Id, &Item> = items.iter().map(|i| (i.id, i)).collect();
    let mut children: HashMap<Option<Id>, Vec<&Item>> = HashMap::new();
    for item in items {
        let parent = item.parent_id.filter(|p| listed.contains_key(p));
        children.entry(parent).or_default().push(item);
    }

    let rank = |item: &Item| {
        item.project_id
            .and_then(|p| project_rank.get(&p).copied())
            .unwrap_or(usize::MAX)
    };
    for siblings in children.values_mut() {
        siblings.sort_by_key(|i| (rank(*i), i.child_order));
    }

    let mut ordered = Vec::with_capacity(items.len());
    let mut stack: Vec<&Item> = children
        .get(&None)
        .map(|roots| roots.iter().rev().copied().collect())
        .unwrap_or_default();
    while let Some(item) = stack.pop() {
        ordered.push(item);
        if let Some(kids) = children.get(&Some(item.id)) {
            stack.extend(kids.iter().rev().copied());
        }
    }
    ordered
}
