//! Project command handlers

use std::collections::HashMap;

use anyhow::{bail, Context, Result};

use todoist_core::{Client, Id, Persistence, Project, Transport};

use super::resolve_project;
use crate::output::Output;
use crate::prompt::confirm;

/// List projects as a tree
pub fn list<T: Transport, P: Persistence>(client: &Client<T, P>, output: &Output) -> Result<()> {
    let projects = client.projects().get_all();
    output.print_projects(&nested(&projects))
}

pub fn add<T: Transport, P: Persistence>(
    client: &mut Client<T, P>,
    name: String,
    output: &Output,
) -> Result<()> {
    if name.trim().is_empty() {
        bail!("Project name cannot be empty");
    }

    let id = client.projects_mut().add(Project::new(name.trim()));
    let ctx = client.context();
    let project: Project = client.submit(&ctx, id).context("Failed to add project")?;

    output.success(&format!("Added project: {}", project.id));
    output.print_project(&project)
}

/// Rename a project
pub fn update<T: Transport, P: Persistence>(
    client: &mut Client<T, P>,
    id: String,
    name: String,
    output: &Output,
) -> Result<()> {
    if name.trim().is_empty() {
        bail!("Project name cannot be empty");
    }

    let mut project = find(client, &id)?;
    project.name = name.trim().to_string();

    let id = client.projects_mut().update(project)?;
    let ctx = client.context();
    let project: Project = client.submit(&ctx, id).context("Failed to update project")?;

    output.success("Project updated");
    output.print_project(&project)
}

pub fn delete<T: Transport, P: Persistence>(
    client: &mut Client<T, P>,
    id: String,
    output: &Output,
) -> Result<()> {
    let project = find(client, &id)?;
    if project.inbox_project {
        bail!("The inbox project cannot be deleted");
    }

    if output.should_prompt() {
        let open = client.relations().items_in_project(project.id).len();
        println!("Delete project: {} - {} ({} item(s))", project.id, project.name, open);
        if !confirm("Are you sure?")? {
            output.message("aborted");
            return Ok(());
        }
    }

    client.projects_mut().delete(project.id)?;
    let ctx = client.context();
    client.push(&ctx).context("Failed to delete project")?;

    output.success(&format!("Deleted project: {}", project.id));
    Ok(())
}

fn find<T: Transport, P: Persistence>(client: &Client<T, P>, text: &str) -> Result<Project> {
    let id = resolve_project(client.projects(), text)?;
    client
        .projects()
        .resolve(id)
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("Project not found: {}", text))
}

/// Projects in tree order with their depth
fn nested(projects: &[Project]) -> Vec<(Project, usize)> {
    let listed: HashMap<Id, &Project> = projects.iter().map(|p| (p.id, p)).collect();
    let mut children: HashMap<Option<Id>, Vec<&Project>> = HashMap::new();
    for project in projects {
        let parent = project.parent_id.filter(|p| listed.contains_key(p));
        children.entry(parent).or_default().push(project);
    }
    for siblings in children.values_mut() {
        // Inbox first, then server order
        siblings.sort_by_key(|p| (!p.inbox_project, p.child_order));
    }

    let mut ordered = Vec::with_capacity(projects.len());
    let mut stack: Vec<(&Project, usize)> = children
        .get(&None)
        .map(|roots| roots.iter().rev().map(|p| (*p, 0)).collect())
        .unwrap_or_default();
    while let Some((project, depth)) = stack.pop() {
        ordered.push((project.clone(), depth));
        if let Some(kids) = children.get(&Some(project.id)) {
            stack.extend(kids.iter().rev().map(|p| (*p, depth + 1)));
        }
    }
    ordered
}
