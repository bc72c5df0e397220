//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use anyhow::{Context, Result};
use serde::Serialize;

use todoist_core::{Item, ItemRelation, Label, Project, SyncReport};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// One line of `item list`
#[derive(Debug, Clone, Serialize)]
pub struct ItemRow {
    pub item: Item,
    pub depth: usize,
    pub project: Option<String>,
    pub labels: Vec<String>,
}

impl ItemRow {
    pub fn new(item: Item, depth: usize, relation: Option<&ItemRelation>) -> Self {
        let (project, labels) = match relation {
            Some(rel) => (
                rel.project.as_ref().map(|p| p.name.clone()),
                rel.labels.iter().map(|l| l.name.clone()).collect(),
            ),
            None => (None, Vec::new()),
        };
        Self {
            item,
            depth,
            project,
            labels,
        }
    }

    /// Table columns: id, priority, due, project, labels, content
    fn columns(&self) -> [String; 6] {
        [
            self.item.id.to_string(),
            format!("p{}", self.item.priority),
            self.item.due_date().short_string(),
            self.project.clone().unwrap_or_default(),
            self.labels
                .iter()
                .map(|l| format!("@{}", l))
                .collect::<Vec<_>>()
                .join(","),
            format!("{}{}", "  ".repeat(self.depth), self.item.content),
        ]
    }
}

/// Output helper for consistent formatting
pub struct Output {
    /// The output format
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Check if output is in quiet mode
    pub fn is_quiet(&self) -> bool {
        matches!(self.format, OutputFormat::Quiet)
    }

    /// Print a single item with its project and labels
    pub fn print_item(&self, item: &Item, relation: Option<&ItemRelation>) -> Result<()> {
        match self.format {
            OutputFormat::Human => {
                println!("ID:        {}", item.id);
                println!("Content:   {}", item.content);
                if !item.description.is_empty() {
                    println!("Notes:     {}", truncate_line(&item.description, 60));
                }
                println!("Priority:  p{}", item.priority);
                if let Some(ref due) = item.due {
                    let when = due.date.short_string();
                    if when.is_empty() {
                        println!("Due:       {}", due.string);
                    } else {
                        println!("Due:       {} ({})", when, due.string);
                    }
                }
                if let Some(rel) = relation {
                    if let Some(ref project) = rel.project {
                        println!("Project:   {}", project.name);
                    }
                    if let Some(ref parent) = rel.parent {
                        println!("Parent:    {} {}", parent.id, truncate(&parent.content, 40));
                    }
                    if !rel.labels.is_empty() {
                        let names: Vec<_> = rel.labels.iter().map(|l| l.name.as_str()).collect();
                        println!("Labels:    {}", names.join(", "));
                    }
                }
                if item.checked {
                    println!("Completed: {}", item.date_completed.short_string());
                }
                if !item.date_added.is_zero() {
                    println!("Added:     {}", item.date_added.short_string());
                }
                Ok(())
            }
            OutputFormat::Json => print_json(item),
            OutputFormat::Quiet => {
                println!("{}", item.id);
                Ok(())
            }
        }
    }

    /// Print the item table
    pub fn print_items(&self, rows: &[ItemRow]) -> Result<()> {
        match self.format {
            OutputFormat::Human => {
                if rows.is_empty() {
                    println!("No items found.");
                    return Ok(());
                }
                let table: Vec<[String; 6]> = rows.iter().map(ItemRow::columns).collect();
                for line in render_table(&table) {
                    println!("{}", line);
                }
                println!("\n{} item(s)", rows.len());
                Ok(())
            }
            OutputFormat::Json => print_json(rows),
            OutputFormat::Quiet => {
                for row in rows {
                    println!("{}", row.item.id);
                }
                Ok(())
            }
        }
    }

    /// Print a list of projects, indented under their parents
    pub fn print_projects(&self, projects: &[(Project, usize)]) -> Result<()> {
        match self.format {
            OutputFormat::Human => {
                if projects.is_empty() {
                    println!("No projects found.");
                    return Ok(());
                }
                let table: Vec<[String; 2]> = projects
                    .iter()
                    .map(|(p, depth)| {
                        let marker = if p.inbox_project { " (inbox)" } else { "" };
                        [
                            p.id.to_string(),
                            format!("{}#{}{}", "  ".repeat(*depth), p.name, marker),
                        ]
                    })
                    .collect();
                for line in render_table(&table) {
                    println!("{}", line);
                }
                println!("\n{} project(s)", projects.len());
                Ok(())
            }
            OutputFormat::Json => {
                let list: Vec<&Project> = projects.iter().map(|(p, _)| p).collect();
                print_json(&list)
            }
            OutputFormat::Quiet => {
                for (project, _) in projects {
                    println!("{}", project.id);
                }
                Ok(())
            }
        }
    }

    pub fn print_project(&self, project: &Project) -> Result<()> {
        match self.format {
            OutputFormat::Human => {
                println!("ID:   {}", project.id);
                println!("Name: {}", project.name);
                Ok(())
            }
            OutputFormat::Json => print_json(project),
            OutputFormat::Quiet => {
                println!("{}", project.id);
                Ok(())
            }
        }
    }

    /// Print a list of labels
    pub fn print_labels(&self, labels: &[Label]) -> Result<()> {
        match self.format {
            OutputFormat::Human => {
                if labels.is_empty() {
                    println!("No labels found.");
                    return Ok(());
                }
                let table: Vec<[String; 2]> = labels
                    .iter()
                    .map(|l| [l.id.to_string(), format!("@{}", l.name)])
                    .collect();
                for line in render_table(&table) {
                    println!("{}", line);
                }
                println!("\n{} label(s)", labels.len());
                Ok(())
            }
            OutputFormat::Json => print_json(labels),
            OutputFormat::Quiet => {
                for label in labels {
                    println!("{}", label.id);
                }
                Ok(())
            }
        }
    }

    pub fn print_label(&self, label: &Label) -> Result<()> {
        match self.format {
            OutputFormat::Human => {
                println!("ID:   {}", label.id);
                println!("Name: @{}", label.name);
                Ok(())
            }
            OutputFormat::Json => print_json(label),
            OutputFormat::Quiet => {
                println!("{}", label.id);
                Ok(())
            }
        }
    }

    /// Summarise a finished sync round
    pub fn print_sync_report(&self, report: &SyncReport) {
        match self.format {
            OutputFormat::Human => {
                let kind = if report.full { "full" } else { "incremental" };
                println!(
                    "✓ Sync complete ({}): {} command(s) applied, {} record(s) received",
                    kind, report.commit.applied, report.received
                );
            }
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({
                        "status": "success",
                        "full": report.full,
                        "applied": report.commit.applied,
                        "received": report.received
                    })
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "success", "message": message})
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Check if we should prompt for confirmation
    pub fn should_prompt(&self) -> bool {
        self.format == OutputFormat::Human
    }

    /// Print an informational message
    pub fn message(&self, msg: &str) {
        match self.format {
            OutputFormat::Human => println!("{}", msg),
            OutputFormat::Json => {
                println!("{}", serde_json::json!({"message": msg}));
            }
            OutputFormat::Quiet => {}
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("Failed to encode JSON output")?;
    println!("{}", text);
    Ok(())
}

/// Left-align every column to its widest cell; the last column is not padded
fn render_table<const N: usize>(rows: &[[String; N]]) -> Vec<String> {
    let mut widths = [0usize; N];
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row.iter()) {
            *width = (*width).max(cell.chars().count());
        }
    }

    rows.iter()
        .map(|row| {
            let mut line = String::new();
            for (i, cell) in row.iter().enumerate() {
                if i + 1 == N {
                    line.push_str(cell);
                } else {
                    let pad = widths[i] - cell.chars().count();
                    line.push_str(cell);
                    line.push_str(&" ".repeat(pad + 1));
                }
            }
            line.trim_end().to_string()
        })
        .collect()
}

/// Truncate a string to max length, adding "..." if truncated
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Truncate to first line and max length
fn truncate_line(s: &str, max_len: usize) -> String {
    let first_line = s.lines().next().unwrap_or("");
    truncate(first_line, max_len)
}
