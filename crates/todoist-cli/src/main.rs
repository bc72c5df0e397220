//! Todoist CLI
//!
//! Command-line interface for the Todoist sync client.

use std::fs::OpenOptions;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use todoist_core::{Client, Config, StorageError};

mod commands;
mod output;
mod prompt;

use commands::item::ItemFields;
use output::{Output, OutputFormat};

const DEFAULT_LOG_FILTER: &str = "todoist_core=warn,todoist_cli=warn";

#[derive(Parser)]
#[command(name = "todoist")]
#[command(about = "Todoist - command-line client for the Todoist sync API")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage items (tasks)
    Item {
        #[command(subcommand)]
        command: ItemCommands,
    },
    /// Manage projects
    Project {
        #[command(subcommand)]
        command: ProjectCommands,
    },
    /// Manage labels
    Label {
        #[command(subcommand)]
        command: LabelCommands,
    },
    /// Pull changes from the server
    Sync {
        /// Discard the sync token and fetch everything
        #[arg(long)]
        full: bool,
    },
    /// Show cache and sync status
    Status,
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand)]
enum ItemCommands {
    /// List open items
    List {
        /// Include completed items
        #[arg(short, long)]
        all: bool,
    },
    /// Add an item
    Add {
        /// Item content
        #[arg(required = true)]
        content: Vec<String>,
        /// Project id or name (defaults to the inbox)
        #[arg(short, long)]
        project: Option<String>,
        /// Label ids or names, comma separated
        #[arg(short, long)]
        labels: Option<String>,
        /// Due date, e.g. "tomorrow 9am"
        #[arg(short, long)]
        due: Option<String>,
        /// Priority from 1 (normal) to 4 (urgent)
        #[arg(long, value_parser = clap::value_parser!(u8).range(1..=4))]
        priority: Option<u8>,
    },
    /// Update an item
    Update {
        /// Item id or content
        id: String,
        /// New content
        content: Vec<String>,
        /// Label ids or names, comma separated (replaces existing labels)
        #[arg(short, long)]
        labels: Option<String>,
        /// Due date (empty string clears it)
        #[arg(short, long)]
        due: Option<String>,
        /// Priority from 1 (normal) to 4 (urgent)
        #[arg(long, value_parser = clap::value_parser!(u8).range(1..=4))]
        priority: Option<u8>,
    },
    /// Delete an item
    Delete {
        /// Item id or content
        id: String,
    },
    /// Move an item under another item or into a project
    Move {
        /// Item id or content
        id: String,
        /// New parent item
        #[arg(short = 'i', long, conflicts_with = "project")]
        parent: Option<String>,
        /// Target project
        #[arg(short, long)]
        project: Option<String>,
    },
    /// Complete an item and its sub-items
    Complete {
        /// Item id or content
        id: String,
        /// Refuse when sub-items are still open
        #[arg(long)]
        no_force: bool,
    },
    /// Reopen a completed item
    Uncomplete {
        /// Item id or content
        id: String,
    },
}

#[derive(Subcommand)]
enum ProjectCommands {
    /// List projects
    List,
    /// Add a project
    Add {
        /// Project name
        name: String,
    },
    /// Rename a project
    Update {
        /// Project id or name
        id: String,
        /// New name
        name: String,
    },
    /// Delete a project
    Delete {
        /// Project id or name
        id: String,
    },
}

#[derive(Subcommand)]
enum LabelCommands {
    /// List labels
    List,
    /// Add a label
    Add {
        /// Label name
        name: String,
    },
    /// Rename a label
    Update {
        /// Label id or name
        id: String,
        /// New name
        name: String,
    },
    /// Delete a label
    Delete {
        /// Label id or name
        id: String,
    },
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (data_dir, api_token, api_url, timeout_secs, log_file)
        key: String,
        /// Configuration value
        value: String,
    },
}

fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        eprintln!("Error: {:#}", err);
        for hint in hints(&err) {
            eprintln!("Hint: {}", hint);
        }
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));

    // Config commands work without a usable configuration
    if let Commands::Config { command } = &cli.command {
        return handle_config_command(command.clone(), &output);
    }

    let config = Config::load().context("Failed to load configuration")?;
    init_logging(&config);

    let mut client = Client::open(&config).context("Failed to open local cache")?;
    debug!(cache = ?config.cache_path(), "client ready");

    match cli.command {
        Commands::Item { command } => handle_item_command(command, &mut client, &output),
        Commands::Project { command } => handle_project_command(command, &mut client, &output),
        Commands::Label { command } => handle_label_command(command, &mut client, &output),
        Commands::Sync { full } => commands::sync::sync(&mut client, full, &output),
        Commands::Status => commands::status::show(&client, &config, &output),
        Commands::Config { .. } => unreachable!(), // Handled above
    }
}

fn handle_item_command(command: ItemCommands, client: &mut Client, output: &Output) -> Result<()> {
    match command {
        ItemCommands::List { all } => commands::item::list(client, all, output),
        ItemCommands::Add {
            content,
            project,
            labels,
            due,
            priority,
        } => {
            let fields = ItemFields {
                content,
                labels,
                due,
                priority,
            };
            commands::item::add(client, fields, project, output)
        }
        ItemCommands::Update {
            id,
            content,
            labels,
            due,
            priority,
        } => {
            let fields = ItemFields {
                content,
                labels,
                due,
                priority,
            };
            commands::item::update(client, id, fields, output)
        }
        ItemCommands::Delete { id } => commands::item::delete(client, id, output),
        ItemCommands::Move {
            id,
            parent,
            project,
        } => commands::item::move_item(client, id, parent, project, output),
        ItemCommands::Complete { id, no_force } => {
            commands::item::complete(client, id, no_force, output)
        }
        ItemCommands::Uncomplete { id } => commands::item::uncomplete(client, id, output),
    }
}

fn handle_project_command(
    command: ProjectCommands,
    client: &mut Client,
    output: &Output,
) -> Result<()> {
    match command {
        ProjectCommands::List => commands::project::list(client, output),
        ProjectCommands::Add { name } => commands::project::add(client, name, output),
        ProjectCommands::Update { id, name } => commands::project::update(client, id, name, output),
        ProjectCommands::Delete { id } => commands::project::delete(client, id, output),
    }
}

fn handle_label_command(command: LabelCommands, client: &mut Client, output: &Output) -> Result<()> {
    match command {
        LabelCommands::List => commands::label::list(client, output),
        LabelCommands::Add { name } => commands::label::add(client, name, output),
        LabelCommands::Update { id, name } => commands::label::update(client, id, name, output),
        LabelCommands::Delete { id } => commands::label::delete(client, id, output),
    }
}

fn handle_config_command(command: Option<ConfigCommands>, output: &Output) -> Result<()> {
    match command {
        Some(ConfigCommands::Show) | None => commands::config::show(output),
        Some(ConfigCommands::Set { key, value }) => commands::config::set(key, value, output),
    }
}

/// Suggestions for the first core or storage error in the chain
fn hints(err: &anyhow::Error) -> Vec<String> {
    let mut hints = Vec::new();
    for cause in err.chain() {
        if let Some(core) = cause.downcast_ref::<todoist_core::Error>() {
            if let todoist_core::Error::Storage(storage) = core {
                hints.extend(storage.recovery_suggestion().map(str::to_string));
            }
            if core.is_retryable() {
                hints.push("Re-run the command to retry.".to_string());
            }
            break;
        }
        if let Some(storage) = cause.downcast_ref::<StorageError>() {
            hints.extend(storage.recovery_suggestion().map(str::to_string));
            break;
        }
    }
    hints
}

/// Initialize logging: `RUST_LOG` or warnings only, to the configured log
/// file when set, otherwise stderr
fn init_logging(config: &Config) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let Some(ref log_path) = config.log_file else {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .try_init();
        return;
    };

    let log_file = match OpenOptions::new().create(true).append(true).open(log_path) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Warning: Could not open log file {:?}: {}", log_path, e);
            return;
        }
    };

    // Ignore the error if a subscriber is already installed
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_ansi(false)
        .with_writer(log_file)
        .try_init();
}
