//! Todoist Core Library
//!
//! This crate provides a local-first client for the Todoist sync API: an
//! in-memory replica of the account that can be edited offline and
//! reconciled with the server later.
//!
//! # Architecture
//!
//! - **Stores**: one [`EntityStore`] per resource kind, with staged local
//!   changes layered over server-confirmed state
//! - **Command queue**: every local write is recorded as a [`Command`]
//! - **Sync engine**: sends the queue, applies the server's id mapping and
//!   merges incremental or full resource updates
//! - **Persistence**: the confirmed state and sync token are cached as JSON
//!
//! # Quick Start
//!
//! ```text
//! let mut client = Client::open(&Config::load()?)?;
//!
//! // Stage a new item; visible immediately under a temporary id
//! let id = client.items_mut().add(Item::new("Buy milk"));
//!
//! // Commit, pull changes, and read back the server's copy
//! let item: Item = client.submit(&client.context(), id)?;
//! ```
//!
//! # Modules
//!
//! - `client`: Client facade (main entry point)
//! - `models`: Items, projects, labels, notes, filters, reminders
//! - `store`: Entity stores and staging
//! - `command`: Commands and the pending queue
//! - `relation`: Parent/child and project lookups
//! - `sync`: Transport, engine and sync state
//! - `storage`: Cache persistence
//! - `config`: Application configuration

pub mod client;
pub mod command;
pub mod config;
pub mod error;
pub mod id;
pub mod models;
pub mod relation;
pub mod storage;
pub mod store;
pub mod sync;
pub mod time;

pub use client::Client;
pub use command::{Command, CommandAction, CommandQueue, ItemMoveOpts, MoveTarget, Record};
pub use config::Config;
pub use error::{CommandFailure, Error, Result};
pub use id::{Id, IdError, IdMap};
pub use models::{Due, EntityKind, Filter, Item, Label, Note, Project, Reminder};
pub use relation::{ItemRelation, RelationIndex};
pub use storage::{FilePersistence, MemoryPersistence, Persistence, StorageError};
pub use store::{Entity, EntityStore, Staging, Stores};
pub use sync::{
    CancellationToken, CommitReport, HttpTransport, SyncContext, SyncEngine, SyncPhase,
    SyncReport, SyncState, SyncToken, Transport, TransportError,
};
pub use time::{Time, TimeError};
