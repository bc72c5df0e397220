//! Sync state persistence
//!
//! The token identifies how far the local copy has been synced; together
//! with the committed entities it lets the next run request a delta.

use serde::{Deserialize, Serialize};

use crate::models::{Filter, Item, Label, Note, Project, Reminder};
use crate::store::{EntityStore, Stores};

/// Wire value meaning "send everything"
const FULL_SYNC_TOKEN: &str = "*";

/// Server-issued marker of the last observed state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SyncToken(Option<String>);

impl SyncToken {
    pub fn new(token: impl Into<String>) -> Self {
        let token = token.into();
        if token.is_empty() || token == FULL_SYNC_TOKEN {
            SyncToken(None)
        } else {
            SyncToken(Some(token))
        }
    }

    /// No token yet; the next sync is a full one
    pub fn empty() -> Self {
        SyncToken(None)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_none()
    }

    /// Value sent to the server
    pub fn as_wire(&self) -> &str {
        self.0.as_deref().unwrap_or(FULL_SYNC_TOKEN)
    }
}

/// Persisted snapshot: the token and every committed entity
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncState {
    #[serde(default)]
    pub sync_token: SyncToken,
    #[serde(default)]
    pub items: Vec<Item>,
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default)]
    pub labels: Vec<Label>,
    #[serde(default)]
    pub notes: Vec<Note>,
    #[serde(default)]
    pub filters: Vec<Filter>,
    #[serde(default)]
    pub reminders: Vec<Reminder>,
}

impl SyncState {
    /// Snapshot of the committed layer; staged changes are left out
    pub fn capture(sync_token: &SyncToken, stores: &Stores) -> Self {
        Self {
            sync_token: sync_token.clone(),
            items: stores.items.committed().to_vec(),
            projects: stores.projects.committed().to_vec(),
            labels: stores.labels.committed().to_vec(),
            notes: stores.notes.committed().to_vec(),
            filters: stores.filters.committed().to_vec(),
            reminders: stores.reminders.committed().to_vec(),
        }
    }

    /// Rebuild stores from the snapshot
    pub fn into_stores(self) -> (SyncToken, Stores) {
        let stores = Stores {
            items: EntityStore::from_committed(self.items),
            projects: EntityStore::from_committed(self.projects),
            labels: EntityStore::from_committed(self.labels),
            notes: EntityStore::from_committed(self.notes),
            filters: EntityStore::from_committed(self.filters),
            reminders: EntityStore::from_committed(self.reminders),
        };
        (self.sync_token, stores)
    }
}
