//! Client facade
//!
//! The `Client` owns the local state, the sync engine and the persistence
//! handler, and is the entry point for both reads and writes:
//!
//! - reads go straight to the in-memory stores
//! - writes are staged locally and queued ([`Client::items_mut`] etc.)
//! - [`Client::commit`] / [`Client::full_sync`] talk to the server
//!
//! ## Usage
//!
//! ```ignore
//! let mut client = Client::open(&Config::load()?)?;
//!
//! let id = client.items_mut().add(Item::new("Buy milk"));
//! let item: Item = client.submit(&client.context(), id)?;
//! assert!(item.id.is_permanent());
//! ```

use std::time::Duration;

use tracing::debug;

use crate::command::CommandQueue;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::id::Id;
use crate::models::{Item, Label, Project};
use crate::relation::RelationIndex;
use crate::storage::{FilePersistence, Persistence};
use crate::store::{Entity, EntityStore, Staging, Stores};
use crate::sync::{
    CommitReport, HttpTransport, LocalState, SyncContext, SyncEngine, SyncPhase, SyncReport,
    SyncToken, Transport,
};

/// Local replica of a Todoist account
pub struct Client<T = HttpTransport, P = FilePersistence> {
    local: LocalState,
    engine: SyncEngine<T>,
    persistence: P,
    timeout: Option<Duration>,
}

impl Client<HttpTransport, FilePersistence> {
    /// Open the configured cache and endpoint
    pub fn open(config: &Config) -> Result<Self> {
        let transport = HttpTransport::from_config(config)?;
        let persistence = FilePersistence::from_config(config);
        Ok(Self::new(transport, persistence)?.with_timeout(config.timeout()))
    }
}

impl<T: Transport, P: Persistence> Client<T, P> {
    /// Build a client, loading the last saved state if there is one
    pub fn new(transport: T, persistence: P) -> Result<Self> {
        let local = match persistence.load()? {
            Some(state) => {
                debug!(token = state.sync_token.as_wire(), "restored cache");
                LocalState::from_snapshot(state)
            }
            None => LocalState::default(),
        };

        Ok(Self {
            local,
            engine: SyncEngine::new(transport),
            persistence,
            timeout: None,
        })
    }

    /// Per-request timeout used by [`context`](Self::context)
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// A fresh context carrying the configured timeout
    pub fn context(&self) -> SyncContext {
        SyncContext::new().with_timeout(self.timeout)
    }

    // ==================== Reads ====================

    pub fn stores(&self) -> &Stores {
        &self.local.stores
    }

    pub fn store<E: Entity>(&self) -> &EntityStore<E> {
        E::store(&self.local.stores)
    }

    pub fn items(&self) -> &EntityStore<Item> {
        &self.local.stores.items
    }

    pub fn projects(&self) -> &EntityStore<Project> {
        &self.local.stores.projects
    }

    pub fn labels(&self) -> &EntityStore<Label> {
        &self.local.stores.labels
    }

    pub fn relations(&self) -> RelationIndex<'_> {
        RelationIndex::new(&self.local.stores)
    }

    pub fn queue(&self) -> &CommandQueue {
        &self.local.queue
    }

    pub fn sync_token(&self) -> &SyncToken {
        &self.local.token
    }

    pub fn phase(&self) -> SyncPhase {
        self.engine.phase()
    }

    pub fn persistence(&self) -> &P {
        &self.persistence
    }

    pub fn transport(&self) -> &T {
        self.engine.transport()
    }

    // ==================== Local writes ====================

    /// Staging handle for one entity kind
    pub fn stage<E: Entity>(&mut self) -> Staging<'_, E> {
        Staging::new(&mut self.local.stores, &mut self.local.queue)
    }

    pub fn items_mut(&mut self) -> Staging<'_, Item> {
        self.stage()
    }

    pub fn projects_mut(&mut self) -> Staging<'_, Project> {
        self.stage()
    }

    pub fn labels_mut(&mut self) -> Staging<'_, Label> {
        self.stage()
    }

    /// Drop every staged change and queued command
    pub fn discard_pending(&mut self) {
        debug!(commands = self.local.queue.len(), "discarding pending changes");
        self.local.queue.clear();
        self.local.stores.discard_overlay();
    }

    /// Forget the sync token so the next sync fetches everything
    pub fn reset_sync_token(&mut self) {
        self.local.token = SyncToken::empty();
    }

    // ==================== Server rounds ====================

    /// Send queued commands; see [`SyncEngine::commit`]
    pub fn commit(&mut self, ctx: &SyncContext) -> Result<CommitReport> {
        self.engine.commit(ctx, &mut self.local)
    }

    /// Pull server changes; see [`SyncEngine::full_sync`]
    pub fn full_sync(&mut self, ctx: &SyncContext) -> Result<SyncReport> {
        self.engine
            .full_sync(ctx, &mut self.local, &[], &self.persistence)
    }

    /// Send queued commands and pull changes in one request
    pub fn commit_and_sync(&mut self, ctx: &SyncContext) -> Result<SyncReport> {
        self.engine
            .commit_and_sync(ctx, &mut self.local, &self.persistence)
    }

    /// Commit, then sync without extra commands
    pub fn push(&mut self, ctx: &SyncContext) -> Result<CommitReport> {
        let report = self.commit(ctx)?;
        self.full_sync(ctx)?;
        Ok(report)
    }

    /// Push and return the server's version of a staged entity.
    ///
    /// `id` may be the temporary id returned by `add`.
    pub fn submit<E: Entity>(&mut self, ctx: &SyncContext, id: Id) -> Result<E> {
        let report = self.push(ctx)?;
        self.resolve_synced::<E>(report.permanent_id(id)).cloned()
    }

    /// Look up an entity that a completed sync must have delivered
    pub fn resolve_synced<E: Entity>(&self, id: Id) -> Result<&E> {
        self.store::<E>().resolve(id).ok_or_else(|| {
            Error::Consistency(format!("{} {} is missing after sync", E::KIND, id))
        })
    }
}
