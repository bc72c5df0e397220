//! Commit and sync rounds
//!
//! A round drains the command queue, sends it, and reconciles the reply
//! with the local stores:
//!
//! 1. Rejected commands have their staged changes dropped
//! 2. Temporary ids are rewritten everywhere through the returned id map
//! 3. Staged changes of accepted commands become committed state
//! 4. (sync only) Server resources are merged and the token advanced
//!
//! Nothing local is touched until the reply has arrived and decoded, so a
//! failed or cancelled round leaves the stores as they were and puts the
//! drained commands back at the front of the queue. Cancellation is only
//! observed before sending: once the server has answered, the reply is
//! always applied, since resending the batch would apply it twice.

use std::collections::{HashMap, HashSet};

use tracing::{debug, info, warn};
use uuid::Uuid;

use super::context::SyncContext;
use super::state::{SyncState, SyncToken};
use super::transport::{CommandStatus, SyncResponse, Transport, TransportError};
use crate::command::{Command, CommandQueue};
use crate::error::{CommandFailure, Error, Result};
use crate::id::{Id, IdMap};
use crate::storage::Persistence;
use crate::store::{Entity, EntityStore, Stores};

/// Where the engine is in a round
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    /// No round in progress
    Idle,
    /// Commands drained, request in flight
    Committing,
    /// Reply received, applying it locally
    Reconciling,
    /// Last round failed; the queue was restored
    Failed,
}

/// Everything a client keeps locally
#[derive(Debug, Clone, Default)]
pub struct LocalState {
    pub stores: Stores,
    pub queue: CommandQueue,
    pub token: SyncToken,
}

impl LocalState {
    /// State restored from a persisted snapshot
    pub fn from_snapshot(state: SyncState) -> Self {
        let (token, stores) = state.into_stores();
        Self {
            stores,
            queue: CommandQueue::new(),
            token,
        }
    }

    /// Snapshot of the committed state
    pub fn snapshot(&self) -> SyncState {
        SyncState::capture(&self.token, &self.stores)
    }
}

/// Result of applying a batch of commands
#[derive(Debug, Clone, Default)]
pub struct CommitReport {
    /// Temporary to permanent ids assigned by the server
    pub id_map: IdMap,
    /// Number of accepted commands
    pub applied: usize,
}

impl CommitReport {
    /// The permanent id for a temporary created in this batch, else `id`
    pub fn permanent_id(&self, id: Id) -> Id {
        self.id_map.resolve(id)
    }
}

/// Result of a sync round
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    /// Whether the server sent a full snapshot
    pub full: bool,
    /// Commands sent along with the sync
    pub commit: CommitReport,
    /// Number of entities received
    pub received: usize,
}

/// Drives commit and sync rounds over a transport
pub struct SyncEngine<T> {
    transport: T,
    phase: SyncPhase,
}

impl<T: Transport> SyncEngine<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            phase: SyncPhase::Idle,
        }
    }

    pub fn phase(&self) -> SyncPhase {
        self.phase
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Send every queued command without pulling server changes.
    ///
    /// The sync token is not advanced. Rejected commands are reported as
    /// [`Error::PartialCommandFailure`] after the accepted ones have been
    /// applied.
    pub fn commit(&mut self, ctx: &SyncContext, local: &mut LocalState) -> Result<CommitReport> {
        if local.queue.is_empty() {
            debug!("nothing to commit");
            self.phase = SyncPhase::Idle;
            return Ok(CommitReport::default());
        }

        let commands = local.queue.drain();
        self.phase = SyncPhase::Committing;
        info!(commands = commands.len(), "committing");

        let sent = self.round_trip(ctx, |transport| {
            transport.commit(ctx, &local.token, &commands)
        });
        let response = match sent {
            Ok(response) => response,
            Err(e) => return Err(self.abort(local, commands, e)),
        };

        self.phase = SyncPhase::Reconciling;
        let (report, failures) = reconcile(
            local,
            &commands,
            &response.temp_id_mapping,
            &response.sync_status,
        );
        self.phase = SyncPhase::Idle;
        info!(applied = report.applied, rejected = failures.len(), "commit finished");

        if failures.is_empty() {
            Ok(report)
        } else {
            Err(Error::PartialCommandFailure(failures))
        }
    }

    /// Pull server changes, sending `extra` commands in the same request.
    ///
    /// With an empty token the server sends everything. The new token and
    /// the committed state are saved once the reply has been applied.
    pub fn full_sync<P: Persistence + ?Sized>(
        &mut self,
        ctx: &SyncContext,
        local: &mut LocalState,
        extra: &[Command],
        persistence: &P,
    ) -> Result<SyncReport> {
        self.phase = SyncPhase::Committing;
        info!(token = local.token.as_wire(), commands = extra.len(), "syncing");

        let response = match self.round_trip(ctx, |transport| {
            transport.sync(ctx, &local.token, extra)
        }) {
            Ok(response) => response,
            Err(e) => {
                self.phase = SyncPhase::Failed;
                warn!(error = %e, "sync failed");
                return Err(e);
            }
        };

        self.phase = SyncPhase::Reconciling;
        let (commit, failures) = reconcile(
            local,
            extra,
            &response.temp_id_mapping,
            &response.sync_status,
        );
        let full = response.full_sync || local.token.is_empty();
        let token = response.sync_token.clone();
        let received = merge(&mut local.stores, response, full);
        local.token = token;
        info!(full, received, "sync merged");

        if let Err(e) = persistence.save(&local.snapshot()) {
            self.phase = SyncPhase::Failed;
            warn!(error = %e, "failed to save cache");
            return Err(e.into());
        }
        self.phase = SyncPhase::Idle;

        if failures.is_empty() {
            Ok(SyncReport {
                full,
                commit,
                received,
            })
        } else {
            Err(Error::PartialCommandFailure(failures))
        }
    }

    /// Send the whole queue as part of a sync round.
    ///
    /// The drained commands go back to the queue if the request fails.
    pub fn commit_and_sync<P: Persistence + ?Sized>(
        &mut self,
        ctx: &SyncContext,
        local: &mut LocalState,
        persistence: &P,
    ) -> Result<SyncReport> {
        let commands = local.queue.drain();
        match self.full_sync(ctx, local, &commands, persistence) {
            Err(e @ (Error::Transport(_) | Error::Cancelled)) => {
                local.queue.restore(commands);
                Err(e)
            }
            other => other,
        }
    }

    /// Run one request. Cancellation is checked before sending; the request
    /// itself is bounded by the context's timeout.
    fn round_trip<R, F>(&self, ctx: &SyncContext, send: F) -> Result<R>
    where
        F: FnOnce(&T) -> std::result::Result<R, TransportError>,
    {
        ctx.check()?;
        let response = send(&self.transport)?;
        if ctx.is_cancelled() {
            debug!("cancelled after the reply arrived; applying it anyway");
        }
        Ok(response)
    }

    fn abort(&mut self, local: &mut LocalState, commands: Vec<Command>, error: Error) -> Error {
        warn!(error = %error, restored = commands.len(), "commit failed, queue restored");
        local.queue.restore(commands);
        self.phase = SyncPhase::Failed;
        error
    }
}

/// Apply per-command outcomes and the id map to the local state
fn reconcile(
    local: &mut LocalState,
    commands: &[Command],
    id_map: &IdMap,
    statuses: &HashMap<Uuid, CommandStatus>,
) -> (CommitReport, Vec<CommandFailure>) {
    let mut failures = Vec::new();
    for command in commands {
        let (code, reason) = match statuses.get(&command.uuid) {
            Some(CommandStatus::Ok) => continue,
            Some(CommandStatus::Error { code, reason }) => (*code, reason.clone()),
            None => (None, "no status returned for command".to_string()),
        };
        let failure = CommandFailure {
            uuid: command.uuid,
            command: command.type_name(),
            target: id_map.resolve(command.target()),
            error_code: code,
            reason,
        };
        warn!(%failure, "command rejected");
        failures.push(failure);
    }

    local.stores.remap_ids(id_map);
    local.queue.remap_ids(id_map);

    let sent: HashSet<Uuid> = commands.iter().map(|c| c.uuid).collect();
    let rejected: HashSet<Uuid> = failures.iter().map(|f| f.uuid).collect();
    local.stores.settle(&sent, &rejected);

    let report = CommitReport {
        id_map: id_map.clone(),
        applied: commands.len() - failures.len(),
    };
    (report, failures)
}

/// Merge server resources; returns how many entities arrived
fn merge(stores: &mut Stores, response: SyncResponse, full: bool) -> usize {
    fn apply<E: Entity>(store: &mut EntityStore<E>, incoming: Option<Vec<E>>, full: bool) -> usize {
        let Some(entities) = incoming else {
            return 0;
        };
        let count = entities.len();
        if full {
            store.replace_committed(entities);
        } else {
            store.merge_delta(entities);
        }
        count
    }

    apply(&mut stores.items, response.items, full)
        + apply(&mut stores.projects, response.projects, full)
        + apply(&mut stores.labels, response.labels, full)
        + apply(&mut stores.notes, response.notes, full)
        + apply(&mut stores.filters, response.filters, full)
        + apply(&mut stores.reminders, response.reminders, full)
}
