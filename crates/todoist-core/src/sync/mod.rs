//! Sync with the Todoist sync API
//!
//! ## Protocol
//!
//! Every request is a POST carrying the sync token, the resource types to
//! fetch and a batch of commands:
//! 1. Commands carry a uuid; the server reports a status per uuid
//! 2. `add` commands carry a temporary id; the server maps it to a
//!    permanent one in `temp_id_mapping`
//! 3. A sync request with token `*` returns everything, otherwise only what
//!    changed since the token
//!
//! ## Usage
//!
//! ```ignore
//! let mut engine = SyncEngine::new(HttpTransport::from_config(&config)?);
//! engine.commit(&SyncContext::new(), &mut local)?;
//! engine.full_sync(&SyncContext::new(), &mut local, &[], &persistence)?;
//! ```

mod context;
mod engine;
mod state;
mod transport;

pub use context::{CancellationToken, SyncContext};
pub use engine::{CommitReport, LocalState, SyncEngine, SyncPhase, SyncReport};
pub use state::{SyncState, SyncToken};
pub use transport::{
    CommandStatus, CommitResponse, HttpTransport, SyncResponse, Transport, TransportError,
};
