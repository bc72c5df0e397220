//! Storage layer
//!
//! Persists the committed part of the stores together with the sync token,
//! so the next run can ask the server for a delta instead of everything.
//! Staged changes and the command queue are never persisted.

pub mod error;
pub mod persistence;

pub use error::{StorageError, StorageResult};
pub use persistence::{FilePersistence, MemoryPersistence, Persistence};
