//! Per-round sync options

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::error::{Error, Result};

/// Shared cancellation flag
///
/// Clones observe the same flag, so a handle can be given to a signal
/// handler or another thread while the round runs.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Options for one commit or sync round
#[derive(Debug, Clone, Default)]
pub struct SyncContext {
    pub cancel: CancellationToken,
    /// Per-request timeout, `None` for the transport default
    pub timeout: Option<Duration>,
}

impl SyncContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// `Err(Cancelled)` once the token has been triggered
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancellation_is_shared() {
        let token = CancellationToken::new();
        let ctx = SyncContext::new().with_cancellation(token.clone());
        assert!(ctx.check().is_ok());

        token.cancel();
        assert!(ctx.is_cancelled());
        assert!(matches!(ctx.check(), Err(Error::Cancelled)));
    }

    #[test]
    fn test_timeout() {
        let ctx = SyncContext::new().with_timeout(Some(Duration::from_secs(3)));
        assert_eq!(ctx.timeout, Some(Duration::from_secs(3)));
        assert!(SyncContext::default().timeout.is_none());
    }
}
