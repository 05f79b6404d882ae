//! Cooperative cancellation for a single sync run
//!
//! A [CancellationToken] is created once at process entry and handed to every
//! component that performs blocking git, subprocess, or network calls. The
//! signal handler only flips the flag; each blocking call checks it before
//! starting (and git2 transfers poll it while running).

use crate::error::{DeviateError, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Fails with [DeviateError::Cancelled] once the token has been cancelled.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(DeviateError::Cancelled);
        }
        Ok(())
    }

    /// Cancel this token on SIGINT/SIGTERM.
    ///
    /// Can be installed once per process.
    pub fn cancel_on_signal(&self) -> Result<()> {
        let token = self.clone();
        ctrlc::set_handler(move || {
            tracing::warn!("Signal detected, canceling...");
            token.cancel();
        })
        .map_err(|e| DeviateError::local(format!("cannot install signal handler: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_fresh_token_is_active() {
        let token = CancellationToken::new();
        assert!(!token.is_cancelled());
        assert!(token.check().is_ok());
    }

    #[test]
    fn test_cancel_is_shared_between_clones() {
        let token = CancellationToken::new();
        let clone = token.clone();
        clone.cancel();

        assert!(token.is_cancelled());
        assert_eq!(token.check().unwrap_err().kind(), ErrorKind::Cancelled);
    }
}
