//! Cooperative cancellation for long-running computations.
//!
//! The numerical routines are synchronous, so cancellation is only observed at
//! coarse checkpoints: before a derivative is built and once per refinement
//! round of an integration.

use crate::error::CalculusError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A shareable flag an enclosing caller can raise to abort work in progress.
///
/// Clones share the same flag, so one clone can be handed to a worker while
/// another stays with the caller.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Returns `Err(CalculusError::Cancelled)` once the token has fired.
    pub fn check(&self) -> Result<(), CalculusError> {
        if self.is_cancelled() {
            Err(CalculusError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Checks an optional token; `None` never cancels.
pub(crate) fn checkpoint(cancel: Option<&CancellationToken>) -> Result<(), CalculusError> {
    match cancel {
        Some(token) => token.check(),
        None => Ok(()),
    }
}
