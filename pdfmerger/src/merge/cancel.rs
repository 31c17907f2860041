//! Merge-wide cancellation signal.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{PdfMergeError, Result};

/// Cloneable flag shared by every task of one merge.
///
/// Parsing polls it once per object; after [`cancel`](Self::cancel) the
/// merge stops with [`PdfMergeError::Cancelled`] and produces no output.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Create a token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Every clone observes it.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    /// Fail with `Cancelled` once cancellation was requested.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(PdfMergeError::Cancelled)
        } else {
            Ok(())
        }
    }
}
