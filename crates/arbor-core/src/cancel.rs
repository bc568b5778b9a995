use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Returned by [`CancelToken::check`] once the token has been cancelled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Cancelled;

impl std::fmt::Display for Cancelled {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("operation cancelled")
    }
}

impl std::error::Error for Cancelled {}

/// Shared cooperative cancellation flag.
///
/// Long-running loops (index queries, fixed-point hierarchy expansion, the
/// per-file rewrite fan-out) poll the token each iteration. Cancelled work
/// must discard its partial result entirely: a truncated reference set means
/// missed rewrite sites, which is strictly worse than declining to refactor.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    pub fn check(&self) -> Result<(), Cancelled> {
        if self.is_cancelled() {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }
}
