//! Per-operation cancellation and deadlines
//!
//! Every store operation takes an [`OpContext`]. The in-flight backend
//! request is raced against the context's cancellation token and its
//! deadline; whichever fires first aborts the request by dropping it.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use taskboard_store::OpContext;
//!
//! let ctx = OpContext::with_timeout(Duration::from_millis(250));
//! let token = ctx.cancellation_token();
//!
//! // Cancelling the token aborts any operation running under `ctx`
//! token.cancel();
//! assert!(ctx.is_cancelled());
//! ```

use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Why an operation was abandoned before completing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupted {
    Cancelled,
    DeadlineExceeded,
}

/// Cancellation token plus optional deadline for one logical request
#[derive(Debug, Clone, Default)]
pub struct OpContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl OpContext {
    /// A context that is never cancelled and has no deadline of its own
    ///
    /// The store's default command timeout still applies.
    pub fn background() -> Self {
        Self::default()
    }

    /// A context expiring `timeout` from now
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    /// A context expiring at `deadline`
    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            cancel: CancellationToken::new(),
            deadline: Some(deadline),
        }
    }

    /// A context cancelled together with `token`
    pub fn with_cancellation(token: CancellationToken) -> Self {
        Self {
            cancel: token,
            deadline: None,
        }
    }

    /// Derives a context cancelled with this one, keeping the earlier of
    /// this context's deadline and `timeout` from now
    pub fn child(&self, timeout: Option<Duration>) -> Self {
        let own = timeout.map(|t| Instant::now() + t);
        Self {
            cancel: self.cancel.child_token(),
            deadline: earliest(self.deadline, own),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Runs `fut` until it completes, the context is cancelled, or the
    /// earlier of the context deadline and `default_timeout` passes
    pub(crate) async fn run<F, T>(&self, default_timeout: Duration, fut: F) -> Result<T, Interrupted>
    where
        F: Future<Output = T>,
    {
        if self.cancel.is_cancelled() {
            return Err(Interrupted::Cancelled);
        }

        let fallback = Instant::now() + default_timeout;
        let deadline = self.deadline.map_or(fallback, |own| own.min(fallback));

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Interrupted::Cancelled),
            _ = tokio::time::sleep_until(deadline) => Err(Interrupted::DeadlineExceeded),
            out = fut => Ok(out),
        }
    }
}

fn earliest(a: Option<Instant>, b: Option<Instant>) -> Option<Instant> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, None) => a,
        (None, b) => b,
    }
}
