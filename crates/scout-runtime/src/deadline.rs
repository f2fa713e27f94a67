//! Deadline Poller – bounded, cooperative waiting.
//!
//! [`poll_until`] invokes a non-blocking `check` at a fixed interval until
//! it reports [`PollStatus::Ready`] or [`PollStatus::Failed`], or until a
//! [`Deadline`] expires.  Between checks the task sleeps on the Tokio timer,
//! so waiting never busy-spins and other tasks (including whatever is
//! delivering the awaited reply) keep running.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use scout_runtime::deadline::{poll_until, CycleOutcome, PollStatus};
//!
//! let rt = tokio::runtime::Runtime::new().unwrap();
//! let mut calls = 0;
//! let outcome = rt.block_on(poll_until(
//!     || {
//!         calls += 1;
//!         if calls == 3 { PollStatus::Ready(calls) } else { PollStatus::Pending }
//!     },
//!     Duration::from_millis(1),
//!     Duration::from_secs(1),
//! ));
//! assert_eq!(outcome, CycleOutcome::Success(3));
//! ```

use std::fmt::Display;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};

/// Default spacing between two checks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

// ─────────────────────────────────────────────────────────────────────────────
// Outcome types
// ─────────────────────────────────────────────────────────────────────────────

/// What a single check observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollStatus<T> {
    /// Nothing conclusive yet; keep waiting.
    Pending,
    /// The awaited value is available.
    Ready(T),
    /// The other side reported a terminal failure.
    Failed,
}

impl<T> PollStatus<T> {
    /// Fold a fallible check into a status.  Errors are logged and count as
    /// [`PollStatus::Failed`].
    pub fn from_result<E: Display>(result: Result<PollStatus<T>, E>) -> Self {
        match result {
            Ok(status) => status,
            Err(e) => {
                warn!(error = %e, "poll check failed");
                PollStatus::Failed
            }
        }
    }
}

/// Terminal result of one bounded wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome<T> {
    Success(T),
    Failed,
    TimedOut,
}

impl<T> CycleOutcome<T> {
    pub fn label(&self) -> &'static str {
        match self {
            CycleOutcome::Success(_) => "success",
            CycleOutcome::Failed => "failed",
            CycleOutcome::TimedOut => "timed_out",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Deadline
// ─────────────────────────────────────────────────────────────────────────────

/// A start instant plus the maximum time a wait may take.
///
/// Elapsed time is measured on the monotonic Tokio clock, so it never goes
/// backwards.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    start: Instant,
    max_duration: Duration,
}

impl Deadline {
    /// Start a deadline now.
    pub fn start(max_duration: Duration) -> Self {
        Self {
            start: Instant::now(),
            max_duration,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// `true` once at least `max_duration` has passed since the start.
    pub fn expired(&self) -> bool {
        self.elapsed() >= self.max_duration
    }

    pub fn max_duration(&self) -> Duration {
        self.max_duration
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Poller
// ─────────────────────────────────────────────────────────────────────────────

/// Call `check` every `interval` until it settles or `max_duration` passes.
///
/// `check` is always invoked at least once, and once more after the last
/// sleep before the wait is declared [`CycleOutcome::TimedOut`], so a reply
/// landing just before the deadline is still seen.
pub async fn poll_until<T, F>(mut check: F, interval: Duration, max_duration: Duration) -> CycleOutcome<T>
where
    F: FnMut() -> PollStatus<T>,
{
    let deadline = Deadline::start(max_duration);
    let mut polls: u64 = 0;
    loop {
        polls += 1;
        match check() {
            PollStatus::Ready(value) => {
                debug!(polls, elapsed_ms = deadline.elapsed().as_millis() as u64, "poll satisfied");
                return CycleOutcome::Success(value);
            }
            PollStatus::Failed => {
                debug!(polls, elapsed_ms = deadline.elapsed().as_millis() as u64, "poll failed");
                return CycleOutcome::Failed;
            }
            PollStatus::Pending => {}
        }
        if deadline.expired() {
            return CycleOutcome::TimedOut;
        }
        tokio::time::sleep(interval).await;
    }
}
