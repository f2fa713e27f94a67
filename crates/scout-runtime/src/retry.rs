//! Retry Controller – bounded repetition of a Trigger-Await Cycle.
//!
//! [`run_with_retries`] runs a cycle at most `retries` times and stops at the
//! first [`CycleOutcome::Success`] whose payload is not empty.  Failed,
//! timed-out and empty results all move on to the next attempt.  There is no
//! backoff: each attempt is already bounded by its own deadline.

use std::future::Future;
use std::num::NonZeroU32;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::cycle::Payload;
use crate::deadline::CycleOutcome;

/// Run `cycle` up to `retries` times.
///
/// `cycle` receives the 1-based attempt number.  Returns the first non-empty
/// success, or the outcome of the last attempt when every attempt came back
/// empty-handed.
pub async fn run_with_retries<T, F, Fut>(retries: NonZeroU32, mut cycle: F) -> CycleOutcome<T>
where
    T: Payload,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = CycleOutcome<T>>,
{
    let retries = retries.get();
    let mut attempt = 1;
    loop {
        info!(attempt, retries, "attempt {attempt}/{retries}");
        let started = Instant::now();
        let outcome = cycle(attempt).await;
        if matches!(&outcome, CycleOutcome::Success(payload) if !payload.is_empty()) {
            if attempt > 1 {
                debug!(attempt, "succeeded after retrying");
            }
            return outcome;
        }
        warn!(
            attempt,
            retries,
            elapsed_ms = started.elapsed().as_millis() as u64,
            outcome = outcome.label(),
            "attempt produced no result"
        );
        if attempt >= retries {
            warn!(retries, "giving up after {retries} attempts");
            return outcome;
        }
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn n(value: u32) -> NonZeroU32 {
        NonZeroU32::new(value).unwrap()
    }

    #[tokio::test]
    async fn every_attempt_failing_runs_exactly_n_times() {
        for retries in 1..=6 {
            let attempts = AtomicU32::new(0);
            let outcome: CycleOutcome<Vec<u8>> = run_with_retries(n(retries), |_| {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { CycleOutcome::Failed }
            })
            .await;
            assert_eq!(outcome, CycleOutcome::Failed);
            assert_eq!(attempts.load(Ordering::SeqCst), retries);
        }
    }

    #[tokio::test]
    async fn stops_at_first_non_empty_success() {
        let attempts = AtomicU32::new(0);
        let outcome = run_with_retries(n(5), |attempt| {
            attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt == 3 {
                    CycleOutcome::Success(vec!["bearing"])
                } else {
                    CycleOutcome::TimedOut
                }
            }
        })
        .await;
        assert_eq!(outcome, CycleOutcome::Success(vec!["bearing"]));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn empty_success_is_retried() {
        let attempts = AtomicU32::new(0);
        let outcome: CycleOutcome<Vec<u8>> = run_with_retries(n(3), |_| {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { CycleOutcome::Success(Vec::new()) }
        })
        .await;
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        // The last outcome is handed back; callers read it as "no result".
        assert_eq!(outcome, CycleOutcome::Success(vec![]));
    }

    #[tokio::test]
    async fn returns_the_last_outcome() {
        let outcome: CycleOutcome<Vec<u8>> = run_with_retries(n(2), |attempt| async move {
            if attempt == 1 {
                CycleOutcome::Failed
            } else {
                CycleOutcome::TimedOut
            }
        })
        .await;
        assert_eq!(outcome, CycleOutcome::TimedOut);
    }

    #[tokio::test]
    async fn attempt_numbers_are_one_based_and_sequential() {
        let mut seen = Vec::new();
        let _: CycleOutcome<Vec<u8>> = run_with_retries(n(4), |attempt| {
            seen.push(attempt);
            async { CycleOutcome::Failed }
        })
        .await;
        assert_eq!(seen, vec![1, 2, 3, 4]);
    }
}
