//! Trigger-Await Cycle – one request/response round trip over uncorrelated
//! asynchronous channels.
//!
//! The perception modules answer a start signal with a result and/or a
//! lifecycle event, but nothing in the reply identifies the trigger it
//! belongs to.  [`run_once`] therefore always:
//!
//! 1. resets the [`Detector`]'s latched state,
//! 2. fires the trigger exactly once,
//! 3. hands the waiting to [`poll_until`].
//!
//! A [`Detector`] bundles the five operations a cycle needs.  Most steps use
//! [`LatchedDetector`], which combines an outgoing [`Trigger`] with an event
//! latch and a result latch.

use std::sync::Arc;
use std::time::Duration;

use scout_middleware::{Latch, Trigger};
use scout_types::{Candidate, LifecycleEvent, ScoutError};
use tokio::time::Instant;
use tracing::{debug, error, info};

use crate::deadline::{CycleOutcome, PollStatus, poll_until};

/// A reply payload that may carry nothing useful.
///
/// An empty payload is still a [`CycleOutcome::Success`]; callers decide that
/// it means "no result".
pub trait Payload {
    fn is_empty(&self) -> bool;
}

impl<T> Payload for Vec<T> {
    fn is_empty(&self) -> bool {
        Vec::is_empty(self)
    }
}

impl Payload for Candidate {
    fn is_empty(&self) -> bool {
        false
    }
}

/// The channels of one external perception module, as seen by a cycle.
pub trait Detector: Send + Sync {
    type Output: Payload + Send;

    /// Name used in logs.
    fn name(&self) -> &str;

    /// Forget any event or result left over from a previous run.
    fn reset(&self);

    /// Send the start signal.
    fn trigger(&self);

    fn is_done(&self) -> bool;

    fn is_failed(&self) -> bool;

    /// Snapshot of the latest result, if one has arrived.
    fn result(&self) -> Option<Self::Output>;

    /// One look at the module's state.
    ///
    /// Done with a result wins over failed.  An `Err` ends the cycle as
    /// [`CycleOutcome::Failed`].
    fn check(&self) -> Result<PollStatus<Self::Output>, ScoutError> {
        if self.is_done()
            && let Some(result) = self.result()
        {
            return Ok(PollStatus::Ready(result));
        }
        if self.is_failed() {
            return Ok(PollStatus::Failed);
        }
        Ok(PollStatus::Pending)
    }
}

/// Run one Trigger-Await Cycle against `detector`.
///
/// * done and a result present → [`CycleOutcome::Success`]
/// * failed, or [`Detector::check`] erred → [`CycleOutcome::Failed`]
/// * neither within `max_duration` → [`CycleOutcome::TimedOut`]
pub async fn run_once<D>(detector: &D, interval: Duration, max_duration: Duration) -> CycleOutcome<D::Output>
where
    D: Detector + ?Sized,
{
    detector.reset();
    detector.trigger();
    debug!(detector = detector.name(), "triggered");
    let started = Instant::now();

    let outcome = poll_until(
        || PollStatus::from_result(detector.check()),
        interval,
        max_duration,
    )
    .await;

    let elapsed_ms = started.elapsed().as_millis() as u64;
    match &outcome {
        CycleOutcome::TimedOut => error!(
            detector = detector.name(),
            timeout_s = max_duration.as_secs_f64(),
            elapsed_ms,
            "timeout of {:.1} seconds exceeded waiting for {}",
            max_duration.as_secs_f64(),
            detector.name()
        ),
        CycleOutcome::Failed => info!(detector = detector.name(), elapsed_ms, "detector reported failure"),
        CycleOutcome::Success(result) if result.is_empty() => {
            info!(detector = detector.name(), "detector returned an empty result")
        }
        CycleOutcome::Success(_) => {}
    }
    outcome
}

// ─────────────────────────────────────────────────────────────────────────────
// LatchedDetector
// ─────────────────────────────────────────────────────────────────────────────

/// A [`Detector`] made of an outgoing trigger plus two latched inputs: the
/// module's lifecycle events and its result.
pub struct LatchedDetector<T> {
    name: String,
    trigger: Arc<dyn Trigger>,
    events: Latch<LifecycleEvent>,
    result: Latch<T>,
}

impl<T> LatchedDetector<T> {
    pub fn new(
        name: impl Into<String>,
        trigger: Arc<dyn Trigger>,
        events: Latch<LifecycleEvent>,
        result: Latch<T>,
    ) -> Self {
        Self {
            name: name.into(),
            trigger,
            events,
            result,
        }
    }
}

impl<T> Detector for LatchedDetector<T>
where
    T: Payload + Clone + Send + Sync,
{
    type Output = T;

    fn name(&self) -> &str {
        &self.name
    }

    fn reset(&self) {
        self.events.reset();
        self.result.reset();
    }

    fn trigger(&self) {
        self.trigger.fire();
    }

    fn is_done(&self) -> bool {
        self.events.holds(&LifecycleEvent::Done)
    }

    fn is_failed(&self) -> bool {
        self.events.holds(&LifecycleEvent::Failed)
    }

    fn result(&self) -> Option<T> {
        self.result.read()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Trigger that runs a scripted reaction against the latches.
    pub(crate) struct ScriptedTrigger<F: Fn() + Send + Sync> {
        pub(crate) fired: Mutex<u32>,
        pub(crate) react: F,
    }

    impl<F: Fn() + Send + Sync> ScriptedTrigger<F> {
        pub(crate) fn new(react: F) -> Arc<Self> {
            Arc::new(Self {
                fired: Mutex::new(0),
                react,
            })
        }

        pub(crate) fn count(&self) -> u32 {
            *self.fired.lock().unwrap()
        }
    }

    impl<F: Fn() + Send + Sync> Trigger for ScriptedTrigger<F> {
        fn fire(&self) {
            *self.fired.lock().unwrap() += 1;
            (self.react)();
        }
    }

    fn detector_with<F>(react: F) -> (LatchedDetector<Vec<u8>>, Arc<ScriptedTrigger<F>>, Latch<LifecycleEvent>, Latch<Vec<u8>>)
    where
        F: Fn() + Send + Sync + 'static,
    {
        let events = Latch::new();
        let result = Latch::new();
        let trigger = ScriptedTrigger::new(react);
        let detector = LatchedDetector::new("detector", trigger.clone(), events.clone(), result.clone());
        (detector, trigger, events, result)
    }

    const INTERVAL: Duration = Duration::from_millis(100);

    #[tokio::test(start_paused = true)]
    async fn done_with_result_is_success() {
        let events = Latch::new();
        let result = Latch::new();
        let (ev, res) = (events.clone(), result.clone());
        let trigger = ScriptedTrigger::new(move || {
            res.write(vec![1u8, 2]);
            ev.write(LifecycleEvent::Done);
        });
        let detector = LatchedDetector::new("detector", trigger.clone(), events, result);

        let outcome = run_once(&detector, INTERVAL, Duration::from_secs(5)).await;
        assert_eq!(outcome, CycleOutcome::Success(vec![1, 2]));
        assert_eq!(trigger.count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_event_is_failure() {
        let events = Latch::new();
        let ev = events.clone();
        let trigger = ScriptedTrigger::new(move || ev.write(LifecycleEvent::Failed));
        let detector: LatchedDetector<Vec<u8>> =
            LatchedDetector::new("detector", trigger, events, Latch::new());

        let outcome = run_once(&detector, INTERVAL, Duration::from_secs(5)).await;
        assert_eq!(outcome, CycleOutcome::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn silence_times_out_after_max_duration() {
        let (detector, trigger, _, _) = detector_with(|| {});
        let started = Instant::now();

        let outcome = run_once(&detector, INTERVAL, Duration::from_secs(5)).await;

        let elapsed = started.elapsed();
        assert_eq!(outcome, CycleOutcome::TimedOut);
        assert!(elapsed >= Duration::from_secs(5), "gave up early: {elapsed:?}");
        assert!(elapsed <= Duration::from_secs(5) + INTERVAL, "gave up late: {elapsed:?}");
        assert_eq!(trigger.count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_state_is_cleared_before_trigger() {
        let (detector, _, events, result) = detector_with(|| {});
        // Leftovers from a previous run must not be read as a fresh answer.
        events.write(LifecycleEvent::Done);
        result.write(vec![9]);

        let outcome = run_once(&detector, INTERVAL, Duration::from_millis(300)).await;
        assert_eq!(outcome, CycleOutcome::TimedOut);
    }

    #[tokio::test(start_paused = true)]
    async fn done_without_result_keeps_waiting() {
        let events = Latch::new();
        let result: Latch<Vec<u8>> = Latch::new();
        let ev = events.clone();
        let trigger = ScriptedTrigger::new(move || ev.write(LifecycleEvent::Done));
        let detector = LatchedDetector::new("detector", trigger, events, result.clone());

        let late = result.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(250)).await;
            late.write(vec![4]);
        });

        let outcome = run_once(&detector, INTERVAL, Duration::from_secs(5)).await;
        assert_eq!(outcome, CycleOutcome::Success(vec![4]));
    }

    #[tokio::test(start_paused = true)]
    async fn done_with_empty_result_is_success_with_empty_payload() {
        let events = Latch::new();
        let result = Latch::new();
        let (ev, res) = (events.clone(), result.clone());
        let trigger = ScriptedTrigger::new(move || {
            res.write(Vec::<u8>::new());
            ev.write(LifecycleEvent::Done);
        });
        let detector = LatchedDetector::new("detector", trigger, events, result);

        let outcome = run_once(&detector, INTERVAL, Duration::from_secs(5)).await;
        assert_eq!(outcome, CycleOutcome::Success(vec![]));
    }

    /// A module whose state cannot be read, e.g. a corrupted reply.
    struct Unreadable {
        fired: Mutex<u32>,
    }

    impl Detector for Unreadable {
        type Output = Vec<u8>;

        fn name(&self) -> &str {
            "unreadable"
        }

        fn reset(&self) {}

        fn trigger(&self) {
            *self.fired.lock().unwrap() += 1;
        }

        fn is_done(&self) -> bool {
            false
        }

        fn is_failed(&self) -> bool {
            false
        }

        fn result(&self) -> Option<Vec<u8>> {
            None
        }

        fn check(&self) -> Result<PollStatus<Vec<u8>>, ScoutError> {
            Err(ScoutError::Channel("reply could not be decoded".to_string()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn erroring_check_fails_the_cycle_without_waiting() {
        let detector = Unreadable { fired: Mutex::new(0) };
        let started = Instant::now();

        let outcome = run_once(&detector, INTERVAL, Duration::from_secs(5)).await;

        assert_eq!(outcome, CycleOutcome::Failed);
        assert_eq!(*detector.fired.lock().unwrap(), 1);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[test]
    fn default_check_prefers_done_over_failed() {
        let (detector, _, events, result) = detector_with(|| {});
        assert_eq!(detector.check(), Ok(PollStatus::Pending));
        events.write(LifecycleEvent::Failed);
        assert_eq!(detector.check(), Ok(PollStatus::Failed));
        result.write(vec![1]);
        events.write(LifecycleEvent::Done);
        assert_eq!(detector.check(), Ok(PollStatus::Ready(vec![1])));
    }

    /// Collects formatted log lines for assertions.
    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_log_reports_elapsed_time() {
        let logs = LogBuffer::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let (detector, _, _, _) = detector_with(|| {});
        let outcome = run_once(&detector, INTERVAL, Duration::from_secs(1)).await;
        assert_eq!(outcome, CycleOutcome::TimedOut);

        let text = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        let line = text
            .lines()
            .find(|l| l.contains("exceeded waiting for detector"))
            .expect("timeout line");
        let elapsed_ms: u64 = line
            .split("elapsed_ms=")
            .nth(1)
            .and_then(|rest| rest.split_whitespace().next())
            .and_then(|v| v.parse().ok())
            .expect("elapsed_ms field");
        assert!((1000..=1100).contains(&elapsed_ms), "{line}");
        assert!(line.contains("detector=\"detector\""), "{line}");
    }
}
