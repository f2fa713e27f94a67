//! `scout-sim` – in-process stand-ins for the perception modules.
//!
//! Each simulator serves the same bus topics (or service seam) as the real
//! module, so the steps run unchanged in headless tests and in the CLI demo.
//!
//! - [`SimObjectDetector`] – answers `e_trigger` with an object list and
//!   `e_done`, with `e_failed`, or not at all.
//! - [`SimCavityFinder`] – answers contour-finder triggers with a cavity for
//!   the last announced object.
//! - [`SimServo`] – a [`StatusService`][scout_middleware::StatusService]
//!   returning scripted status codes.
//!
//! # Example
//!
//! ```rust
//! use scout_middleware::EventBus;
//! use scout_sim::{SimCavityFinder, SimObjectDetector};
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let bus = EventBus::default();
//! let _detector = SimObjectDetector::seeing(Vec::new()).spawn(&bus);
//! let _cavities = SimCavityFinder::new().with_scores("M20_100", [0.04]).spawn(&bus);
//! # });
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use tokio::task::JoinHandle;

pub mod cavity_finder;
pub mod detector;
pub mod servo;

pub use cavity_finder::SimCavityFinder;
pub use detector::{DetectorReply, SimObjectDetector};
pub use servo::{ServoReply, SimServo};

/// A running simulated module.  Dropping the handle stops it.
pub struct SimHandle {
    task: JoinHandle<()>,
    triggers: Arc<AtomicU32>,
}

impl SimHandle {
    pub(crate) fn new(task: JoinHandle<()>, triggers: Arc<AtomicU32>) -> Self {
        Self { task, triggers }
    }

    /// Number of triggers received so far.
    pub fn triggers(&self) -> u32 {
        self.triggers.load(Ordering::SeqCst)
    }
}

impl Drop for SimHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
