//! [`Latch`] – single-slot holder for the most recent asynchronous message.
//!
//! External perception modules answer a trigger zero or one time, on a
//! channel that carries no request id.  A step therefore correlates a reply
//! with its trigger purely by ordering:
//!
//! 1. [`Latch::reset`] clears whatever a previous run left behind,
//! 2. the trigger is published,
//! 3. the delivery task [`Latch::write`]s the reply,
//! 4. the polling loop [`Latch::read`]s snapshots until one is present.
//!
//! Resetting **before** triggering is a precondition of every caller; a
//! stale value read after the trigger would otherwise be mistaken for a
//! fresh answer.
//!
//! The slot is a [`tokio::sync::watch`] channel, so the writer (a delivery
//! task) and the reader (the polling loop) never share ad hoc mutable state.

use std::sync::Arc;

use tokio::sync::watch;

/// Latched, last-writer-wins slot shared between a delivery task and a
/// polling loop.  Clones share the same slot.
#[derive(Debug)]
pub struct Latch<T> {
    slot: Arc<watch::Sender<Option<T>>>,
}

impl<T> Clone for Latch<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T> Default for Latch<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Latch<T> {
    /// Create an empty latch.
    pub fn new() -> Self {
        let (slot, _) = watch::channel(None);
        Self {
            slot: Arc::new(slot),
        }
    }

    /// Clear the slot.
    pub fn reset(&self) {
        self.slot.send_replace(None);
    }

    /// Store `value`, replacing anything already latched.
    pub fn write(&self, value: T) {
        self.slot.send_replace(Some(value));
    }

    /// `true` when a value is currently latched.
    pub fn is_set(&self) -> bool {
        self.slot.borrow().is_some()
    }

    /// Subscribe to changes of the slot.
    pub fn watch(&self) -> watch::Receiver<Option<T>> {
        self.slot.subscribe()
    }
}

impl<T: Clone> Latch<T> {
    /// Snapshot of the latched value.
    pub fn read(&self) -> Option<T> {
        self.slot.borrow().clone()
    }
}

impl<T: PartialEq> Latch<T> {
    /// `true` when the latched value equals `expected`.
    pub fn holds(&self, expected: &T) -> bool {
        self.slot.borrow().as_ref() == Some(expected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_latch_is_empty() {
        let latch: Latch<u32> = Latch::new();
        assert!(!latch.is_set());
        assert_eq!(latch.read(), None);
    }

    #[test]
    fn write_then_read() {
        let latch = Latch::new();
        latch.write("e_done".to_string());
        assert_eq!(latch.read().as_deref(), Some("e_done"));
        // Reading does not consume.
        assert!(latch.is_set());
    }

    #[test]
    fn last_write_wins() {
        let latch = Latch::new();
        latch.write(1);
        latch.write(2);
        assert_eq!(latch.read(), Some(2));
    }

    #[test]
    fn reset_clears_stale_value() {
        let latch = Latch::new();
        latch.write(7);
        latch.reset();
        assert_eq!(latch.read(), None);
    }

    #[test]
    fn clones_share_the_slot() {
        let reader = Latch::new();
        let writer = reader.clone();
        writer.write(42);
        assert!(reader.holds(&42));
        assert!(!reader.holds(&41));
    }

    #[tokio::test]
    async fn write_from_another_task_is_visible() {
        let latch = Latch::new();
        let writer = latch.clone();
        let mut rx = latch.watch();
        tokio::spawn(async move {
            writer.write("cavity".to_string());
        });
        rx.wait_for(Option::is_some).await.unwrap();
        assert_eq!(latch.read().as_deref(), Some("cavity"));
    }
}
