//! `scout-middleware` – transport handles for perception steps.
//!
//! Routes asynchronous data between the steps and the perception modules
//! without caring about the data's meaning.
//!
//! # Modules
//!
//! - [`bus`] – Headless, topic-named publish/subscribe event bus built on
//!   Tokio broadcast channels.
//! - [`latch`] – [`Latch`]: single-slot holder for the most recent
//!   asynchronous reply, with explicit reset.
//! - [`channel`] – [`Trigger`], [`Announcer`] and [`TopicPublisher`] for
//!   outgoing signals, [`spawn_latch`] for binding a latch to an incoming
//!   topic.
//! - [`service`] – [`StatusService`]: request/response calls answered with a
//!   numeric status code.

pub mod bus;
pub mod channel;
pub mod latch;
pub mod service;

pub use bus::{EventBus, TopicReceiver, topics};
pub use channel::{Announcer, LatchForwarder, TopicPublisher, Trigger, lifecycle, spawn_latch};
pub use latch::Latch;
pub use service::StatusService;
