//! `cosim-middleware` – Message plumbing around the ego adapter.
//!
//! Routes events between the inbound command channel, the bridge loop and any
//! observers without caring what the events mean.
//!
//! # Modules
//!
//! - [`bus`] – Topic-partitioned publish/subscribe event bus built on Tokio
//!   broadcast channels.
//! - [`ingest`] – Decodes rosbridge-style JSON frames carrying vehicle
//!   commands and pose targets, and publishes them on the bus.

pub mod bus;
pub mod ingest;

pub use bus::{EventBus, Topic, TopicReceiver};
pub use ingest::{CommandIngest, Inbound, decode_frame};
