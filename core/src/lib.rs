//! Domain model of the home telemetry pipeline.
//!
//! Everything in here is pure: topics are routed, payloads are decoded into
//! [`SensorEvent`]s and merged into [`RoomState`]s without touching storage
//! or the network. The `aether` application crate wires these pieces to the
//! broker and the database.

pub mod error;
mod room;
mod sensor;
mod topic;

pub use room::*;
pub use sensor::*;
pub use topic::*;

pub static CORE_VERSION: &str = env!("CARGO_PKG_VERSION");
