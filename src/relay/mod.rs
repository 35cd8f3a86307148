//! The `relay` module turns deliveries into HTTP calls.
//!
//! Each delivery is parsed, POSTed downstream and then acked on success or
//! rejected without requeue on any failure. Deliveries are handled on their
//! own tasks and never affect one another.

pub mod consumer;
pub mod forwarder;
pub mod handler;
pub mod outcome;

pub use consumer::{AmqpConnector, Connect, Deliveries, Incoming, Relay, Session};
pub use forwarder::{Forward, HttpForwarder};
pub use handler::{handle_delivery, process, spawn_handler};
pub use outcome::{Outcome, Settle};
