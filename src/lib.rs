//! # inform-relay
//!
//! `inform_relay` consumes JSON notifications from a RabbitMQ topic exchange
//! and forwards each one to an HTTP endpoint. A delivery is acknowledged when
//! the endpoint answers 2xx and dropped (rejected without requeue) otherwise.
//!
//! ## Core Modules
//!
//! - `broker`: AMQP connection retry, topology declaration, topic routing and publishing.
//! - `relay`: the consume-and-forward loop and the per-delivery ack/reject decision.
//! - `transport`: a STOMP-over-WebSocket client for watching live traffic.
//! - `config`: loads settings from file and environment.
//! - `utils`: the shared error type and logging setup.

pub mod broker;
pub mod config;
pub mod relay;
pub mod transport;
pub mod utils;
