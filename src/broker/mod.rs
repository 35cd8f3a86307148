//! The `broker` module holds everything that talks AMQP: connecting with
//! retry, declaring the consumed topology, topic routing rules and
//! publishing.

pub mod connector;
pub mod publisher;
pub mod topic;
pub mod topology;

pub use connector::{AmqpLink, retry_forever};
pub use publisher::Publisher;
pub use topic::topic_matches;
pub use topology::{Declare, Topology};

#[cfg(test)]
pub(crate) mod memory;
