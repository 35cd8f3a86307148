//! The `transport` module speaks STOMP over WebSockets to the broker's
//! web-STOMP plugin. It is what the operator `watch` command uses to look at
//! live traffic without touching the relay's own queue.

pub mod frame;
pub mod stomp;

pub use frame::{Command, Frame};
pub use stomp::{StompClient, Subscription};
