//! RPC over a simulated in-process network, for building and torturing
//! distributed systems.
//!
//! Services are declared with [`service!`] and run as single tasks behind a
//! router that can drop messages, cut links and take whole nodes down.

pub mod client;
mod macros;
pub mod network;
pub mod server;

pub use anyhow;
pub use async_trait::async_trait;
pub use futures;
pub use log;
pub use rand;
pub use serde;
pub use serde_json;
pub use tokio;

pub use network::{NetCtl, NetHandle, Network, Packet};

use std::time::Duration;

/// How long a caller waits for a reply before treating the attempt as lost.
pub const RPC_TIMEOUT: Duration = Duration::from_millis(100);
