#![deny(missing_docs)]
#![deny(clippy::all)]
//! The view service: watches replica liveness and serially publishes the
//! views naming the current primary/backup pair.

use std::time::Duration;

use serde::{Deserialize, Serialize};

labrpc::service! {
    service view_service {
        fn ping(me: String, viewnum: u64) -> View;
        fn get() -> View;
    }
}

pub use view_service::{Client as ViewClient, Server as ViewServer, Service as ViewService};

mod client;
mod server;

pub use client::Clerk;
pub use server::Monitor;

/// A numbered assignment of the primary and backup roles.
///
/// Views are immutable once issued; the view service only ever supersedes
/// them with the next view number.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct View {
    /// Monotonically increasing view number; 0 is the empty view from
    /// before any server pinged.
    pub viewnum: u64,
    /// The server entitled to apply writes, if any.
    pub primary: Option<String>,
    /// The server shadowing the primary, if any.
    pub backup: Option<String>,
}

impl View {
    /// Whether `id` holds the primary role in this view.
    pub fn is_primary(&self, id: &str) -> bool {
        self.primary.as_deref() == Some(id)
    }

    /// Whether `id` holds the backup role in this view.
    pub fn is_backup(&self, id: &str) -> bool {
        self.backup.as_deref() == Some(id)
    }
}

/// Timing parameters; every node of a deployment must use the same values.
#[derive(Clone, Copy, Debug)]
pub struct Config {
    /// Expected gap between two pings from the same server.
    pub ping_interval: Duration,
    /// Consecutive missed pings after which a server counts as dead.
    pub dead_pings: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_millis(100),
            dead_pings: 5,
        }
    }
}

impl Config {
    /// How long a server may stay silent before it counts as dead.
    pub fn dead_after(&self) -> Duration {
        self.ping_interval * self.dead_pings
    }
}
