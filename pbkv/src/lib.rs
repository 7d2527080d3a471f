#![deny(missing_docs)]
#![deny(clippy::all)]
//! Primary/backup replicated key-value store coordinated by the view
//! service, with at-most-once semantics under a lossy network.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

labrpc::service! {
    service kv_service {
        fn get(key: String, client_id: u64, request_id: u64) -> GetReply;
        fn put_append(key: String, value: String, op: Op, client_id: u64, request_id: u64) -> Status;
        fn forward_database(data: HashMap<String, String>, last_applied: HashMap<u64, u64>) -> Status;
        fn forward_put(client_id: u64, request_id: u64, op: Op, key: String, value: String) -> Status;
    }
}

pub use kv_service::{Client as KvClient, Server as KvServer, Service as KvService};

mod client;
mod server;

/// Cluster helpers for testing.
pub mod tests;

pub use client::Clerk;
pub use server::PbServer;

/// Outcome of a key-value operation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    /// The operation was applied, or had already been applied.
    Ok,
    /// The key has never been written.
    NoKey,
    /// The receiving server does not hold the role the caller assumed.
    WrongServer,
}

/// A write operation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Op {
    /// Overwrite the value.
    Put,
    /// Concatenate onto the current value; an absent value reads as "".
    Append,
}

/// Reply to a read.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GetReply {
    /// Outcome; `NoKey` still counts as success for the caller.
    pub status: Status,
    /// The value bound to the key, empty if absent.
    pub value: String,
}
