use tokio::sync::mpsc::Sender;

use crate::network::Packet;

/// Constructor for generated client handles.
pub trait Client {
    /// `me` is the caller's identity on the network, `server_id` the callee's.
    fn new(me: String, server_id: String, net_tx: Sender<Packet>) -> Self;
}
