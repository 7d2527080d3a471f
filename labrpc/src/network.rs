use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::Future;
use log::{trace, warn};
use rand::Rng;
use tokio::sync::mpsc::{self, Receiver, Sender};

use crate::client::Client;
use crate::server::Server;

/// A request in flight: who sent it, where it goes, the channel its reply
/// travels back on, and the serialized payload.
#[derive(Debug, Clone)]
pub struct Packet {
    pub from: String,
    pub to: String,
    pub reply: Sender<String>,
    pub data: String,
}

#[derive(Debug, Default)]
struct Faults {
    drop_rate: f64,
    down: HashSet<String>,
    cut: HashSet<(String, String)>,
}

/// Switchboard deciding which messages the network lets through.
///
/// Requests and replies are checked independently, so a reply can be lost
/// after the server has already applied the operation.
#[derive(Debug, Clone, Default)]
pub struct NetCtl {
    faults: Arc<Mutex<Faults>>,
}

impl NetCtl {
    /// Drop each message independently with probability `rate`.
    pub fn set_drop_rate(&self, rate: f64) {
        self.faults.lock().unwrap().drop_rate = rate;
    }

    /// Make a node unreachable, as if it crashed or lost its uplink.
    pub fn take_down(&self, id: &str) {
        warn!("{} taken down", id);
        self.faults.lock().unwrap().down.insert(id.to_owned());
    }

    /// Reconnect a node previously taken down.
    pub fn restore(&self, id: &str) {
        self.faults.lock().unwrap().down.remove(id);
    }

    /// Cut the link between `a` and `b` in both directions.
    pub fn cut(&self, a: &str, b: &str) {
        warn!("link {} <-> {} cut", a, b);
        let mut faults = self.faults.lock().unwrap();
        faults.cut.insert((a.to_owned(), b.to_owned()));
        faults.cut.insert((b.to_owned(), a.to_owned()));
    }

    /// Heal a link previously cut.
    pub fn heal(&self, a: &str, b: &str) {
        let mut faults = self.faults.lock().unwrap();
        faults.cut.remove(&(a.to_owned(), b.to_owned()));
        faults.cut.remove(&(b.to_owned(), a.to_owned()));
    }

    fn allows(&self, from: &str, to: &str) -> bool {
        let faults = self.faults.lock().unwrap();
        if faults.down.contains(from) || faults.down.contains(to) {
            return false;
        }
        if faults.cut.contains(&(from.to_owned(), to.to_owned())) {
            return false;
        }
        faults.drop_rate == 0.0 || rand::thread_rng().gen_range(0.0..1.0) >= faults.drop_rate
    }
}

/// Handle for registering services and opening clients once the router
/// task is running.
#[derive(Debug, Clone)]
pub struct NetHandle {
    pub tx: Sender<Packet>,
    nodes: Arc<Mutex<HashMap<String, Sender<Packet>>>>,
    ctl: NetCtl,
}

impl NetHandle {
    /// Register a service under `id` and hand back its routine for spawning.
    ///
    /// Re-registering an id replaces the previous instance; together with
    /// [`NetCtl::restore`] this models a restart with fresh state.
    pub fn register_service<S, V>(
        &self,
        id: String,
        svc: V,
        tick: Option<Duration>,
    ) -> impl Future<Output = ()>
    where
        S: Server<Service = V> + Send + 'static,
    {
        let mut server = S::from_service(svc);
        if let Some(interval) = tick {
            server.set_tick_interval(interval);
        }
        self.nodes.lock().unwrap().insert(id, server.client_chan());
        async move {
            if let Err(e) = server.run().await {
                warn!("server exited: {}", e);
            }
        }
    }

    /// Open a client handle that calls `server_id` on behalf of `me`.
    pub fn client<C: Client>(&self, me: &str, server_id: &str) -> C {
        C::new(me.to_owned(), server_id.to_owned(), self.tx.clone())
    }

    /// The fault switchboard.
    pub fn ctl(&self) -> &NetCtl {
        &self.ctl
    }
}

/// The simulated network: a single router task moving packets between nodes.
pub struct Network {
    handle: NetHandle,
    rx: Receiver<Packet>,
}

impl Network {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel(100);
        Self {
            handle: NetHandle {
                tx,
                nodes: Arc::new(Mutex::new(HashMap::new())),
                ctl: NetCtl::default(),
            },
            rx,
        }
    }

    pub fn handle(&self) -> NetHandle {
        self.handle.clone()
    }

    /// Route packets until every sender is gone.
    pub async fn run(mut self) {
        while let Some(pkt) = self.rx.recv().await {
            let ctl = self.handle.ctl.clone();
            if !ctl.allows(&pkt.from, &pkt.to) {
                trace!("request {} -> {} dropped", pkt.from, pkt.to);
                continue;
            }
            let node = self.handle.nodes.lock().unwrap().get(&pkt.to).cloned();
            let node = match node {
                Some(node) => node,
                None => {
                    warn!("node {} not found", pkt.to);
                    continue;
                }
            };
            let Packet {
                from,
                to,
                reply,
                data,
            } = pkt;
            let (tx, mut rx) = mpsc::channel(1);
            let routed = Packet {
                from: from.clone(),
                to: to.clone(),
                reply: tx,
                data,
            };
            if node.send(routed).await.is_err() {
                warn!("send to {} failed, dropped", to);
                continue;
            }
            // The reply crosses the same faulty network.
            tokio::spawn(async move {
                if let Some(resp) = rx.recv().await {
                    if ctl.allows(&to, &from) {
                        let _ = reply.send(resp).await;
                    } else {
                        trace!("reply {} -> {} dropped", to, from);
                    }
                }
            });
        }
    }
}
