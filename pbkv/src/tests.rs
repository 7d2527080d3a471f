//! Helpers for spinning up a full deployment on the simulated network.

use std::time::Duration;

use labrpc::{NetCtl, NetHandle, Network};
use viewservice::{Clerk as ViewClerk, Config, Monitor, View, ViewClient, ViewServer};

use crate::{Clerk, KvServer, PbServer};

/// Well-known id of the view server on the test network.
pub const VIEW_SERVER: &str = "viewserver";

/// A view server plus replicas `kv-0..n`, all ticking, on one network.
pub struct Cluster {
    /// Timing parameters shared by every node of the deployment.
    pub cfg: Config,
    net: NetHandle,
}

impl Cluster {
    /// Start the router, the view server and `n` replicas.
    pub fn start(cfg: Config, n: usize) -> Self {
        let net = Network::new();
        let handle = net.handle();
        tokio::spawn(net.run());
        tokio::spawn(handle.register_service::<ViewServer<Monitor>, _>(
            VIEW_SERVER.to_owned(),
            Monitor::new(cfg),
            Some(cfg.ping_interval),
        ));

        let cluster = Self { cfg, net: handle };
        for i in 0..n {
            cluster.start_server(i);
        }
        cluster
    }

    /// Id of the `i`th replica.
    pub fn server_id(i: usize) -> String {
        format!("kv-{}", i)
    }

    /// Start replica `i`; restarting a crashed replica brings it back with
    /// empty state, so it pings with viewnum 0.
    pub fn start_server(&self, i: usize) {
        let id = Self::server_id(i);
        let vs = ViewClerk::new(id.clone(), self.net.client::<ViewClient>(&id, VIEW_SERVER));
        let svc = PbServer::new(id.clone(), vs, self.net.clone());
        self.net.ctl().restore(&id);
        let routine =
            self.net
                .register_service::<KvServer<PbServer>, _>(id, svc, Some(self.cfg.ping_interval));
        tokio::spawn(routine);
    }

    /// Make replica `i` unreachable until restored or restarted.
    pub fn crash_server(&self, i: usize) {
        self.net.ctl().take_down(&Self::server_id(i));
    }

    /// The fault switchboard.
    pub fn ctl(&self) -> &NetCtl {
        self.net.ctl()
    }

    /// The network handle, for raw clients and extra nodes.
    pub fn net(&self) -> &NetHandle {
        &self.net
    }

    /// A clerk named `name` with a fresh client identity.
    pub fn clerk(&self, name: &str) -> Clerk {
        let vs = ViewClerk::new(
            name.to_owned(),
            self.net.client::<ViewClient>(name, VIEW_SERVER),
        );
        Clerk::new(name.to_owned(), vs, self.net.clone(), self.cfg.ping_interval)
    }

    /// A view-service clerk for observing (or impersonating) `name`.
    pub fn view_clerk(&self, name: &str) -> ViewClerk {
        ViewClerk::new(
            name.to_owned(),
            self.net.client::<ViewClient>(name, VIEW_SERVER),
        )
    }

    /// Sleep for `intervals` ping intervals.
    pub async fn settle(&self, intervals: u32) {
        tokio::time::sleep(self.cfg.ping_interval * intervals).await;
    }

    /// Poll the view service until `pred` holds, panicking after `timeout`.
    pub async fn wait_for_view<F>(&self, timeout: Duration, pred: F) -> View
    where
        F: Fn(&View) -> bool,
    {
        let observer = self.view_clerk("observer");
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Ok(view) = observer.get().await {
                if pred(&view) {
                    return view;
                }
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "view did not converge in time"
            );
            tokio::time::sleep(self.cfg.ping_interval).await;
        }
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_cluster_round_trip() {
    let _ = env_logger::builder().is_test(true).try_init();
    let cfg = Config {
        ping_interval: Duration::from_millis(25),
        dead_pings: 4,
    };
    let cluster = Cluster::start(cfg, 2);

    let mut ck = cluster.clerk("ck");
    ck.put("x", "1").await;
    assert_eq!(ck.get("x").await, "1");
}
