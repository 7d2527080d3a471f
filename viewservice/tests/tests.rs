use std::time::Duration;

use labrpc::{NetHandle, Network};
use viewservice::{Clerk, Config, Monitor, View, ViewClient, ViewServer};

const VIEW_SERVER: &str = "viewserver";

fn test_config() -> Config {
    Config {
        ping_interval: Duration::from_millis(20),
        dead_pings: 3,
    }
}

fn clerk(net: &NetHandle, me: &str) -> Clerk {
    let vs: ViewClient = net.client(me, VIEW_SERVER);
    Clerk::new(me.to_owned(), vs)
}

/// A replica stub that pings every interval and adopts whatever view it is
/// handed, acknowledging when it happens to be the primary.
fn spawn_replica(net: &NetHandle, id: &str, interval: Duration) {
    let clerk = clerk(net, id);
    tokio::spawn(async move {
        let mut viewnum = 0;
        loop {
            if let Ok(view) = clerk.ping(viewnum).await {
                viewnum = view.viewnum;
            }
            tokio::time::sleep(interval).await;
        }
    });
}

async fn wait_for(observer: &Clerk, cfg: Config, pred: impl Fn(&View) -> bool) -> View {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        if let Ok(view) = observer.get().await {
            if pred(&view) {
                return view;
            }
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "view server did not converge"
        );
        tokio::time::sleep(cfg.ping_interval).await;
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_view_progression() {
    let _ = env_logger::builder().is_test(true).try_init();
    let cfg = test_config();

    let net = Network::new();
    let handle = net.handle();
    tokio::spawn(net.run());
    tokio::spawn(handle.register_service::<ViewServer<Monitor>, _>(
        VIEW_SERVER.to_owned(),
        Monitor::new(cfg),
        Some(cfg.ping_interval),
    ));

    spawn_replica(&handle, "a", cfg.ping_interval);
    spawn_replica(&handle, "b", cfg.ping_interval);

    let observer = clerk(&handle, "observer");
    let view = wait_for(&observer, cfg, |v| v.primary.is_some() && v.backup.is_some()).await;
    let primary = view.primary.unwrap();
    let backup = view.backup.unwrap();

    // killing the primary promotes the backup
    handle.ctl().take_down(&primary);
    let view = wait_for(&observer, cfg, |v| v.is_primary(&backup)).await;
    assert!(!view.is_backup(&primary));

    // the dead server comes back and is re-admitted as backup
    handle.ctl().restore(&primary);
    let view = wait_for(&observer, cfg, |v| v.is_backup(&primary)).await;
    assert!(view.is_primary(&backup));
}
