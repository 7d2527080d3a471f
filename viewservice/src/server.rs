use std::collections::HashMap;
use std::time::Instant;

use labrpc::anyhow::Result;
use labrpc::log::info;

use crate::{Config, View, ViewService};

#[derive(Debug)]
struct PingRecord {
    last_ping: Instant,
    viewnum: u64,
}

/// The view server: tracks which replicas are alive and serially issues
/// the views assigning the primary and backup roles.
pub struct Monitor {
    cfg: Config,
    view: View,
    acknowledged: bool,
    servers: HashMap<String, PingRecord>,
}

impl Monitor {
    /// A monitor starting at the empty view, which needs no acknowledgement.
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            view: View::default(),
            acknowledged: true,
            servers: HashMap::new(),
        }
    }

    fn alive(&self, id: &str, now: Instant) -> bool {
        self.servers
            .get(id)
            .map_or(false, |r| now.duration_since(r.last_ping) < self.cfg.dead_after())
    }

    /// A server that has reported a nonzero view number adopted some view
    /// in the past and may hold data.
    fn initialized(&self, id: &str) -> bool {
        self.servers.get(id).map_or(false, |r| r.viewnum > 0)
    }

    fn install(&mut self, primary: Option<String>, backup: Option<String>) {
        self.view = View {
            viewnum: self.view.viewnum + 1,
            primary,
            backup,
        };
        self.acknowledged = false;
        info!(
            "view {}: primary {:?}, backup {:?}",
            self.view.viewnum, self.view.primary, self.view.backup
        );
    }

    /// The server a failed primary's role falls to: the backup when it is
    /// usable, otherwise any live server that has been in a view before.
    fn successor(&self, now: Instant) -> Option<String> {
        if let Some(backup) = self.view.backup.as_deref() {
            if self.alive(backup, now) && self.initialized(backup) {
                return Some(backup.to_owned());
            }
        }
        self.idle_server(now, true)
    }

    /// Some live server holding neither role; `initialized_only` restricts
    /// the search to servers that have been in a view.
    fn idle_server(&self, now: Instant, initialized_only: bool) -> Option<String> {
        self.servers
            .keys()
            .find(|id| {
                let id = id.as_str();
                !self.view.is_primary(id)
                    && !self.view.is_backup(id)
                    && self.alive(id, now)
                    && (!initialized_only || self.initialized(id))
            })
            .cloned()
    }

    /// Advance by at most one view. An unacknowledged view never moves,
    /// whatever liveness says: its primary may not have synchronised a
    /// backup yet, and moving past it loses writes.
    fn advance(&mut self, now: Instant) {
        if !self.acknowledged {
            return;
        }
        let primary = match self.view.primary.clone() {
            Some(primary) => primary,
            None => return,
        };

        let restarted = self.servers.get(&primary).map_or(false, |r| r.viewnum == 0);
        if !self.alive(&primary, now) || restarted {
            if let Some(next) = self.successor(now) {
                self.install(Some(next), None);
                return;
            }
            if let Some(backup) = self.view.backup.as_deref() {
                if !self.alive(&primary, now) && !self.alive(backup, now) {
                    // both replicas gone and nobody usable is left
                    self.install(None, None);
                    return;
                }
            }
        }

        if let Some(backup) = self.view.backup.clone() {
            if !self.alive(&backup, now) {
                self.install(Some(primary), None);
            }
        } else if let Some(idle) = self.idle_server(now, false) {
            self.install(Some(primary), Some(idle));
        }
    }
}

#[labrpc::async_trait]
impl ViewService for Monitor {
    async fn ping(&mut self, me: String, viewnum: u64) -> Result<View> {
        let now = Instant::now();
        let record = self.servers.entry(me.clone()).or_insert(PingRecord {
            last_ping: now,
            viewnum,
        });
        record.last_ping = now;
        record.viewnum = viewnum;

        if self.view.is_primary(&me) && viewnum == self.view.viewnum {
            if !self.acknowledged {
                info!("view {} acknowledged by {}", viewnum, me);
            }
            self.acknowledged = true;
        }

        if self.view.viewnum == 0 {
            // first contact ever: the pinging server becomes the primary
            self.install(Some(me), None);
        } else {
            self.advance(now);
        }

        Ok(self.view.clone())
    }

    async fn get(&mut self) -> Result<View> {
        Ok(self.view.clone())
    }

    async fn tick(&mut self) -> Result<()> {
        // notice deaths even when no ping arrives to report them
        self.advance(Instant::now());
        Ok(())
    }
}
