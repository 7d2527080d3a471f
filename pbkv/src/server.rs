use std::collections::HashMap;

use labrpc::anyhow::Result;
use labrpc::log::{debug, info};
use labrpc::NetHandle;
use viewservice::{Clerk as ViewClerk, View};

use crate::{GetReply, KvClient, KvService, Op, Status};

/// One replica of the store.
///
/// Holds the key-value map, the at-most-once table and the last adopted
/// view; the server loop serializes ticks and requests, so every handler
/// runs inside the replica's single critical section.
pub struct PbServer {
    me: String,
    vs: ViewClerk,
    net: NetHandle,
    view: View,
    kv: HashMap<String, String>,
    last_applied: HashMap<u64, u64>,
}

impl PbServer {
    /// A fresh replica. It knows no view yet and pings with viewnum 0,
    /// which the view service reads as a (re)start.
    pub fn new(me: String, vs: ViewClerk, net: NetHandle) -> Self {
        Self {
            me,
            vs,
            net,
            view: View::default(),
            kv: HashMap::new(),
            last_applied: HashMap::new(),
        }
    }

    fn apply(&mut self, op: &Op, key: String, value: String) {
        match op {
            Op::Put => {
                self.kv.insert(key, value);
            }
            Op::Append => {
                self.kv.entry(key).or_default().push_str(&value);
            }
        }
    }

    fn duplicate(&self, client_id: u64, request_id: u64) -> bool {
        self.last_applied.get(&client_id) == Some(&request_id)
    }

    fn backup_client(&self, backup: &str) -> KvClient {
        self.net.client(&self.me, backup)
    }

    /// Push the whole database plus the dedup table to the backup.
    async fn sync_backup(&self, backup: &str) -> bool {
        let reply = self
            .backup_client(backup)
            .forward_database(self.kv.clone(), self.last_applied.clone())
            .await;
        matches!(reply, Ok(Status::Ok))
    }
}

#[labrpc::async_trait]
impl KvService for PbServer {
    async fn get(&mut self, key: String, client_id: u64, request_id: u64) -> Result<GetReply> {
        // Our adopted view may be stale; ask the view service who the
        // primary really is before answering.
        let real = self.vs.ping(self.view.viewnum).await?;
        if !real.is_primary(&self.me) {
            return Ok(GetReply {
                status: Status::WrongServer,
                value: String::new(),
            });
        }

        if let Some(&last) = self.last_applied.get(&client_id) {
            if last >= request_id {
                let value = self.kv.get(&key).cloned().unwrap_or_default();
                return Ok(GetReply {
                    status: Status::Ok,
                    value,
                });
            }
        }

        let reply = match self.kv.get(&key) {
            Some(value) => GetReply {
                status: Status::Ok,
                value: value.clone(),
            },
            None => GetReply {
                status: Status::NoKey,
                value: String::new(),
            },
        };
        self.last_applied.insert(client_id, request_id);
        Ok(reply)
    }

    async fn put_append(
        &mut self,
        key: String,
        value: String,
        op: Op,
        client_id: u64,
        request_id: u64,
    ) -> Result<Status> {
        if !self.view.is_primary(&self.me) {
            return Ok(Status::WrongServer);
        }
        if self.duplicate(client_id, request_id) {
            // a retransmission of a write we already applied
            return Ok(Status::Ok);
        }
        if let Some(backup) = self.view.backup.clone() {
            // the backup must hold the write before we do
            let forwarded = self
                .backup_client(&backup)
                .forward_put(client_id, request_id, op.clone(), key.clone(), value.clone())
                .await?;
            if forwarded != Status::Ok {
                return Ok(forwarded);
            }
        }
        self.apply(&op, key, value);
        self.last_applied.insert(client_id, request_id);
        Ok(Status::Ok)
    }

    async fn forward_database(
        &mut self,
        data: HashMap<String, String>,
        last_applied: HashMap<u64, u64>,
    ) -> Result<Status> {
        if !self.view.is_backup(&self.me) {
            return Ok(Status::WrongServer);
        }
        self.kv = data;
        self.last_applied = last_applied;
        Ok(Status::Ok)
    }

    async fn forward_put(
        &mut self,
        client_id: u64,
        request_id: u64,
        op: Op,
        key: String,
        value: String,
    ) -> Result<Status> {
        if !self.view.is_backup(&self.me) {
            return Ok(Status::WrongServer);
        }
        if !self.duplicate(client_id, request_id) {
            self.apply(&op, key, value);
            self.last_applied.insert(client_id, request_id);
        }
        Ok(Status::Ok)
    }

    async fn tick(&mut self) -> Result<()> {
        let real = match self.vs.ping(self.view.viewnum).await {
            Ok(view) => view,
            // view server unreachable; keep serving the adopted view
            Err(_) => return Ok(()),
        };

        if real.is_primary(&self.me) {
            if real.viewnum > self.view.viewnum {
                // entering a new view as primary: the backup must hold our
                // state before the view may be acknowledged
                let synced = match real.backup.as_deref() {
                    Some(backup) => self.sync_backup(backup).await,
                    None => true,
                };
                if synced {
                    info!("{} takes over as primary of view {}", self.me, real.viewnum);
                    self.view = real;
                } else {
                    debug!(
                        "{}: database transfer for view {} failed, staying at {}",
                        self.me, real.viewnum, self.view.viewnum
                    );
                }
                // acknowledges the new view, or repeats the old viewnum if
                // the transfer has not gone through yet
                let _ = self.vs.ping(self.view.viewnum).await;
            } else if let Some(backup) = real.backup.clone() {
                // keep the backup converged; repairs one installed mid-view
                // and any forward lost on the wire
                let _ = self.sync_backup(&backup).await;
            }
        } else if real.viewnum > self.view.viewnum {
            debug!("{} adopts view {} as {}", self.me, real.viewnum, role(&real, &self.me));
            self.view = real;
            let _ = self.vs.ping(self.view.viewnum).await;
        }
        Ok(())
    }
}

fn role(view: &View, me: &str) -> &'static str {
    if view.is_backup(me) {
        "backup"
    } else {
        "idle"
    }
}
