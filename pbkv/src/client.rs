use std::time::Duration;

use labrpc::log::debug;
use labrpc::NetHandle;
use viewservice::Clerk as ViewClerk;

use crate::{KvClient, Op, Status};

/// Client handle onto the store.
///
/// Every operation retries until the primary commits it; a call only
/// returns once it has definitively happened. All retries of one logical
/// call carry the same request id, so a primary that already applied the
/// write answers from its at-most-once table instead of re-applying.
pub struct Clerk {
    me: String,
    vs: ViewClerk,
    net: NetHandle,
    retry_interval: Duration,
    client_id: u64,
    next_request: u64,
    primary: Option<String>,
    viewnum: u64,
}

impl Clerk {
    /// A fresh clerk with a random identity; `retry_interval` should be the
    /// deployment's ping interval.
    pub fn new(me: String, vs: ViewClerk, net: NetHandle, retry_interval: Duration) -> Self {
        Self {
            me,
            vs,
            net,
            retry_interval,
            client_id: rand::random(),
            next_request: 1,
            primary: None,
            viewnum: 0,
        }
    }

    async fn refresh_view(&mut self) {
        if let Ok(view) = self.vs.get().await {
            self.primary = view.primary;
            self.viewnum = view.viewnum;
            debug!("{}: view {} names primary {:?}", self.me, self.viewnum, self.primary);
        }
    }

    fn next_request_id(&mut self) -> u64 {
        let id = self.next_request;
        self.next_request += 1;
        id
    }

    /// Read a key; a key that has never been written reads as "".
    pub async fn get(&mut self, key: &str) -> String {
        let request_id = self.next_request_id();
        loop {
            if self.primary.is_none() {
                self.refresh_view().await;
            }
            if let Some(primary) = self.primary.clone() {
                let kv: KvClient = self.net.client(&self.me, &primary);
                match kv.get(key.to_owned(), self.client_id, request_id).await {
                    Ok(reply) if reply.status != Status::WrongServer => return reply.value,
                    Ok(_) | Err(_) => {
                        debug!("{}: {} repudiated or unreachable", self.me, primary);
                        self.primary = None;
                    }
                }
            }
            tokio::time::sleep(self.retry_interval).await;
        }
    }

    /// Overwrite a key.
    pub async fn put(&mut self, key: &str, value: &str) {
        self.put_append(key, value, Op::Put).await;
    }

    /// Concatenate onto a key; an absent value is treated as "".
    pub async fn append(&mut self, key: &str, value: &str) {
        self.put_append(key, value, Op::Append).await;
    }

    async fn put_append(&mut self, key: &str, value: &str, op: Op) {
        let request_id = self.next_request_id();
        loop {
            if self.primary.is_none() {
                self.refresh_view().await;
            }
            if let Some(primary) = self.primary.clone() {
                let kv: KvClient = self.net.client(&self.me, &primary);
                let reply = kv
                    .put_append(
                        key.to_owned(),
                        value.to_owned(),
                        op.clone(),
                        self.client_id,
                        request_id,
                    )
                    .await;
                match reply {
                    Ok(Status::Ok) => return,
                    Ok(Status::WrongServer) | Err(_) => {
                        debug!("{}: {} repudiated or unreachable", self.me, primary);
                        self.primary = None;
                    }
                    Ok(_) => {}
                }
            }
            tokio::time::sleep(self.retry_interval).await;
        }
    }
}
