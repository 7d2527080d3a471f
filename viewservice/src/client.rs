use labrpc::anyhow::Result;

use crate::{View, ViewClient};

/// A handle onto the view service, used by replicas to report liveness and
/// by clients to find the primary.
#[derive(Debug, Clone)]
pub struct Clerk {
    me: String,
    vs: ViewClient,
}

impl Clerk {
    /// `me` is the identity liveness is reported under.
    pub fn new(me: String, vs: ViewClient) -> Self {
        Self { me, vs }
    }

    /// Report liveness at `viewnum` and learn the current view.
    pub async fn ping(&self, viewnum: u64) -> Result<View> {
        self.vs.ping(self.me.clone(), viewnum).await
    }

    /// Fetch the current view without side effects.
    pub async fn get(&self) -> Result<View> {
        self.vs.get().await
    }

    /// The current primary, if the view service is reachable and has one.
    pub async fn primary(&self) -> Option<String> {
        match self.vs.get().await {
            Ok(view) => view.primary,
            Err(_) => None,
        }
    }
}
