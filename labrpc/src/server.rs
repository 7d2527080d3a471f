use std::time::Duration;

use anyhow::Result;
use log::error;
use tokio::sync::mpsc::Sender;
use tokio::time::MissedTickBehavior;

use crate::network::Packet;

enum Event {
    Tick,
    Packet(Option<Packet>),
}

/// The receiving half of a service: one task owns the service value, so
/// ticks and requests are serialized through a single critical section.
#[async_trait::async_trait]
pub trait Server {
    type Service;

    fn from_service(svc: Self::Service) -> Self;
    fn client_chan(&self) -> Sender<Packet>;
    fn set_tick_interval(&mut self, interval: Duration);
    fn tick_interval(&self) -> Option<Duration>;

    async fn recv(&mut self) -> Option<Packet>;
    async fn process(&mut self, pkt: Packet) -> Result<()>;
    async fn tick(&mut self) -> Result<()>;

    /// Serve until every sender to this node is gone. A failed handler
    /// drops its reply instead of taking the server down; the caller sees
    /// a lost message and retries.
    async fn run(&mut self) -> Result<()> {
        let mut timer = self.tick_interval().map(|interval| {
            let mut timer = tokio::time::interval(interval);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
            timer
        });
        loop {
            let event = match timer.as_mut() {
                Some(timer) => tokio::select! {
                    _ = timer.tick() => Event::Tick,
                    pkt = self.recv() => Event::Packet(pkt),
                },
                None => Event::Packet(self.recv().await),
            };
            match event {
                Event::Tick => {
                    if let Err(e) = self.tick().await {
                        error!("tick failed: {}", e);
                    }
                }
                Event::Packet(Some(pkt)) => {
                    if let Err(e) = self.process(pkt).await {
                        error!("request dropped: {}", e);
                    }
                }
                Event::Packet(None) => return Ok(()),
            }
        }
    }
}
