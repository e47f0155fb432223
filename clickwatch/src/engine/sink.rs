// clickwatch/src/engine/sink.rs
//
// Consumers of tick output. Sinks run on the scheduler's sink worker, never on
// the tick loop; an Err is logged there and does not stop later sinks or ticks.
// on_remove is delivered in order with reports, after the actor's last one.

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::events::{ActorId, TickReport};

#[async_trait]
pub trait TickSink: Send + Sync {
    fn name(&self) -> &'static str;
    async fn handle(&self, report: &TickReport) -> Result<()>;

    /// The actor was evicted by the scheduler; drop anything kept for it.
    async fn on_remove(&self, _actor: &ActorId) -> Result<()> {
        Ok(())
    }
}

/// Forwards every report to a channel, for in-process consumers of the flag
/// signal (command dispatch, tests).
pub struct ChannelSink {
    tx: mpsc::Sender<TickReport>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<TickReport>) -> Self {
        Self { tx }
    }

    /// Sink plus the receiving end, with room for `capacity` reports.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<TickReport>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx), rx)
    }
}

#[async_trait]
impl TickSink for ChannelSink {
    fn name(&self) -> &'static str {
        "channel"
    }

    async fn handle(&self, report: &TickReport) -> Result<()> {
        self.tx
            .send(report.clone())
            .await
            .map_err(|_| anyhow::anyhow!("report receiver dropped"))
    }
}
