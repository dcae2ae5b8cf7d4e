// ABOUTME: The EventSink capability through which a turn writes its ordered event stream.
// ABOUTME: Implemented for tokio mpsc senders; the receiving end feeds the SSE response.

use async_trait::async_trait;
use tokio::sync::mpsc;

use huddle_core::TurnEvent;

/// The receiving side of the stream has gone away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("event sink closed")]
pub struct SinkClosed;

#[async_trait]
pub trait EventSink: Send + Sync {
    async fn emit(&self, event: TurnEvent) -> Result<(), SinkClosed>;
}

#[async_trait]
impl EventSink for mpsc::Sender<TurnEvent> {
    async fn emit(&self, event: TurnEvent) -> Result<(), SinkClosed> {
        self.send(event).await.map_err(|_| SinkClosed)
    }
}
