// Shared trait for venue transports

use async_trait::async_trait;
use tokio::sync::watch;

use crate::market_data::types::ConnectionStatus;

/// A connection that yields raw text frames. Implementations never look
/// inside the payload; decoding belongs to the normaliser.
#[async_trait]
pub trait FrameSource: Send + Sync {
    /// Idempotent: no-op while connecting or open.
    async fn connect(&self);
    /// Idempotent: no-op while already closed.
    async fn disconnect(&self);
    fn status(&self) -> ConnectionStatus;
    fn watch_status(&self) -> watch::Receiver<ConnectionStatus>;
}

pub mod binance;
pub mod binance_types;
