// Router drives the store: raw frames, transport status and the prune
// clock all funnel through this one task, so the store has a single writer.
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::market_data::market_store::MarketHandle;
use crate::market_data::normaliser;
use crate::market_data::types::{now_ms, ConnectionStatus};

pub async fn run_router(
    mut frames: mpsc::Receiver<String>,
    mut status: watch::Receiver<ConnectionStatus>,
    store: MarketHandle,
    prune_every: Duration,
) {
    info!(prune_every_ms = prune_every.as_millis() as u64, "router started");
    store.set_connected(status.borrow_and_update().is_open());

    let mut prune = tokio::time::interval(prune_every);
    prune.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let mut status_live = true;

    loop {
        tokio::select! {
            frame = frames.recv() => {
                let Some(raw) = frame else {
                    debug!("frame channel closed");
                    break;
                };
                if let Some(event) = normaliser::normalize(&raw) {
                    store.apply_event(event);
                }
            }
            changed = status.changed(), if status_live => {
                if changed.is_err() {
                    // transport dropped; keep serving frames already queued
                    status_live = false;
                    store.set_connected(false);
                    continue;
                }
                let current = *status.borrow_and_update();
                match current {
                    ConnectionStatus::Error => warn!("market data feed failed, state is now stale"),
                    other => debug!(status = %other, "transport status"),
                }
                store.set_connected(current.is_open());
            }
            _ = prune.tick() => {
                store.prune_all(now_ms());
            }
        }
    }

    store.set_connected(false);
    info!("router stopped");
}
