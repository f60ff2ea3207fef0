use std::collections::VecDeque;
use std::sync::Arc;

use tracing::trace;

use crate::market_data::instruments::InstrumentId;
use crate::market_data::types::{now_ms, TradeEvent};

pub const DEFAULT_WINDOW_MS: u64 = 60 * 1000;
pub const DEFAULT_MAX_TRADES: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowLimits {
    pub duration_ms: u64,
    pub max_trades: usize,
}

impl Default for WindowLimits {
    fn default() -> Self {
        Self { duration_ms: DEFAULT_WINDOW_MS, max_trades: DEFAULT_MAX_TRADES }
    }
}

/// Recent trades for one instrument, oldest first, in arrival order.
///
/// Bounded two ways: nothing at or before `now - duration_ms`, and never
/// more than `max_trades` entries. Each mutation swaps in a new buffer
/// when a reader still holds the old one, so a `snapshot()` taken earlier
/// is never seen half-trimmed.
#[derive(Debug, Clone)]
pub struct TradeWindow {
    instrument: InstrumentId,
    limits: WindowLimits,
    trades: Arc<VecDeque<TradeEvent>>,
}

impl TradeWindow {
    pub fn new(instrument: InstrumentId, limits: WindowLimits) -> Self {
        Self { instrument, limits, trades: Arc::new(VecDeque::new()) }
    }

    pub fn instrument(&self) -> &InstrumentId {
        &self.instrument
    }

    pub fn append(&mut self, trade: TradeEvent) -> bool {
        self.append_at(trade, now_ms())
    }

    /// Returns `false` (and leaves the window alone) for a trade routed to
    /// the wrong instrument.
    pub fn append_at(&mut self, trade: TradeEvent, now_ms: u64) -> bool {
        if trade.instrument != self.instrument {
            trace!(window = %self.instrument, trade = %trade.instrument, "trade for another instrument");
            return false;
        }

        let cutoff = self.cutoff(now_ms);
        let max = self.limits.max_trades;
        let trades = Arc::make_mut(&mut self.trades);

        let before = trades.len();
        trades.retain(|t| t.trade_time_ms > cutoff);
        let aged = before - trades.len();

        trades.push_back(trade);
        let mut capped = 0;
        while trades.len() > max {
            trades.pop_front();
            capped += 1;
        }

        record_evictions(aged, capped);
        true
    }

    /// Drop aged-out trades. Returns whether anything was removed; when
    /// nothing was, the buffer is not touched at all.
    pub fn prune(&mut self, now_ms: u64) -> bool {
        let cutoff = self.cutoff(now_ms);
        let stale = self.trades.iter().filter(|t| t.trade_time_ms <= cutoff).count();
        if stale == 0 {
            return false;
        }

        let trades = Arc::make_mut(&mut self.trades);
        trades.retain(|t| t.trade_time_ms > cutoff);
        record_evictions(stale, 0);
        trace!(instrument = %self.instrument, removed = stale, left = trades.len(), "pruned trade window");
        true
    }

    /// Whether `prune(now_ms)` would remove anything.
    pub fn has_expired(&self, now_ms: u64) -> bool {
        let cutoff = self.cutoff(now_ms);
        self.trades.iter().any(|t| t.trade_time_ms <= cutoff)
    }

    /// Current contents, oldest first. Cheap: shares the buffer.
    pub fn snapshot(&self) -> Arc<VecDeque<TradeEvent>> {
        Arc::clone(&self.trades)
    }

    /// Most recent by arrival.
    pub fn latest(&self) -> Option<&TradeEvent> {
        self.trades.back()
    }

    pub fn len(&self) -> usize {
        self.trades.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trades.is_empty()
    }

    fn cutoff(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.limits.duration_ms)
    }
}

fn record_evictions(aged: usize, capped: usize) {
    if aged > 0 {
        metrics::counter!("tickerwatch_trades_evicted_total", "reason" => "age").increment(aged as u64);
    }
    if capped > 0 {
        metrics::counter!("tickerwatch_trades_evicted_total", "reason" => "count").increment(capped as u64);
    }
}
