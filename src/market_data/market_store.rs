use std::cmp::Reverse;
use std::collections::VecDeque;
use std::sync::Arc;

use ahash::AHashMap;
use ordered_float::OrderedFloat;
use parking_lot::RwLock;
use tracing::{debug, info, instrument, trace, warn};

use crate::market_data::instruments::{InstrumentId, InstrumentSet};
use crate::market_data::trade_window::{TradeWindow, WindowLimits};
use crate::market_data::types::{now_ms, NormalizedEvent, TickerSnapshot, TradeEvent};

pub type TickerMap = AHashMap<InstrumentId, TickerSnapshot>;
pub type WindowMap = AHashMap<InstrumentId, TradeWindow>;

/// Aggregated market state: latest ticker per instrument plus a trade
/// window per instrument.
///
/// Single writer. Both maps sit behind `Arc` and are replaced
/// copy-on-write, so a `MarketView` taken before a mutation keeps
/// describing exactly the state it was taken from.
#[derive(Debug)]
pub struct MarketStore {
    instruments: Arc<InstrumentSet>,
    limits: WindowLimits,
    tickers: Arc<TickerMap>,
    windows: Arc<WindowMap>,
    focused: InstrumentId,
    connected: bool,
    version: u64,
}

impl MarketStore {
    pub fn new(instruments: InstrumentSet, limits: WindowLimits) -> Self {
        let focused = instruments.first().id.clone();
        Self {
            instruments: Arc::new(instruments),
            limits,
            tickers: Arc::new(TickerMap::default()),
            windows: Arc::new(WindowMap::default()),
            focused,
            connected: false,
            version: 0,
        }
    }

    pub fn apply_event(&mut self, event: NormalizedEvent) -> bool {
        self.apply_event_at(event, now_ms())
    }

    /// Route one event. Returns `false` for events about instruments
    /// outside the configured set, which are ignored.
    pub fn apply_event_at(&mut self, event: NormalizedEvent, now_ms: u64) -> bool {
        if !self.instruments.contains(event.instrument()) {
            trace!(instrument = %event.instrument(), kind = event.kind(), "event for unconfigured instrument");
            metrics::counter!("tickerwatch_routing_misses_total", "reason" => "instrument").increment(1);
            return false;
        }
        match event {
            NormalizedEvent::Ticker(ticker) => self.replace_ticker(ticker),
            NormalizedEvent::Trade(trade) => self.append_trade(trade, now_ms),
        }
    }

    fn replace_ticker(&mut self, ticker: TickerSnapshot) -> bool {
        trace!(instrument = %ticker.instrument, price = ticker.last_price, "ticker");
        Arc::make_mut(&mut self.tickers).insert(ticker.instrument.clone(), ticker);
        self.bump();
        true
    }

    fn append_trade(&mut self, trade: TradeEvent, now_ms: u64) -> bool {
        trace!(instrument = %trade.instrument, id = trade.trade_id, price = trade.price, "trade");
        let limits = self.limits;
        let window = Arc::make_mut(&mut self.windows)
            .entry(trade.instrument.clone())
            .or_insert_with(|| TradeWindow::new(trade.instrument.clone(), limits));
        let appended = window.append_at(trade, now_ms);
        if appended {
            self.bump();
        }
        appended
    }

    /// Only instruments from the configured set can take focus. Anything
    /// else leaves the current focus in place and returns `false`.
    #[instrument(level = "debug", skip(self))]
    pub fn select_instrument(&mut self, id: &str) -> bool {
        let Some(descriptor) = self.instruments.get(id) else {
            warn!(requested = id, focused = %self.focused, "ignoring selection of unknown instrument");
            return false;
        };
        if descriptor.id != self.focused {
            self.focused = descriptor.id.clone();
            self.bump();
            debug!(focused = %self.focused, "focus changed");
        }
        true
    }

    /// Age out trades in every window. Returns `false`, without publishing
    /// a new version, when nothing was old enough to drop.
    pub fn prune_all(&mut self, now_ms: u64) -> bool {
        if !self.windows.values().any(|w| w.has_expired(now_ms)) {
            return false;
        }
        let mut removed = 0;
        for window in Arc::make_mut(&mut self.windows).values_mut() {
            if window.prune(now_ms) {
                removed += 1;
            }
        }
        trace!(windows = removed, "pruned idle trade windows");
        self.bump();
        true
    }

    pub fn set_connected(&mut self, connected: bool) {
        if self.connected != connected {
            self.connected = connected;
            self.bump();
        }
    }

    /// Forget all tickers and trades. Focus and connectivity are kept.
    #[instrument(level = "debug", skip(self))]
    pub fn reset(&mut self) {
        self.tickers = Arc::new(TickerMap::default());
        self.windows = Arc::new(WindowMap::default());
        self.bump();
        info!("market state cleared");
    }

    /// Consistent read-only picture of the current state.
    pub fn view(&self) -> MarketView {
        MarketView {
            instruments: Arc::clone(&self.instruments),
            tickers: Arc::clone(&self.tickers),
            windows: Arc::clone(&self.windows),
            focused: self.focused.clone(),
            connected: self.connected,
            version: self.version,
        }
    }

    pub fn instruments(&self) -> &InstrumentSet {
        &self.instruments
    }

    pub fn focused(&self) -> &InstrumentId {
        &self.focused
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Advances once per state change.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn tickers(&self) -> Arc<TickerMap> {
        Arc::clone(&self.tickers)
    }

    pub fn trades(&self, id: &InstrumentId) -> Arc<VecDeque<TradeEvent>> {
        self.windows.get(id).map(TradeWindow::snapshot).unwrap_or_default()
    }

    pub fn focused_snapshot(&self) -> Option<TickerSnapshot> {
        self.tickers.get(&self.focused).cloned()
    }

    pub fn focused_trades(&self) -> Arc<VecDeque<TradeEvent>> {
        self.trades(&self.focused)
    }

    pub fn tickers_by_volume(&self) -> Vec<TickerSnapshot> {
        self.view().tickers_by_volume()
    }

    pub fn tickers_in_config_order(&self) -> Vec<TickerSnapshot> {
        self.view().tickers_in_config_order()
    }

    fn bump(&mut self) {
        self.version += 1;
    }
}

/// Immutable snapshot of the store, cheap to clone and hand to a UI.
#[derive(Debug, Clone)]
pub struct MarketView {
    instruments: Arc<InstrumentSet>,
    tickers: Arc<TickerMap>,
    windows: Arc<WindowMap>,
    pub focused: InstrumentId,
    pub connected: bool,
    pub version: u64,
}

impl MarketView {
    pub fn focused_snapshot(&self) -> Option<&TickerSnapshot> {
        self.tickers.get(&self.focused)
    }

    /// Empty when the focused instrument has no trades yet.
    pub fn focused_trades(&self) -> Arc<VecDeque<TradeEvent>> {
        self.windows.get(&self.focused).map(TradeWindow::snapshot).unwrap_or_default()
    }

    pub fn latest_focused_trade(&self) -> Option<&TradeEvent> {
        self.windows.get(&self.focused).and_then(TradeWindow::latest)
    }

    pub fn ticker(&self, id: &InstrumentId) -> Option<&TickerSnapshot> {
        self.tickers.get(id)
    }

    /// Highest 24h volume first; equal volumes keep configuration order.
    pub fn tickers_by_volume(&self) -> Vec<TickerSnapshot> {
        let mut out = self.tickers_in_config_order();
        out.sort_by_key(|t| Reverse(OrderedFloat(t.volume_24h)));
        out
    }

    /// Configuration order, skipping instruments with no ticker yet.
    pub fn tickers_in_config_order(&self) -> Vec<TickerSnapshot> {
        self.instruments.ids().filter_map(|id| self.tickers.get(id).cloned()).collect()
    }

    pub fn instruments(&self) -> &InstrumentSet {
        &self.instruments
    }
}

/// Shared handle: one writer (the router), any number of readers.
#[derive(Debug, Clone)]
pub struct MarketHandle {
    inner: Arc<RwLock<MarketStore>>,
}

impl MarketHandle {
    pub fn new(store: MarketStore) -> Self {
        Self { inner: Arc::new(RwLock::new(store)) }
    }

    pub fn apply_event(&self, event: NormalizedEvent) -> bool {
        self.inner.write().apply_event(event)
    }

    pub fn select_instrument(&self, id: &str) -> bool {
        self.inner.write().select_instrument(id)
    }

    pub fn prune_all(&self, now_ms: u64) -> bool {
        self.inner.write().prune_all(now_ms)
    }

    pub fn set_connected(&self, connected: bool) {
        self.inner.write().set_connected(connected)
    }

    pub fn reset(&self) {
        self.inner.write().reset()
    }

    pub fn view(&self) -> MarketView {
        self.inner.read().view()
    }

    pub fn read<R>(&self, f: impl FnOnce(&MarketStore) -> R) -> R {
        f(&self.inner.read())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::instruments::InstrumentDescriptor;

    const T0: u64 = 1_700_000_000_000;

    fn store() -> MarketStore {
        let set = InstrumentSet::new(vec![
            InstrumentDescriptor::new("btcusdt", "BTC", "USDT"),
            InstrumentDescriptor::new("ethusdt", "ETH", "USDT"),
            InstrumentDescriptor::new("solusdt", "SOL", "USDT"),
        ])
        .unwrap();
        MarketStore::new(set, WindowLimits::default())
    }

    fn ticker(sym: &str, price: f64, volume: f64) -> NormalizedEvent {
        NormalizedEvent::Ticker(TickerSnapshot {
            instrument: InstrumentId::new(sym),
            last_price: price,
            price_change: 1.0,
            price_change_percent: 0.5,
            volume_24h: volume,
            high_24h: price + 10.0,
            low_24h: price - 10.0,
            event_time_ms: T0,
        })
    }

    fn trade(sym: &str, id: u64, ts: u64) -> NormalizedEvent {
        NormalizedEvent::Trade(TradeEvent {
            instrument: InstrumentId::new(sym),
            price: 10.0,
            quantity: 0.5,
            trade_id: id,
            trade_time_ms: ts,
            is_sell_pressure: false,
        })
    }

    #[test]
    fn test_ticker_replaced_not_merged() {
        let mut s = store();
        s.apply_event_at(ticker("btcusdt", 100.0, 5.0), T0);
        s.apply_event_at(ticker("btcusdt", 101.0, 6.0), T0);
        let tickers = s.tickers();
        assert_eq!(tickers.len(), 1);
        let t = tickers.get(&InstrumentId::new("btcusdt")).unwrap();
        assert_eq!(t.last_price, 101.0);
        assert_eq!(t.volume_24h, 6.0);
    }

    #[test]
    fn test_trades_stay_in_their_window() {
        let mut s = store();
        for i in 0..4 {
            s.apply_event_at(trade("btcusdt", i, T0), T0);
            s.apply_event_at(trade("ethusdt", 100 + i, T0), T0);
        }
        let btc = s.trades(&InstrumentId::new("btcusdt"));
        let eth = s.trades(&InstrumentId::new("ethusdt"));
        assert!(btc.iter().all(|t| t.instrument.as_str() == "btcusdt"));
        assert!(eth.iter().all(|t| t.instrument.as_str() == "ethusdt"));
        assert_eq!(btc.len(), 4);
        assert_eq!(eth.len(), 4);
    }

    #[test]
    fn test_unknown_instrument_events_ignored() {
        let mut s = store();
        assert!(!s.apply_event_at(ticker("dogeusdt", 0.1, 1.0), T0));
        assert!(!s.apply_event_at(trade("dogeusdt", 1, T0), T0));
        assert!(s.tickers().is_empty());
        assert!(s.trades(&InstrumentId::new("dogeusdt")).is_empty());
        assert_eq!(s.version(), 0);
    }

    #[test]
    fn test_select_unknown_keeps_focus() {
        let mut s = store();
        assert_eq!(s.focused().as_str(), "btcusdt");
        assert!(!s.select_instrument("dogeusdt"));
        assert_eq!(s.focused().as_str(), "btcusdt");
        assert!(s.select_instrument("ETHUSDT"));
        assert_eq!(s.focused().as_str(), "ethusdt");
    }

    #[test]
    fn test_volume_and_config_order() {
        let mut s = store();
        s.apply_event_at(ticker("solusdt", 20.0, 900.0), T0);
        s.apply_event_at(ticker("btcusdt", 100.0, 10.0), T0);
        let by_volume: Vec<_> = s.tickers_by_volume().into_iter().map(|t| t.instrument).collect();
        assert_eq!(by_volume, vec![InstrumentId::new("solusdt"), InstrumentId::new("btcusdt")]);
        let in_order: Vec<_> = s.tickers_in_config_order().into_iter().map(|t| t.instrument).collect();
        assert_eq!(in_order, vec![InstrumentId::new("btcusdt"), InstrumentId::new("solusdt")]);
    }

    #[test]
    fn test_prune_all_without_changes_keeps_version() {
        let mut s = store();
        s.apply_event_at(trade("btcusdt", 1, T0), T0);
        let v = s.version();
        assert!(!s.prune_all(T0 + 1_000));
        assert_eq!(s.version(), v);
        assert!(s.prune_all(T0 + 61_000));
        assert_eq!(s.version(), v + 1);
        assert!(s.focused_trades().is_empty());
    }

    #[test]
    fn test_view_is_isolated_from_later_writes() {
        let mut s = store();
        s.apply_event_at(ticker("btcusdt", 100.0, 5.0), T0);
        s.apply_event_at(trade("btcusdt", 1, T0), T0);
        let before = s.view();

        s.apply_event_at(ticker("btcusdt", 200.0, 5.0), T0);
        s.apply_event_at(trade("btcusdt", 2, T0), T0);
        s.prune_all(T0 + 120_000);

        assert_eq!(before.focused_snapshot().unwrap().last_price, 100.0);
        assert_eq!(before.focused_trades().len(), 1);
        assert_eq!(s.view().focused_snapshot().unwrap().last_price, 200.0);
        assert!(s.focused_trades().is_empty());
    }

    #[test]
    fn test_reset_keeps_focus_and_connectivity() {
        let mut s = store();
        s.select_instrument("solusdt");
        s.set_connected(true);
        s.apply_event_at(ticker("solusdt", 20.0, 1.0), T0);
        s.apply_event_at(trade("solusdt", 1, T0), T0);
        s.reset();
        assert!(s.tickers().is_empty());
        assert!(s.focused_snapshot().is_none());
        assert!(s.focused_trades().is_empty());
        assert_eq!(s.focused().as_str(), "solusdt");
        assert!(s.is_connected());
    }

    #[test]
    fn test_handle_shares_state() {
        let handle = MarketHandle::new(store());
        let reader = handle.clone();
        handle.set_connected(true);
        handle.apply_event(ticker("ethusdt", 2000.0, 1.0));
        assert!(handle.select_instrument("ethusdt"));
        let view = reader.view();
        assert!(view.connected);
        assert_eq!(view.focused_snapshot().unwrap().last_price, 2000.0);
        assert_eq!(reader.read(|s| s.version()), view.version);
    }
}
