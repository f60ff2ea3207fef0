use crate::market_data::instruments::InstrumentId;

/// Latest 24h rolling summary for one instrument. Always replaced whole.
#[derive(Debug, Clone, PartialEq)]
pub struct TickerSnapshot {
    pub instrument: InstrumentId,
    pub last_price: f64,
    pub price_change: f64,
    pub price_change_percent: f64,
    pub volume_24h: f64,
    pub high_24h: f64,
    pub low_24h: f64,
    pub event_time_ms: u64,
}

// Single public trade print
#[derive(Debug, Clone, PartialEq)]
pub struct TradeEvent {
    pub instrument: InstrumentId,
    pub price: f64,
    pub quantity: f64,
    pub trade_id: u64,
    pub trade_time_ms: u64,
    pub is_sell_pressure: bool, // buyer was the maker
}

/// One decoded wire frame.
#[derive(Debug, Clone, PartialEq)]
pub enum NormalizedEvent {
    Ticker(TickerSnapshot),
    Trade(TradeEvent),
}

impl NormalizedEvent {
    pub fn instrument(&self) -> &InstrumentId {
        match self {
            NormalizedEvent::Ticker(t) => &t.instrument,
            NormalizedEvent::Trade(t) => &t.instrument,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            NormalizedEvent::Ticker(_) => "ticker",
            NormalizedEvent::Trade(_) => "trade",
        }
    }
}

/// Transport connectivity as seen by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionStatus {
    Connecting,
    Open,
    Closing,
    Closed,
    /// Retries exhausted; only a manual `connect` leaves this state.
    Error,
}

impl ConnectionStatus {
    pub fn is_open(self) -> bool {
        self == ConnectionStatus::Open
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Open => "open",
            ConnectionStatus::Closing => "closing",
            ConnectionStatus::Closed => "closed",
            ConnectionStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
