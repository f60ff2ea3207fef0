// Source: https://developers.binance.com/docs/binance-spot-api-docs/web-socket-streams
// Combined stream frames look like {"stream":"btcusdt@trade","data":{...}}.
use serde::Deserialize;

use crate::market_data::error::DecodeError;

#[derive(Debug, Deserialize)]
pub struct WsEnvelope {
    #[serde(default)]
    pub stream: Option<String>,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

// <symbol>@ticker
#[derive(Debug, Deserialize)]
pub struct WsTicker {
    #[serde(rename = "E")]
    pub event_time: WsInteger,
    #[serde(rename = "s")]
    pub symbol: String,
    #[serde(rename = "p")]
    pub price_change: WsNumber,
    #[serde(rename = "P")]
    pub price_change_percent: WsNumber,
    #[serde(rename = "c")]
    pub last_price: WsNumber,
    #[serde(rename = "h")]
    pub high_price: WsNumber,
    #[serde(rename = "l")]
    pub low_price: WsNumber,
    #[serde(rename = "v")]
    pub base_volume: WsNumber,
    // we ignore the other fields for now
}

// <symbol>@trade
#[derive(Debug, Deserialize)]
pub struct WsTrade {
    #[serde(rename = "s")]
    pub symbol: String,
    #[serde(rename = "t")]
    pub trade_id: WsInteger,
    #[serde(rename = "p")]
    pub price: WsNumber,
    #[serde(rename = "q")]
    pub quantity: WsNumber,
    #[serde(rename = "T")]
    pub trade_time: WsInteger,
    #[serde(rename = "m")]
    pub buyer_is_maker: bool,
}

/// Binance sends most decimals as strings, but not all feeds agree.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum WsNumber {
    Number(f64),
    Text(String),
}

impl WsNumber {
    pub fn to_f64(&self, field: &'static str) -> Result<f64, DecodeError> {
        match self {
            WsNumber::Number(n) => Ok(*n),
            WsNumber::Text(s) => s.trim().parse::<f64>().map_err(|_| DecodeError::NotNumeric {
                field,
                value: s.clone(),
            }),
        }
    }
}

/// Ids and millisecond timestamps, same text-or-number leniency.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum WsInteger {
    Number(u64),
    Text(String),
}

impl WsInteger {
    pub fn to_u64(&self, field: &'static str) -> Result<u64, DecodeError> {
        match self {
            WsInteger::Number(n) => Ok(*n),
            WsInteger::Text(s) => s.trim().parse::<u64>().map_err(|_| DecodeError::NotNumeric {
                field,
                value: s.clone(),
            }),
        }
    }
}

/// Which payload a combined-stream name carries, keyed by suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Ticker,
    Trade,
}

impl StreamKind {
    pub const ALL: [StreamKind; 2] = [StreamKind::Ticker, StreamKind::Trade];

    pub fn suffix(self) -> &'static str {
        match self {
            StreamKind::Ticker => "@ticker",
            StreamKind::Trade => "@trade",
        }
    }

    pub fn from_stream(stream: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| stream.ends_with(k.suffix()))
    }
}
