// Convert raw combined-stream frames into domain events.
// Stateless: safe to call from anywhere, any number of times.

use tracing::{trace, warn};

use crate::market_data::adapters::binance_types::{StreamKind, WsEnvelope, WsTicker, WsTrade};
use crate::market_data::error::DecodeError;
use crate::market_data::instruments::InstrumentId;
use crate::market_data::types::{NormalizedEvent, TickerSnapshot, TradeEvent};

// Enough of a bad frame to recognise it in the logs.
const FRAME_PREVIEW_LEN: usize = 160;

/// Decode one frame, swallowing failures.
///
/// Malformed frames are logged and counted, then dropped; frames on
/// streams we don't consume come back as `None` without noise.
pub fn normalize(raw: &str) -> Option<NormalizedEvent> {
    match decode(raw) {
        Ok(Some(event)) => {
            metrics::counter!("tickerwatch_frames_decoded_total", "kind" => event.kind()).increment(1);
            Some(event)
        }
        Ok(None) => {
            metrics::counter!("tickerwatch_routing_misses_total", "reason" => "stream").increment(1);
            None
        }
        Err(e) => {
            metrics::counter!("tickerwatch_decode_errors_total").increment(1);
            warn!(error = %e, frame = %preview(raw), "dropping undecodable frame");
            None
        }
    }
}

/// `Ok(None)` means the frame was well formed but on a stream we ignore.
pub fn decode(raw: &str) -> Result<Option<NormalizedEvent>, DecodeError> {
    let envelope: WsEnvelope = serde_json::from_str(raw)?;
    let stream = envelope
        .stream
        .filter(|s| !s.is_empty())
        .ok_or(DecodeError::MissingField("stream"))?;
    let data = envelope
        .data
        .filter(|d| !d.is_null())
        .ok_or(DecodeError::MissingField("data"))?;

    let event = match StreamKind::from_stream(&stream) {
        Some(StreamKind::Ticker) => NormalizedEvent::Ticker(ticker_from_wire(serde_json::from_value(data)?)?),
        Some(StreamKind::Trade) => NormalizedEvent::Trade(trade_from_wire(serde_json::from_value(data)?)?),
        None => {
            trace!(%stream, "ignoring unrecognised stream");
            return Ok(None);
        }
    };
    Ok(Some(event))
}

pub fn ticker_from_wire(msg: WsTicker) -> Result<TickerSnapshot, DecodeError> {
    Ok(TickerSnapshot {
        instrument: InstrumentId::new(&msg.symbol),
        last_price: msg.last_price.to_f64("c")?,
        price_change: msg.price_change.to_f64("p")?,
        price_change_percent: msg.price_change_percent.to_f64("P")?,
        volume_24h: msg.base_volume.to_f64("v")?,
        high_24h: msg.high_price.to_f64("h")?,
        low_24h: msg.low_price.to_f64("l")?,
        event_time_ms: msg.event_time.to_u64("E")?,
    })
}

pub fn trade_from_wire(msg: WsTrade) -> Result<TradeEvent, DecodeError> {
    Ok(TradeEvent {
        instrument: InstrumentId::new(&msg.symbol),
        price: msg.price.to_f64("p")?,
        quantity: msg.quantity.to_f64("q")?,
        trade_id: msg.trade_id.to_u64("t")?,
        trade_time_ms: msg.trade_time.to_u64("T")?,
        is_sell_pressure: msg.buyer_is_maker,
    })
}

fn preview(raw: &str) -> &str {
    match raw.char_indices().nth(FRAME_PREVIEW_LEN) {
        Some((idx, _)) => &raw[..idx],
        None => raw,
    }
}
