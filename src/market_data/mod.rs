// Market data module entrypoint
pub mod adapters;       // venue transport (Binance combined streams)
pub mod error;          // decode + transport error taxonomy
pub mod instruments;    // static instrument set, case-normalized ids
pub mod market_store;   // snapshot map + per-instrument trade windows
pub mod normaliser;     // wire frames -> NormalizedEvent
pub mod router;         // drives frames and status into the store
pub mod trade_window;   // age/count bounded trade buffer
pub mod types;          // domain model

pub use instruments::{InstrumentDescriptor, InstrumentId, InstrumentSet};
pub use market_store::{MarketHandle, MarketStore};
pub use types::{NormalizedEvent, TickerSnapshot, TradeEvent};
