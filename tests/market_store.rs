use tickerwatch::market_data::instruments::{InstrumentDescriptor, InstrumentId, InstrumentSet};
use tickerwatch::market_data::market_store::MarketStore;
use tickerwatch::market_data::normaliser::normalize;
use tickerwatch::market_data::trade_window::WindowLimits;
use tickerwatch::market_data::types::{now_ms, NormalizedEvent};

fn btc_eth() -> MarketStore {
    let set = InstrumentSet::new(vec![
        InstrumentDescriptor::new("btcusdt", "BTC", "USDT"),
        InstrumentDescriptor::new("ethusdt", "ETH", "USDT"),
    ])
    .unwrap();
    MarketStore::new(set, WindowLimits::default())
}

fn ticker_frame(symbol: &str, last: &str, volume: &str) -> String {
    format!(
        r#"{{"stream":"{}@ticker","data":{{"e":"24hrTicker","E":{},"s":"{}","p":"12.5","P":"0.61","c":"{}","h":"2100.0","l":"1990.0","v":"{}"}}}}"#,
        symbol.to_lowercase(),
        now_ms(),
        symbol,
        last,
        volume
    )
}

fn trade_frame(symbol: &str, id: u64) -> String {
    format!(
        r#"{{"stream":"{}@trade","data":{{"e":"trade","E":1,"s":"{}","t":{},"p":"43000.10","q":"0.002","T":{},"m":false}}}}"#,
        symbol.to_lowercase(),
        symbol,
        id,
        now_ms()
    )
}

#[test]
fn focus_follows_selection_and_trades_stay_put() {
    let mut store = btc_eth();
    assert_eq!(store.focused(), &InstrumentId::new("btcusdt"));

    let eth = normalize(&ticker_frame("ETHUSDT", "2050.25", "150000")).unwrap();
    let NormalizedEvent::Ticker(expected) = eth.clone() else { panic!("expected ticker") };
    assert!(store.apply_event(eth));
    assert!(store.select_instrument("ethusdt"));
    assert_eq!(store.focused_snapshot(), Some(expected));

    for id in 1..=3 {
        assert!(store.apply_event(normalize(&trade_frame("BTCUSDT", id)).unwrap()));
    }
    assert_eq!(store.trades(&InstrumentId::new("btcusdt")).len(), 3);
    assert!(store.focused_trades().is_empty());
}

#[test]
fn second_ticker_wins() {
    let mut store = btc_eth();
    store.apply_event(normalize(&ticker_frame("BTCUSDT", "43000.00", "10")).unwrap());
    store.apply_event(normalize(&ticker_frame("BTCUSDT", "43111.00", "11")).unwrap());
    let tickers = store.tickers();
    assert_eq!(tickers.len(), 1);
    let btc = store.focused_snapshot().unwrap();
    assert_eq!(btc.last_price, 43111.0);
    assert_eq!(btc.volume_24h, 11.0);
}

#[test]
fn bad_frames_leave_state_untouched() {
    let mut store = btc_eth();
    for raw in ["not json", r#"{"stream":"x"}"#, r#"{"stream":"btcusdt@kline_1m","data":{}}"#] {
        assert!(normalize(raw).is_none());
    }
    assert_eq!(store.version(), 0);
    // stream keeps flowing after the bad ones
    store.apply_event(normalize(&trade_frame("ETHUSDT", 9)).unwrap());
    assert_eq!(store.trades(&InstrumentId::new("ethusdt")).len(), 1);
}

#[test]
fn listings_skip_missing_and_sort_by_volume() {
    let mut store = btc_eth();
    assert!(store.tickers_in_config_order().is_empty());
    store.apply_event(normalize(&ticker_frame("ETHUSDT", "2000", "500")).unwrap());
    let listed = store.tickers_in_config_order();
    assert_eq!(listed.len(), 1);
    store.apply_event(normalize(&ticker_frame("BTCUSDT", "43000", "20")).unwrap());
    let ids: Vec<String> = store.tickers_by_volume().iter().map(|t| t.instrument.to_string()).collect();
    assert_eq!(ids, vec!["ethusdt", "btcusdt"]);
}
