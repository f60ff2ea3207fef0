use criterion::{black_box, criterion_group, criterion_main, Criterion};

use tickerwatch::market_data::instruments::InstrumentSet;
use tickerwatch::market_data::market_store::MarketStore;
use tickerwatch::market_data::normaliser::normalize;
use tickerwatch::market_data::trade_window::WindowLimits;

const TICKER: &str = r#"{"stream":"btcusdt@ticker","data":{"e":"24hrTicker","E":1700000000123,"s":"BTCUSDT","p":"-120.50","P":"-0.321","w":"37000.1","c":"37450.25","Q":"0.01","o":"37570.75","h":"38000.00","l":"36900.10","v":"12345.678","q":"456789012.3","O":1699913600123,"C":1700000000123,"F":1,"L":2,"n":2}}"#;
const TRADE: &str = r#"{"stream":"btcusdt@trade","data":{"e":"trade","E":1700000000200,"s":"BTCUSDT","t":987654321,"p":"37450.25","q":"0.004","T":1700000000199,"m":true}}"#;

fn bench_normalize(c: &mut Criterion) {
    c.bench_function("normalize_ticker", |b| b.iter(|| normalize(black_box(TICKER))));
    c.bench_function("normalize_trade", |b| b.iter(|| normalize(black_box(TRADE))));
}

fn bench_apply_trades(c: &mut Criterion) {
    c.bench_function("apply_trade_full_window", |b| {
        let mut store = MarketStore::new(InstrumentSet::default(), WindowLimits::default());
        let event = normalize(TRADE).unwrap();
        b.iter(|| store.apply_event_at(black_box(event.clone()), 1_700_000_000_200));
    });
}

criterion_group!(benches, bench_normalize, bench_apply_trades);
criterion_main!(benches);
