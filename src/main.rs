use std::path::PathBuf;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};

use tickerwatch::market_data::adapters::binance::BinanceAdapter;
use tickerwatch::market_data::adapters::FrameSource;
use tickerwatch::market_data::market_store::{MarketHandle, MarketStore, MarketView};
use tickerwatch::market_data::router;
use tickerwatch::market_data::types::TickerSnapshot;
use tickerwatch::settings::Settings;
use tickerwatch::telemetry;

#[derive(Debug, Parser)]
#[command(name = "tickerwatch", about = "Live Binance tickers and rolling trade windows")]
struct Cli {
    /// TOML settings file layered over the built-in defaults
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log filter, e.g. "info" or "tickerwatch=debug"
    #[arg(long)]
    log: Option<String>,

    /// Start without opening the websocket
    #[arg(long)]
    no_connect: bool,
}

fn print_ticker(t: &TickerSnapshot) {
    println!(
        "{:<10} last {:>14.4}  chg {:>+12.4} ({:>+7.2}%)  hi {:>14.4}  lo {:>14.4}  vol {:>16.2}",
        t.instrument, t.last_price, t.price_change, t.price_change_percent, t.high_24h, t.low_24h, t.volume_24h
    );
}

fn print_focus(view: &MarketView) {
    println!("\n=== {} (v{}) ===", view.focused, view.version);
    match view.focused_snapshot() {
        Some(t) => print_ticker(t),
        None => println!("No ticker yet"),
    }
    let trades = view.focused_trades();
    match view.latest_focused_trade() {
        Some(last) => println!(
            "Trades in window: {}, last {} @ {} ({})",
            trades.len(),
            last.quantity,
            last.price,
            if last.is_sell_pressure { "sell" } else { "buy" }
        ),
        None => println!("Trades in window: 0"),
    }
}

fn print_trades(view: &MarketView, n: usize) {
    let trades = view.focused_trades();
    if trades.is_empty() {
        println!("No trades in window");
        return;
    }
    for t in trades.iter().rev().take(n) {
        println!(
            "  #{:<12} {:>14.4} x {:<12} {} {}",
            t.trade_id,
            t.price,
            t.quantity,
            if t.is_sell_pressure { "SELL" } else { "BUY " },
            t.trade_time_ms
        );
    }
}

fn print_listing(title: &str, tickers: &[TickerSnapshot]) {
    println!("\n=== {} ===", title);
    if tickers.is_empty() {
        println!("No tickers yet");
    }
    for t in tickers {
        print_ticker(t);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref())?;

    telemetry::init_tracing(cli.log.as_deref().unwrap_or(&settings.log.filter));
    telemetry::init_metrics(settings.metrics.listen)?;

    let instruments = settings.instrument_set()?;
    info!(instruments = instruments.len(), "tickerwatch starting");

    let store = MarketHandle::new(MarketStore::new(instruments.clone(), settings.window_limits()));
    let (frames_tx, frames_rx) = mpsc::channel(settings.feed.channel_capacity);
    let adapter = BinanceAdapter::new(settings.transport(), &instruments, frames_tx);

    let router_task = tokio::spawn(router::run_router(
        frames_rx,
        adapter.watch_status(),
        store.clone(),
        settings.prune_interval(),
    ));

    if !cli.no_connect {
        adapter.connect().await;
    }

    println!("Type 'help' for available commands.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                info!("received Ctrl-C, shutting down");
                break;
            }
        };
        let Some(line) = line else { break };

        let mut parts = line.split_whitespace();
        let command = parts.next().unwrap_or("").to_lowercase();
        match command.as_str() {
            "help" | "h" => {
                println!("Available commands:");
                println!("  connect            - Open the market data stream");
                println!("  disconnect         - Close the market data stream");
                println!("  status             - Show connection status");
                println!("  select <symbol>    - Focus an instrument (e.g. select ethusdt)");
                println!("  top                - Show focused ticker and trade summary");
                println!("  trades [n]         - Show the latest n focused trades (default 10)");
                println!("  list               - Tickers in configured order");
                println!("  volume             - Tickers sorted by 24h volume");
                println!("  reset              - Clear all tickers and trades");
                println!("  quit, q            - Exit");
            }
            "connect" => adapter.connect().await,
            "disconnect" => adapter.disconnect().await,
            "status" => {
                let view = store.view();
                println!("Transport: {}, store connected: {}", adapter.status(), view.connected);
            }
            "select" => match parts.next() {
                Some(symbol) => {
                    if store.select_instrument(symbol) {
                        print_focus(&store.view());
                    } else {
                        let known: Vec<String> = instruments.ids().map(|id| id.to_string()).collect();
                        println!("Unknown instrument '{}'. Known: {}", symbol, known.join(", "));
                    }
                }
                None => println!("Usage: select <symbol>"),
            },
            "top" => print_focus(&store.view()),
            "trades" => {
                let n = match parts.next().map(str::parse::<usize>) {
                    None => 10,
                    Some(Ok(n)) => n,
                    Some(Err(_)) => {
                        println!("Invalid count");
                        continue;
                    }
                };
                print_trades(&store.view(), n);
            }
            "list" => print_listing("Tickers", &store.view().tickers_in_config_order()),
            "volume" => print_listing("Tickers by volume", &store.view().tickers_by_volume()),
            "reset" => {
                store.reset();
                println!("Cleared market state");
            }
            "quit" | "q" | "exit" => {
                println!("Goodbye!");
                break;
            }
            "" => continue,
            _ => println!("Unknown command. Type 'help' for available commands."),
        }
    }

    adapter.disconnect().await;
    drop(adapter);
    if let Err(e) = router_task.await {
        warn!(error = %e, "router task panicked");
    }
    Ok(())
}
