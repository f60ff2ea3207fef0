//! Runtime settings: embedded defaults, then an optional TOML file, then
//! `TICKERWATCH__SECTION__KEY` environment variables.

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use thiserror::Error;

use crate::market_data::adapters::binance::TransportSettings;
use crate::market_data::instruments::{InstrumentDescriptor, InstrumentSet};
use crate::market_data::trade_window::WindowLimits;

const DEFAULTS: &str = r#"
[feed]
base_url = "wss://stream.binance.com:9443"
reconnect_retries = 3
reconnect_delay_ms = 1000
channel_capacity = 4096

[window]
duration_ms = 60000
max_trades = 500
prune_interval_ms = 1000

[log]
filter = "info"

[metrics]
listen = "0.0.0.0:9000"

[[instruments]]
id = "btcusdt"
display_name = "BTC/USDT"
base_asset = "BTC"
quote_asset = "USDT"

[[instruments]]
id = "ethusdt"
display_name = "ETH/USDT"
base_asset = "ETH"
quote_asset = "USDT"

[[instruments]]
id = "bnbusdt"
display_name = "BNB/USDT"
base_asset = "BNB"
quote_asset = "USDT"

[[instruments]]
id = "solusdt"
display_name = "SOL/USDT"
base_asset = "SOL"
quote_asset = "USDT"

[[instruments]]
id = "xrpusdt"
display_name = "XRP/USDT"
base_asset = "XRP"
quote_asset = "USDT"

[[instruments]]
id = "adausdt"
display_name = "ADA/USDT"
base_asset = "ADA"
quote_asset = "USDT"

[[instruments]]
id = "dogeusdt"
display_name = "DOGE/USDT"
base_asset = "DOGE"
quote_asset = "USDT"

[[instruments]]
id = "avaxusdt"
display_name = "AVAX/USDT"
base_asset = "AVAX"
quote_asset = "USDT"
"#;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error(transparent)]
    Load(#[from] config::ConfigError),

    #[error("invalid settings: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub feed: FeedSettings,
    pub window: WindowSettings,
    pub log: LogSettings,
    pub metrics: MetricsSettings,
    pub instruments: Vec<InstrumentDescriptor>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedSettings {
    pub base_url: String,
    pub reconnect_retries: u32,
    pub reconnect_delay_ms: u64,
    pub channel_capacity: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WindowSettings {
    pub duration_ms: u64,
    pub max_trades: usize,
    pub prune_interval_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogSettings {
    pub filter: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsSettings {
    pub listen: SocketAddr,
}

impl Settings {
    pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
        // dotenvy loads .env, but doesn't override already-set env vars
        dotenvy::dotenv().ok();

        let mut builder = Config::builder().add_source(File::from_str(DEFAULTS, FileFormat::Toml));
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml));
        }
        let settings: Settings = builder
            .add_source(
                Environment::with_prefix("TICKERWATCH")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    pub fn from_toml(toml: &str) -> Result<Self, SettingsError> {
        let settings: Settings = Config::builder()
            .add_source(File::from_str(DEFAULTS, FileFormat::Toml))
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), SettingsError> {
        if self.window.max_trades == 0 {
            return Err(SettingsError::Invalid("window.max_trades must be at least 1".into()));
        }
        if self.window.duration_ms == 0 {
            return Err(SettingsError::Invalid("window.duration_ms must be at least 1".into()));
        }
        if self.window.prune_interval_ms == 0 {
            return Err(SettingsError::Invalid("window.prune_interval_ms must be at least 1".into()));
        }
        if self.feed.channel_capacity == 0 {
            return Err(SettingsError::Invalid("feed.channel_capacity must be at least 1".into()));
        }
        self.instrument_set().map(|_| ())
    }

    pub fn instrument_set(&self) -> Result<InstrumentSet, SettingsError> {
        InstrumentSet::new(self.instruments.clone()).ok_or_else(|| {
            SettingsError::Invalid("instruments must be non-empty with unique ids".into())
        })
    }

    pub fn transport(&self) -> TransportSettings {
        TransportSettings {
            base_url: self.feed.base_url.clone(),
            reconnect_retries: self.feed.reconnect_retries,
            reconnect_delay: Duration::from_millis(self.feed.reconnect_delay_ms),
        }
    }

    pub fn window_limits(&self) -> WindowLimits {
        WindowLimits { duration_ms: self.window.duration_ms, max_trades: self.window.max_trades }
    }

    pub fn prune_interval(&self) -> Duration {
        Duration::from_millis(self.window.prune_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let s = Settings::from_toml("").unwrap();
        assert_eq!(s.feed.reconnect_retries, 3);
        assert_eq!(s.transport().reconnect_delay, Duration::from_secs(1));
        assert_eq!(s.window_limits(), WindowLimits::default());
        let set = s.instrument_set().unwrap();
        assert_eq!(set, InstrumentSet::default());
    }

    #[test]
    fn test_override_instruments_and_window() {
        let s = Settings::from_toml(
            r#"
            [window]
            max_trades = 50

            [[instruments]]
            id = "ETHUSDT"
            display_name = "ETH/USDT"
            base_asset = "ETH"
            quote_asset = "USDT"
            "#,
        )
        .unwrap();
        assert_eq!(s.window.max_trades, 50);
        assert_eq!(s.window.duration_ms, 60_000);
        let set = s.instrument_set().unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.first().id.as_str(), "ethusdt");
    }

    #[test]
    fn test_rejects_zero_capacity() {
        let err = Settings::from_toml("[window]\nmax_trades = 0\n").unwrap_err();
        assert!(matches!(err, SettingsError::Invalid(_)));
    }
}
