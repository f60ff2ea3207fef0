pub mod settings;
pub mod market_data;
pub mod telemetry;
