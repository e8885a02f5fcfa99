//! Configuration loading from TOML files.

use serde::Deserialize;
use std::path::Path;

use crate::detector::DetectorConfig;
use crate::engine::EngineConfig;
use crate::error::{ConfigError, Error, Result};
use crate::feed::ReconnectConfig;
use crate::risk::RiskConfig;
use crate::sizing::SizingConfig;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub detector: DetectorConfig,
    #[serde(default)]
    pub sizing: SizingConfig,
    #[serde(default)]
    pub risk: RiskConfig,
    #[serde(default)]
    pub connection: ReconnectConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Venue feed endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct SourcesConfig {
    #[serde(default = "default_polymarket_ws")]
    pub polymarket_ws: String,
    #[serde(default = "default_limitless_ws")]
    pub limitless_ws: String,
}

fn default_polymarket_ws() -> String {
    "wss://ws-subscriptions-clob.polymarket.com/ws/market".into()
}

fn default_limitless_ws() -> String {
    "wss://api.limitless.exchange/ws".into()
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            polymarket_ws: default_polymarket_ws(),
            limitless_ws: default_limitless_ws(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// "pretty" or "json".
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "pretty".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load and validate a configuration file.
    ///
    /// # Errors
    ///
    /// Fails fast on unreadable files, malformed TOML, or out-of-range
    /// values; startup should abort rather than run silently degraded.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        let config: Config = toml::from_str(&content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate cross-field constraints.
    pub fn validate(&self) -> Result<()> {
        if self.sources.polymarket_ws.is_empty() {
            return Err(invalid("sources.polymarket_ws", "cannot be empty"));
        }
        if self.sources.limitless_ws.is_empty() {
            return Err(invalid("sources.limitless_ws", "cannot be empty"));
        }
        if self.engine.scan_interval_ms == 0 {
            return Err(invalid("engine.scan_interval_ms", "must be positive"));
        }
        if self.engine.stale_data_threshold_ms <= 0 {
            return Err(invalid("engine.stale_data_threshold_ms", "must be positive"));
        }
        if self.connection.max_attempts == 0 {
            return Err(invalid("connection.max_attempts", "must be positive"));
        }
        if self.connection.base_delay_ms == 0 {
            return Err(invalid("connection.base_delay_ms", "must be positive"));
        }
        if self.sizing.max_depth == 0 {
            return Err(invalid("sizing.max_depth", "must be positive"));
        }
        if self.sizing.liquidity_factor <= rust_decimal::Decimal::ZERO
            || self.sizing.liquidity_factor > rust_decimal::Decimal::ONE
        {
            return Err(invalid("sizing.liquidity_factor", "must be in (0, 1]"));
        }
        self.risk
            .validate()
            .map_err(|e| invalid("risk", &e.to_string()))?;
        Ok(())
    }

    /// Initialize tracing from the logging section.
    ///
    /// `RUST_LOG` overrides the configured level when set.
    pub fn init_logging(&self) {
        use tracing_subscriber::EnvFilter;

        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.logging.level.clone()));

        if self.logging.format == "json" {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .json()
                .init();
        } else {
            tracing_subscriber::fmt().with_env_filter(filter).init();
        }
    }
}

fn invalid(field: &'static str, reason: &str) -> Error {
    Error::Config(ConfigError::InvalidValue {
        field,
        reason: reason.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.engine.scan_interval_ms, 1_000);
        assert_eq!(config.detector.fees_cents, dec!(3));
        assert_eq!(config.sizing.max_depth, 5);
        assert_eq!(config.risk.max_consecutive_errors, 5);
        assert_eq!(config.connection.max_attempts, 10);
    }

    #[test]
    fn empty_toml_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.engine.stale_data_threshold_ms, 5_000);
    }

    #[test]
    fn partial_section_fills_remaining_defaults() {
        let config: Config = toml::from_str(
            r#"
            [engine]
            scan_interval_ms = 250

            [risk]
            max_daily_loss_usd = 250
            "#,
        )
        .unwrap();

        assert_eq!(config.engine.scan_interval_ms, 250);
        assert_eq!(config.engine.stale_data_threshold_ms, 5_000);
        assert_eq!(config.risk.max_daily_loss_usd, dec!(250));
        assert_eq!(config.risk.max_loss_per_trade_usd, dec!(5));
    }

    #[test]
    fn load_reads_and_validates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[logging]\nlevel = \"debug\"\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.logging.level, "debug");

        assert!(Config::load(dir.path().join("missing.toml")).is_err());
    }

    #[test]
    fn invalid_values_are_rejected() {
        let config: Config = toml::from_str(
            r#"
            [engine]
            scan_interval_ms = 0
            "#,
        )
        .unwrap();
        assert!(config.validate().is_err());

        let config: Config = toml::from_str(
            r#"
            [sizing]
            liquidity_factor = 1.5
            "#,
        )
        .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn risk_validation_is_applied() {
        let config: Config = toml::from_str(
            r#"
            [risk]
            max_total_position_usd = 100
            max_position_per_market_usd = 500
            "#,
        )
        .unwrap();
        assert!(config.validate().is_err());
    }
}
