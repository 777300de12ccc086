//! Startup configuration, loaded once from a JSON file.
//!
//! Mirrors the shape described in the store/schema section: an
//! `ingestion` block per exchange plus a `metrics` block for the indicator
//! engine. A missing or malformed file is a fatal init error -- the process
//! is expected to exit immediately rather than run degraded.

use crate::error::ConfigError;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub ingestion: IngestionConfig,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IngestionConfig {
    pub log_level: LogLevel,
    pub influxdb: InfluxDbConfig,
    pub poloniex: ExchangeIngestConfig,
    pub bittrex: ExchangeIngestConfig,
    pub coinmarketcap: ExchangeIngestConfig,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
    Panic,
}

impl LogLevel {
    /// Maps onto a `tracing` filter directive. `fatal`/`panic` have no
    /// tracing equivalent finer than `error`, so they collapse to it.
    pub fn as_tracing_filter(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error | LogLevel::Fatal | LogLevel::Panic => "error",
        }
    }

    pub fn is_at_least_debug(&self) -> bool {
        matches!(self, LogLevel::Debug)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct InfluxDbConfig {
    pub host: String,
    pub auth: InfluxDbAuth,
    pub tls_certificate_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InfluxDbAuth {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeIngestConfig {
    pub schema: HashMap<String, String>,
    #[serde(default)]
    pub market_check_period_min: Option<u64>,
    #[serde(default)]
    pub order_books_check_period_sec: Option<u64>,
    #[serde(default)]
    pub public_ticks_check_period_sec: Option<u64>,
    #[serde(default)]
    pub market_history_check_period_sec: Option<u64>,
    #[serde(default)]
    pub missing_trades_check_period_sec: Option<u64>,
    pub flush_batchs_period_ms: u64,
    pub flush_capacity: usize,
}

impl ExchangeIngestConfig {
    pub fn flush_period(&self) -> Duration {
        Duration::from_millis(self.flush_batchs_period_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    pub schema: HashMap<String, String>,
    pub flush_batchs_period_ms: u64,
    pub flush_capacity: usize,
    #[serde(deserialize_with = "deserialize_duration_str")]
    pub frequency: Duration,
    #[serde(deserialize_with = "deserialize_duration_vec")]
    pub ohlc_periods: Vec<Duration>,
    pub length_max: usize,
    pub market_depths: MarketDepthsConfig,
    pub sources: HashMap<String, MetricsSourceConfig>,
}

impl MetricsConfig {
    pub fn flush_period(&self) -> Duration {
        Duration::from_millis(self.flush_batchs_period_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MarketDepthsConfig {
    pub intervals: Vec<f64>,
    #[serde(deserialize_with = "deserialize_duration_str")]
    pub frequency: Duration,
    pub poloniex_hard_fetch_frequency: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsSourceConfig {
    pub schema: HashMap<String, String>,
    #[serde(deserialize_with = "deserialize_duration_str")]
    pub update_lag: Duration,
}

fn deserialize_duration_str<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    parse_duration_str(&s).map_err(serde::de::Error::custom)
}

fn deserialize_duration_vec<'de, D>(deserializer: D) -> Result<Vec<Duration>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let strs = Vec::<String>::deserialize(deserializer)?;
    strs.iter()
        .map(|s| parse_duration_str(s))
        .collect::<Result<Vec<_>, _>>()
        .map_err(serde::de::Error::custom)
}

/// Parses `<n><unit>` duration strings (`"500ms"`, `"5s"`, `"1m"`, `"4h"`).
/// Grounded in the same `<n><unit>` convention the configuration section
/// specifies; implemented directly since the unit set here (s, m, h, ms) is
/// a small fixed list.
pub fn parse_duration_str(s: &str) -> Result<Duration, String> {
    humantime::parse_duration(s).map_err(|e| format!("invalid duration `{s}`: {e}"))
}

impl Config {
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        let content = std::fs::read_to_string(path_ref).map_err(|source| ConfigError::Read {
            path: path_ref.display().to_string(),
            source,
        })?;
        Self::load_from_str(&content)
    }

    pub fn load_from_str(content: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.metrics.length_max < 2 {
            return Err(ConfigError::Invalid(
                "metrics.length_max must be >= 2".to_string(),
            ));
        }
        if self.metrics.ohlc_periods.is_empty() {
            return Err(ConfigError::Invalid(
                "metrics.ohlc_periods must not be empty".to_string(),
            ));
        }
        let mut last = Duration::ZERO;
        for (i, p) in self.metrics.ohlc_periods.iter().enumerate() {
            if i > 0 && *p <= last {
                return Err(ConfigError::Invalid(
                    "metrics.ohlc_periods must be strictly ascending".to_string(),
                ));
            }
            last = *p;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_json() -> &'static str {
        r#"{
            "ingestion": {
                "log_level": "info",
                "influxdb": {
                    "host": "http://localhost:8086",
                    "auth": {"username": "u", "password": "p"},
                    "tls_certificate_path": null
                },
                "poloniex": {
                    "schema": {"database": "poloniex"},
                    "market_check_period_min": 10,
                    "order_books_check_period_sec": 30,
                    "flush_batchs_period_ms": 1000,
                    "flush_capacity": 2000
                },
                "bittrex": {
                    "schema": {"database": "bittrex"},
                    "market_history_check_period_sec": 30,
                    "order_books_check_period_sec": 30,
                    "flush_batchs_period_ms": 1000,
                    "flush_capacity": 2000
                },
                "coinmarketcap": {
                    "schema": {"database": "coinmarketcap"},
                    "public_ticks_check_period_sec": 60,
                    "flush_batchs_period_ms": 1000,
                    "flush_capacity": 500
                }
            },
            "metrics": {
                "schema": {"database": "metrics"},
                "flush_batchs_period_ms": 1000,
                "flush_capacity": 2000,
                "frequency": "1m",
                "ohlc_periods": ["1m", "5m", "15m"],
                "length_max": 14,
                "market_depths": {
                    "intervals": [1.0, 2.0, 5.0],
                    "frequency": "30s",
                    "poloniex_hard_fetch_frequency": 10
                },
                "sources": {
                    "poloniex": {"schema": {"database": "poloniex"}, "update_lag": "5s"},
                    "bittrex": {"schema": {"database": "bittrex"}, "update_lag": "5s"}
                }
            }
        }"#
    }

    #[test]
    fn parses_sample_config() {
        let cfg = Config::load_from_str(sample_json()).unwrap();
        assert_eq!(cfg.metrics.ohlc_periods.len(), 3);
        assert_eq!(cfg.metrics.length_max, 14);
        assert_eq!(cfg.ingestion.log_level, LogLevel::Info);
    }

    #[test]
    fn rejects_length_max_below_two() {
        let bad = sample_json().replace("\"length_max\": 14", "\"length_max\": 1");
        assert!(Config::load_from_str(&bad).is_err());
    }

    #[test]
    fn rejects_non_ascending_ohlc_periods() {
        let bad = sample_json().replace(
            "\"ohlc_periods\": [\"1m\", \"5m\", \"15m\"]",
            "\"ohlc_periods\": [\"5m\", \"1m\", \"15m\"]",
        );
        assert!(Config::load_from_str(&bad).is_err());
    }

    #[test]
    fn duration_string_parsing() {
        assert_eq!(parse_duration_str("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration_str("5s").unwrap(), Duration::from_secs(5));
        assert_eq!(parse_duration_str("1m").unwrap(), Duration::from_secs(60));
        assert_eq!(parse_duration_str("4h").unwrap(), Duration::from_secs(4 * 3600));
    }
}
