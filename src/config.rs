//! Configuration: TOML-loaded, validated at startup, in the same
//! read-file → `toml::from_str` → `validate()` pipeline used elsewhere in
//! this codebase's `AppConfig`.

use crate::error::{AppError, AppResult};
use serde::Deserialize;
use std::fs;
use std::time::Duration;

/// Tunable constants — not user-configurable.
pub const THROTTLE_BACKOFF: Duration = Duration::from_millis(3000);
pub const EXCEPTION_RETRY_DELAY: Duration = Duration::from_millis(10_000);

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    pub id: String,
    pub env: String,
    pub config_version: u32,

    pub supplier: SupplierConfig,
    pub logging: LoggingConfig,
    pub metrics: MetricsConfig,
}

/// The supplier's tunable configuration table.
#[derive(Debug, Clone, Deserialize)]
pub struct SupplierConfig {
    /// Max records requested per tick.
    pub records_per_fetch: u32,
    /// Delay between successful ticks.
    pub fetch_delay_ms: u64,
    /// Scheduler pool size.
    pub fetch_threads: usize,
    /// If true, decode each raw record through the pluggable decoder;
    /// construction fails if the decoder is unavailable.
    pub decoder_enabled: bool,
    /// Bounded buffer capacity (>0).
    pub buffer_size: usize,
    /// Max wait when enqueueing one record.
    pub offer_timeout_ms: u64,
    /// Rearm delay after an offer timeout.
    pub buffer_full_wait_ms: u64,
    /// Max wall time for earliest/latest discovery.
    pub probe_timeout_ms: u64,
    /// Cap on one `poll` result.
    pub max_records_per_poll: usize,
}

impl SupplierConfig {
    pub fn fetch_delay(&self) -> Duration {
        Duration::from_millis(self.fetch_delay_ms)
    }
    pub fn offer_timeout(&self) -> Duration {
        Duration::from_millis(self.offer_timeout_ms)
    }
    pub fn buffer_full_wait(&self) -> Duration {
        Duration::from_millis(self.buffer_full_wait_ms)
    }
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    pub enabled: bool,
    #[serde(default = "default_metrics_bind")]
    pub bind_addr: String,
    #[serde(default = "default_metrics_port")]
    pub port: u16,
    #[serde(default = "default_metrics_path")]
    pub path: String,
}

fn default_metrics_bind() -> String {
    "0.0.0.0".to_string()
}
fn default_metrics_port() -> u16 {
    9898
}
fn default_metrics_path() -> String {
    "/metrics".to_string()
}

fn validate_config(cfg: &AppConfig) -> AppResult<()> {
    if cfg.id.is_empty() {
        return Err(AppError::MissingConfig("id"));
    }
    if cfg.config_version == 0 {
        return Err(AppError::InvalidConfig(
            "config_version must be >= 1".into(),
        ));
    }

    let s = &cfg.supplier;
    if s.records_per_fetch == 0 {
        return Err(AppError::InvalidConfig(
            "supplier.records_per_fetch must be > 0".into(),
        ));
    }
    if s.fetch_threads == 0 {
        return Err(AppError::InvalidConfig(
            "supplier.fetch_threads must be > 0".into(),
        ));
    }
    if s.buffer_size == 0 {
        return Err(AppError::InvalidConfig(
            "supplier.buffer_size must be > 0".into(),
        ));
    }
    if s.max_records_per_poll == 0 {
        return Err(AppError::InvalidConfig(
            "supplier.max_records_per_poll must be > 0".into(),
        ));
    }

    Ok(())
}

const APP_CONFIG_PATH: &str = "src/config/app.toml";
const APP_CONFIG_ENV_VAR: &str = "SHARDSTREAM_CONFIG";

impl AppConfig {
    pub fn load() -> AppResult<Self> {
        let path =
            std::env::var(APP_CONFIG_ENV_VAR).unwrap_or_else(|_| APP_CONFIG_PATH.to_string());
        let contents = fs::read_to_string(&path)?; // AppError::ConfigIo
        let config: AppConfig = toml::from_str(&contents)?; // AppError::ConfigToml
        validate_config(&config)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> AppConfig {
        toml::from_str(
            r#"
            id = "demo"
            env = "test"
            config_version = 1

            [supplier]
            records_per_fetch = 100
            fetch_delay_ms = 200
            fetch_threads = 2
            decoder_enabled = false
            buffer_size = 64
            offer_timeout_ms = 1000
            buffer_full_wait_ms = 250
            probe_timeout_ms = 2000
            max_records_per_poll = 500

            [logging]
            level = "info"

            [metrics]
            enabled = false
            "#,
        )
        .unwrap()
    }

    #[test]
    fn validates_sane_config() {
        let cfg = sample();
        assert!(validate_config(&cfg).is_ok());
    }

    #[test]
    fn rejects_zero_buffer_size() {
        let mut cfg = sample();
        cfg.supplier.buffer_size = 0;
        assert!(validate_config(&cfg).is_err());
    }

    #[test]
    fn metrics_defaults_apply_when_omitted() {
        let cfg = sample();
        assert_eq!(cfg.metrics.bind_addr, "0.0.0.0");
        assert_eq!(cfg.metrics.port, 9898);
        assert_eq!(cfg.metrics.path, "/metrics");
    }
}
