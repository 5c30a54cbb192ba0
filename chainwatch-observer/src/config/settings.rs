//! Settings structs and loading logic.
//!
//! All settings have sensible defaults and can be overridden via
//! environment variables or configuration files. Endpoints are the one
//! exception: at least one must be configured explicitly.

use std::path::Path;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use provider_pool::EndpointConfig;
use serde::Deserialize;

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// RPC endpoints, priority-ordered. At least one required.
    #[serde(default)]
    pub endpoints: Vec<EndpointConfig>,
    /// Monitoring thresholds and retention bounds.
    pub monitoring: MonitoringSettings,
    /// Historical backfill tuning.
    pub backfill: BackfillSettings,
    /// Logging configuration.
    pub logging: LoggingSettings,
}

impl Settings {
    /// Load settings from configuration files and environment variables.
    ///
    /// Files are loaded in this order (later overrides earlier):
    /// 1. `config/default.toml`
    /// 2. `config/{environment}.toml` (if exists)
    /// 3. Environment variables with `OBSERVER_` prefix
    ///
    /// # Arguments
    /// * `environment` - Environment name (e.g., "development", "production")
    ///
    /// # Errors
    /// Returns `ConfigError` if configuration is invalid or cannot be loaded.
    pub fn load(environment: &str) -> Result<Self, ConfigError> {
        let config_dir = std::env::var("CONFIG_DIR").unwrap_or_else(|_| "config".into());

        let builder = Config::builder()
            // Start with default values
            .set_default("monitoring.confirmation_threshold", 12)?
            .set_default("monitoring.reorg_depth", 20)?
            .set_default("monitoring.block_window", 100)?
            .set_default("monitoring.health_probe_interval_ms", 60_000)?
            .set_default("monitoring.max_pending_age_ms", 3_600_000)?
            .set_default("monitoring.max_pending_transactions", 100_000)?
            .set_default("monitoring.retention_ms", 86_400_000)?
            .set_default("monitoring.cleanup_interval_ms", 300_000)?
            .set_default("backfill.batch_size", 100)?
            .set_default("backfill.batch_delay_ms", 1_000)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "json")?
            // Load default configuration file
            .add_source(File::with_name(&format!("{config_dir}/default")).required(false))
            // Load environment-specific file
            .add_source(File::with_name(&format!("{config_dir}/{environment}")).required(false))
            // Override with environment variables (OBSERVER_ prefix)
            .add_source(
                Environment::with_prefix("OBSERVER")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Load settings from a specific file path.
    ///
    /// # Errors
    /// Returns `ConfigError` if the file cannot be read or parsed.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()?
            .try_deserialize()
    }

    /// Validate settings and return any validation errors.
    ///
    /// # Errors
    /// Returns a list of validation error messages.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        // Endpoint validation
        if self.endpoints.is_empty() {
            errors.push("at least one endpoint is required".into());
        }
        for endpoint in &self.endpoints {
            if let Err(e) = endpoint.validate() {
                errors.push(e.to_string());
            }
        }

        // Monitoring validation
        let m = &self.monitoring;
        if !(1..=100).contains(&m.confirmation_threshold) {
            errors.push("monitoring.confirmation_threshold must be in 1..=100".into());
        }
        if !(1..=100).contains(&m.reorg_depth) {
            errors.push("monitoring.reorg_depth must be in 1..=100".into());
        }
        if m.block_window < m.reorg_depth {
            errors.push("monitoring.block_window must be >= monitoring.reorg_depth".into());
        }
        if m.max_pending_transactions == 0 {
            errors.push("monitoring.max_pending_transactions must be non-zero".into());
        }

        // Backfill validation
        if self.backfill.batch_size == 0 {
            errors.push("backfill.batch_size must be non-zero".into());
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// Monitoring thresholds and in-memory retention bounds.
#[derive(Debug, Clone, Deserialize)]
pub struct MonitoringSettings {
    /// Confirmations before a transaction or event is final (1-100).
    pub confirmation_threshold: u64,
    /// Depth below head within which reorgs are re-checked (1-100).
    pub reorg_depth: u64,
    /// Size of the block-hash window; must be >= `reorg_depth`.
    pub block_window: u64,
    /// Interval between endpoint health probes in milliseconds.
    pub health_probe_interval_ms: u64,
    /// Age after which a pending transaction expires, in milliseconds.
    pub max_pending_age_ms: u64,
    /// Pending-table size bound; oldest entries are evicted on overflow.
    pub max_pending_transactions: usize,
    /// How long confirmed records stay in memory, in milliseconds.
    pub retention_ms: u64,
    /// Interval between retention sweeps, in milliseconds.
    pub cleanup_interval_ms: u64,
}

impl MonitoringSettings {
    /// Health probe interval as a `Duration`.
    #[must_use]
    pub const fn health_probe_interval(&self) -> Duration {
        Duration::from_millis(self.health_probe_interval_ms)
    }

    /// Maximum pending age as a `Duration`.
    #[must_use]
    pub const fn max_pending_age(&self) -> Duration {
        Duration::from_millis(self.max_pending_age_ms)
    }

    /// Retention window as a `Duration`.
    #[must_use]
    pub const fn retention(&self) -> Duration {
        Duration::from_millis(self.retention_ms)
    }

    /// Cleanup interval as a `Duration`.
    #[must_use]
    pub const fn cleanup_interval(&self) -> Duration {
        Duration::from_millis(self.cleanup_interval_ms)
    }
}

/// Historical backfill tuning.
#[derive(Debug, Clone, Deserialize)]
pub struct BackfillSettings {
    /// Blocks per window.
    pub batch_size: u64,
    /// Pause between windows in milliseconds.
    pub batch_delay_ms: u64,
}

impl BackfillSettings {
    /// Inter-batch delay as a `Duration`.
    #[must_use]
    pub const fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    /// Log level filter (e.g. "info", "chainwatch_observer=debug").
    pub level: String,
    /// Output format: "json" or "pretty".
    pub format: String,
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    fn settings_with_endpoint() -> Settings {
        Settings {
            endpoints: vec![EndpointConfig {
                name: "primary".into(),
                rpc_url: "http://localhost:8545".into(),
                stream_url: "ws://localhost:8546".into(),
                credential: None,
                priority: 0,
                rate_limit_rps: 25,
                timeout_ms: 10_000,
            }],
            monitoring: MonitoringSettings {
                confirmation_threshold: 12,
                reorg_depth: 20,
                block_window: 100,
                health_probe_interval_ms: 60_000,
                max_pending_age_ms: 3_600_000,
                max_pending_transactions: 100_000,
                retention_ms: 86_400_000,
                cleanup_interval_ms: 300_000,
            },
            backfill: BackfillSettings {
                batch_size: 100,
                batch_delay_ms: 1_000,
            },
            logging: LoggingSettings {
                level: "info".into(),
                format: "json".into(),
            },
        }
    }

    #[test]
    fn default_shape_is_valid() {
        assert!(settings_with_endpoint().validate().is_ok());
    }

    #[test]
    fn missing_endpoints_fail_validation() {
        let mut settings = settings_with_endpoint();
        settings.endpoints.clear();
        let errors = settings.validate().expect_err("should fail");
        assert!(errors.iter().any(|e| e.contains("endpoint")));
    }

    #[test]
    fn window_must_cover_reorg_depth() {
        let mut settings = settings_with_endpoint();
        settings.monitoring.block_window = 10;
        settings.monitoring.reorg_depth = 20;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn threshold_range_is_enforced() {
        let mut settings = settings_with_endpoint();
        settings.monitoring.confirmation_threshold = 0;
        assert!(settings.validate().is_err());

        settings.monitoring.confirmation_threshold = 101;
        assert!(settings.validate().is_err());

        settings.monitoring.confirmation_threshold = 100;
        assert!(settings.validate().is_ok());
    }
}
