//! Service configuration.

use std::time::Duration;

/// Configuration for the request service and the escalation monitor.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Interval between escalation sweeps of one tenant (default: 60).
    pub sweep_interval_secs: u64,
    /// Interval between refreshes of the tenant list (default: 300).
    pub tenant_refresh_secs: u64,
    /// Maximum candidates handled per sweep and per query (default: 100).
    pub sweep_batch_size: u64,
    /// Upper bound on a single command, in milliseconds (default: 2000).
    pub command_timeout_ms: u64,
    /// Destinations a taxi request may name.
    pub taxi_destinations: Vec<String>,
    /// Maximum length of a maintenance request title (default: 255).
    pub max_title_len: usize,
}

impl ServiceConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }

    pub fn tenant_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.tenant_refresh_secs.max(1))
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: 60,
            tenant_refresh_secs: 300,
            sweep_batch_size: 100,
            command_timeout_ms: 2_000,
            taxi_destinations: vec!["Airport".into(), "City Center".into(), "Hotel".into()],
            max_title_len: 255,
        }
    }
}
