//! Engine configuration.

use std::time::Duration;

/// Tunables for dispatch and health monitoring.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Per-delivery HTTP request timeout.
    pub request_timeout: Duration,
    /// Consecutive failures before a webhook is auto-disabled.
    pub failure_threshold: u32,
    /// How many recent attempts the health monitor inspects.
    pub history_window: u32,
    /// Default page size for delivery-log queries.
    pub default_recent_limit: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            failure_threshold: 10,
            history_window: 10,
            default_recent_limit: 10,
        }
    }
}
