//! Centralized server configuration.
//!
//! Strongly-typed configuration loaded via the `config` crate from
//! environment variables with `__` separators (e.g. `SWEEP__INTERVAL_SECONDS`).

use leadflow_engine::engine::EngineLimits;
use serde::Deserialize;

/// Server configuration.
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// PostgreSQL database connection URL.
    pub database_url: String,

    /// Address to listen on.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Base URL of the channel gateway that performs message/CRM/email/SMS
    /// delivery on the engine's behalf.
    pub gateway_url: String,

    /// NATS job queue; executions run in-process when absent.
    #[serde(default)]
    pub nats: Option<NatsConfig>,

    /// Engine termination ceilings.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Sweep loop configuration.
    #[serde(default)]
    pub sweep: SweepConfig,
}

/// NATS connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct NatsConfig {
    /// NATS server URL.
    pub url: String,
}

/// Engine limit configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Maximum steps per execution.
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,

    /// Maximum wall-clock lifetime of an execution, in hours.
    #[serde(default = "default_max_duration_hours")]
    pub max_duration_hours: i64,
}

impl EngineConfig {
    /// Converts to engine limits.
    #[must_use]
    pub fn limits(&self) -> EngineLimits {
        EngineLimits {
            max_steps: self.max_steps,
            max_duration: chrono::Duration::hours(self.max_duration_hours),
        }
    }
}

/// Sweep loop configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SweepConfig {
    /// Interval between sweeps, in seconds.
    #[serde(default = "default_sweep_interval_seconds")]
    pub interval_seconds: u64,

    /// How long a pending input may wait before expiring, in hours.
    #[serde(default = "default_pending_ttl_hours")]
    pub pending_ttl_hours: i64,
}

fn default_listen_addr() -> String {
    "0.0.0.0:3400".to_string()
}

fn default_max_steps() -> u32 {
    100
}

fn default_max_duration_hours() -> i64 {
    // 30 days; Wait nodes spanning days must fit under this ceiling.
    720
}

fn default_sweep_interval_seconds() -> u64 {
    30
}

fn default_pending_ttl_hours() -> i64 {
    24
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            max_duration_hours: default_max_duration_hours(),
        }
    }
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            interval_seconds: default_sweep_interval_seconds(),
            pending_ttl_hours: default_pending_ttl_hours(),
        }
    }
}

impl ServerConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required configuration is missing or invalid.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(
                config::Environment::default()
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}
