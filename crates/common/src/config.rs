//! Layered configuration (defaults + TOML file + environment overrides).

use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Top-level configuration for the orchestrator process.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub server: ServerConfig,
    pub aimd: AimdConfig,
    pub priority: PriorityConfig,
    pub distributor: DistributorConfig,
    pub cache: CacheConfig,
    pub startup_policy: StartupPolicyConfig,
    pub observability: ObservabilityConfig,
}

/// HTTP bind address and connection limits for the internal
/// Distributor/Scheduler/Controller surface.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_connections: u32,
    pub request_timeout_ms: u64,
}

/// Per-source AIMD scheduler constants.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct AimdConfig {
    pub alpha: f64,
    pub hysteresis: f64,
    pub step: u32,
    pub breach_needed: u32,
    pub cooldown_steps: u32,
    pub decrease_factor: f64,
    pub increase_rate: f64,
    pub init_pipe_seg: u32,
    pub history_window: usize,
}

impl Default for AimdConfig {
    fn default() -> Self {
        Self {
            alpha: 0.3,
            hysteresis: 0.07,
            step: 1,
            breach_needed: 2,
            cooldown_steps: 1,
            decrease_factor: 0.5,
            increase_rate: 1.0,
            init_pipe_seg: 0,
            history_window: 20,
        }
    }
}

/// Priority-estimation defaults applied when a task omits per-task
/// coefficients.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct PriorityConfig {
    pub importance_weight: f64,
    pub urgency_weight: f64,
    pub priority_levels: u32,
    pub deadline_seconds: f64,
    pub visibility_window_secs: f64,
}

impl Default for PriorityConfig {
    fn default() -> Self {
        Self {
            importance_weight: 1.0,
            urgency_weight: 1.0,
            priority_levels: 10,
            deadline_seconds: 1.0,
            visibility_window_secs: 2.0,
        }
    }
}

/// Durable store location and SQLite lock-wait tuning.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DistributorConfig {
    pub db_path: String,
    pub busy_timeout_ms: u64,
    pub connect_timeout_secs: f64,
}

impl Default for DistributorConfig {
    fn default() -> Self {
        Self {
            db_path: "distributor.db".to_string(),
            busy_timeout_ms: 5000,
            connect_timeout_secs: 5.0,
        }
    }
}

/// Config-bound instance cache capacity/eviction knobs.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct CacheConfig {
    pub capacity: usize,
    pub prune_interval_secs: u64,
    pub idle_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 64,
            prune_interval_secs: 30,
            idle_ttl_secs: 300,
        }
    }
}

/// Fallback placement used before any AIMD history exists for a source.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StartupPolicyConfig {
    /// Stage id -> device name, applied verbatim on the first task from
    /// a new source.
    pub placements: HashMap<String, String>,
}

impl Default for StartupPolicyConfig {
    fn default() -> Self {
        Self {
            placements: HashMap::new(),
        }
    }
}

/// Log format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
    Compact,
}

/// Logging/metrics/tracing configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    pub metrics_enabled: bool,
    pub metrics_port: u16,
    pub tracing_enabled: bool,
    pub otlp_endpoint: Option<String>,
    pub log_level: String,
    pub log_format: LogFormat,
}

impl Config {
    /// Load configuration from `config.toml` (if present) layered with
    /// `ORCHESTRATOR__`-prefixed environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let defaults = Config::default();
        let mut builder = ConfigBuilder::builder()
            .set_default("server.host", defaults.server.host.clone())?
            .set_default("server.port", defaults.server.port as i64)?
            .set_default(
                "server.request_timeout_ms",
                defaults.server.request_timeout_ms as i64,
            )?
            .set_default("aimd.alpha", defaults.aimd.alpha)?
            .set_default("aimd.hysteresis", defaults.aimd.hysteresis)?
            .set_default("aimd.breach_needed", defaults.aimd.breach_needed as i64)?
            .set_default("aimd.cooldown_steps", defaults.aimd.cooldown_steps as i64)?
            .set_default("aimd.decrease_factor", defaults.aimd.decrease_factor)?
            .set_default("aimd.increase_rate", defaults.aimd.increase_rate)?
            .set_default("aimd.history_window", defaults.aimd.history_window as i64)?
            .set_default("priority.priority_levels", defaults.priority.priority_levels as i64)?
            .set_default("distributor.db_path", defaults.distributor.db_path.clone())?
            .set_default("distributor.busy_timeout_ms", defaults.distributor.busy_timeout_ms as i64)?
            .set_default("cache.capacity", defaults.cache.capacity as i64)?
            .set_default("observability.metrics_enabled", true)?
            .set_default("observability.metrics_port", 9090)?
            .set_default("observability.tracing_enabled", true)?
            .set_default("observability.log_level", "info")?
            .set_default("observability.log_format", "json")?;

        if Path::new("config.toml").exists() {
            builder = builder.add_source(File::with_name("config"));
        }

        builder = builder.add_source(
            Environment::with_prefix("ORCHESTRATOR")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }

    /// Validate configuration invariants.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.server.port == 0 {
            errors.push("server port must be greater than 0".to_string());
        }
        if !(0.0..1.0).contains(&self.aimd.hysteresis) {
            errors.push("aimd hysteresis must be in [0, 1)".to_string());
        }
        if self.aimd.breach_needed == 0 {
            errors.push("aimd breach_needed must be at least 1".to_string());
        }
        if self.priority.priority_levels < 2 {
            errors.push("priority levels must be at least 2".to_string());
        }
        if self.cache.capacity == 0 {
            errors.push("cache capacity must be greater than 0".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
                max_connections: 1000,
                request_timeout_ms: 30000,
            },
            aimd: AimdConfig::default(),
            priority: PriorityConfig::default(),
            distributor: DistributorConfig::default(),
            cache: CacheConfig::default(),
            startup_policy: StartupPolicyConfig::default(),
            observability: ObservabilityConfig {
                metrics_enabled: true,
                metrics_port: 9090,
                tracing_enabled: true,
                otlp_endpoint: None,
                log_level: "info".to_string(),
                log_format: LogFormat::Json,
            },
        }
    }
}
