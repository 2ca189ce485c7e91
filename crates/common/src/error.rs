//! Error types for the edge-cloud workload orchestrator.

use thiserror::Error;

/// Main error type for the orchestrator.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors.
    #[error("configuration error: {0}")]
    Config(String),

    /// DAG or task submission failed validation.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A pipeline could not be linearized into a single chain.
    #[error("dag is not a chain: {0}")]
    NotAChain(String),

    /// An install/uninstall/dispatch operation exceeded its deadline.
    #[error("operation timed out: {0}")]
    Timeout(String),

    /// A downstream node, the distributor, or the cluster driver is
    /// unreachable.
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// A duplicate-key write was rejected and the existing record was
    /// kept, intentionally not overwritten.
    #[error("duplicate record: {0}")]
    Duplicate(String),

    /// Orchestration/control-plane errors.
    #[error("orchestration error: {0}")]
    Orchestration(String),

    /// Network errors.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization errors.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO errors.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Durable store errors.
    #[error("store error: {0}")]
    Store(#[from] sqlx::Error),

    /// Metrics registration errors.
    #[error("metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// Tracing/telemetry errors.
    #[error("telemetry error: {0}")]
    Telemetry(#[from] opentelemetry::trace::TraceError),

    /// Generic errors.
    #[error("internal error: {0}")]
    Internal(String),

    /// Unknown errors.
    #[error("unknown error: {0}")]
    Unknown(#[from] anyhow::Error),
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Check if error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Network(_) | Error::Timeout(_) | Error::UpstreamUnavailable(_)
        )
    }

    /// Map to a CLI process exit code.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Validation(_) | Error::NotAChain(_) | Error::Duplicate(_) => 1,
            Error::Orchestration(_) | Error::UpstreamUnavailable(_) | Error::Store(_) => 2,
            Error::Timeout(_) => 3,
            _ => 4,
        }
    }

    /// Get error severity for metrics.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Error::Config(_) => ErrorSeverity::Critical,
            Error::Orchestration(_) | Error::UpstreamUnavailable(_) | Error::Store(_) => {
                ErrorSeverity::High
            }
            Error::Timeout(_) => ErrorSeverity::Medium,
            Error::Validation(_) | Error::NotAChain(_) | Error::Duplicate(_) => ErrorSeverity::Low,
            _ => ErrorSeverity::Medium,
        }
    }
}

/// Error severity levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}
