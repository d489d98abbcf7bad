use thiserror::Error;

/// Crate-wide result type.
pub type AppResult<T> = std::result::Result<T, AppError>;

/// Error taxonomy surfaced by the stream service port.
///
/// `Throttled`, `RecoverableTransport`, and `IteratorExpired` (when a
/// `next_iterator` accompanies it) are absorbed internally by the partition
/// worker; `NotFound`, `InvalidArgument`, and `Unrecoverable` are fatal and
/// stop the worker.
#[derive(Debug, Clone, Error)]
pub enum ServiceError {
    #[error("request throttled by stream service")]
    Throttled,

    #[error("shard iterator expired")]
    IteratorExpired,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("recoverable transport error: {0}")]
    RecoverableTransport(String),

    #[error("unrecoverable stream service error: {0}")]
    Unrecoverable(String),
}

#[derive(Debug, Error)]
pub enum AppError {
    // =========
    // Config / startup
    // =========
    #[error("configuration file IO error: {0}")]
    ConfigIo(#[from] std::io::Error),

    #[error("failed to parse TOML config: {0}")]
    ConfigToml(#[from] toml::de::Error),

    #[error("missing configuration field: {0}")]
    MissingConfig(&'static str),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    // =========
    // Stream service
    // =========
    #[error("stream service error: {0}")]
    Service(#[from] ServiceError),

    // =========
    // Façade / state errors
    // =========
    #[error("operation invalid after close")]
    Closed,

    #[error("partition not assigned: {0}")]
    NotAssigned(String),

    #[error("getPosition is not supported; the caller owns checkpointing")]
    PositionUnsupported,

    // =========
    // Construction-time errors
    // =========
    #[error("decoder_enabled is set but no decoder was supplied at construction")]
    DecoderUnavailable,

    // =========
    // Metrics
    // =========
    #[error("prometheus registry error: {0}")]
    Prometheus(#[from] prometheus::Error),

    // =========
    // Misc
    // =========
    #[error("failed to join background task: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),

    #[error("internal error: {0}")]
    Internal(String),
}
