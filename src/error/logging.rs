use thiserror::Error;

/// Ошибки инициализации логирования.
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("unknown log format '{0}': expected compact, pretty or json")]
    UnknownFormat(String),

    #[error("empty log level")]
    EmptyLevel,

    #[error("global tracing subscriber is already set: {0}")]
    AlreadyInitialized(#[from] tracing_subscriber::util::TryInitError),
}
