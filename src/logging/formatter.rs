use std::io;

use tracing_subscriber::{fmt, registry::LookupSpan, Layer};

use crate::logging::config::{LogFormat, LoggingConfig};

/// Слой вывода в stderr в формате из конфигурации.
pub fn build_formatter_from_config<S>(config: &LoggingConfig) -> Box<dyn Layer<S> + Send + Sync>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    let base = fmt::layer()
        .with_writer(io::stderr)
        .with_target(config.with_target)
        .with_thread_names(config.with_thread_names)
        .with_line_number(config.with_line_numbers);

    match config.format {
        // Цветовые escape-коды ломают JSON.
        LogFormat::Json => Box::new(base.json().with_current_span(true).with_ansi(false)),
        LogFormat::Pretty => Box::new(base.pretty().with_ansi(config.ansi)),
        LogFormat::Compact => Box::new(base.compact().with_ansi(config.ansi)),
    }
}
