pub mod codec;
pub mod logging;
pub mod transport;

pub use codec::CodecError;
pub use logging::LoggingError;
pub use transport::TransportError;

use topicbus_error::{LogLevel, StackError};
use tracing::{debug, error, info, trace, warn};

/// Логирует ошибку, которую некому вернуть (например, из `Drop`), с
/// уровнем по её коду статуса.
pub(crate) fn report(
    err: &StackError,
    action: &str,
) {
    let contexts = err.format_contexts();
    match err.log_level() {
        LogLevel::Trace => trace!(error = %err, ?contexts, "{action}"),
        LogLevel::Debug => debug!(error = %err, ?contexts, "{action}"),
        LogLevel::Info => info!(error = %err, ?contexts, "{action}"),
        LogLevel::Warn => warn!(error = %err, ?contexts, "{action}"),
        LogLevel::Error => error!(error = %err, ?contexts, "{action}"),
    }
}
