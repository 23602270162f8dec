use std::{any::Any, time::Duration};

use thiserror::Error;

use crate::{ErrorExt, StatusCode};

/// Нарушение предусловий жизненного цикла endpoint'а.
#[derive(Debug, Clone, Error)]
pub enum EndpointError {
    /// Контекст транспорта не инициализирован (или уже завершён)
    #[error("Transport context is not initialized")]
    NoContext,

    /// Операция требует запущенного endpoint'а
    #[error("{endpoint} is not started")]
    NotStarted { endpoint: &'static str },

    /// Фоновый поток приёма завершился, команда не может быть доставлена
    #[error("Receiver thread is not running")]
    ReceiverStopped,

    /// `stop()` вызван из callback'а на потоке приёма
    #[error("stop() cannot be called from the receiver thread")]
    ReentrantStop,

    /// Поток приёма не взял команду фильтра вовремя; команда отменена
    #[error("Receiver did not pick up filter command within {0:?}, command cancelled")]
    CommandTimeout(Duration),
}

impl ErrorExt for EndpointError {
    fn status_code(&self) -> StatusCode {
        StatusCode::Error
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
