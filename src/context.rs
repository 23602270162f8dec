use std::fmt;

use parking_lot::RwLock;
use tracing::{debug, info};

use topicbus_error::BusResult;

use crate::{config::Settings, error::TransportError};

/// Состояние жизненного цикла контекста транспорта.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContextStatus {
    #[default]
    Unconstructed,
    Constructed,
    Initialized,
    Terminated,
}

/// Контекст ZeroMQ, которым владеет приложение.
///
/// Создаётся один раз и передаётся по ссылке в каждый publisher и
/// subscriber. Endpoint'ы забирают клон дескриптора при создании: после
/// `terminate()` новые endpoint'ы получают `None` и не запускаются, а уже
/// созданные продолжают работать на своём клоне, пока не будут остановлены.
pub struct TransportContext {
    io_threads: i32,
    state: RwLock<ContextState>,
}

#[derive(Default)]
struct ContextState {
    status: ContextStatus,
    handle: Option<zmq::Context>,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl TransportContext {
    pub fn new() -> Self {
        Self::with_settings(&Settings::default())
    }

    pub fn with_settings(settings: &Settings) -> Self {
        Self {
            io_threads: settings.io_threads,
            state: RwLock::new(ContextState {
                status: ContextStatus::Constructed,
                handle: None,
            }),
        }
    }

    /// Создаёт контекст ZeroMQ, если его ещё нет.
    ///
    /// Повторный вызов на инициализированном контексте ничего не делает.
    /// После `terminate()` создаётся новый контекст.
    pub fn initialize(&self) -> BusResult<()> {
        let mut state = self.state.write();
        if state.handle.is_some() {
            return Ok(());
        }

        let handle = zmq::Context::new();
        handle
            .set_io_threads(self.io_threads)
            .map_err(TransportError::Context)?;

        state.handle = Some(handle);
        state.status = ContextStatus::Initialized;
        info!(io_threads = self.io_threads, "Transport context initialized");
        Ok(())
    }

    /// Освобождает дескриптор контекста. Идемпотентна и всегда успешна.
    ///
    /// libzmq завершает контекст, когда освобождается последний клон
    /// (включая клоны внутри ещё живых сокетов), поэтому вызов не блокируется.
    pub fn terminate(&self) {
        let mut state = self.state.write();
        if state.handle.take().is_some() {
            info!("Transport context terminated");
        } else {
            debug!("Transport context already released");
        }
        state.status = ContextStatus::Terminated;
    }

    pub fn status(&self) -> ContextStatus {
        self.state.read().status
    }

    /// Клон дескриптора или `None`, если контекст не инициализирован.
    pub fn handle(&self) -> Option<zmq::Context> {
        self.state.read().handle.clone()
    }

    pub fn is_initialized(&self) -> bool {
        self.status() == ContextStatus::Initialized
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов для TransportContext
////////////////////////////////////////////////////////////////////////////////

impl Default for TransportContext {
    fn default() -> Self {
        Self::new()
    }
}

/// `zmq::Context` не реализует `Debug`: печатаем только состояние.
impl fmt::Debug for TransportContext {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("TransportContext")
            .field("io_threads", &self.io_threads)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle() {
        assert_eq!(ContextStatus::default(), ContextStatus::Unconstructed);

        let ctx = TransportContext::new();
        assert_eq!(ctx.status(), ContextStatus::Constructed);
        assert!(ctx.handle().is_none());

        ctx.initialize().unwrap();
        assert_eq!(ctx.status(), ContextStatus::Initialized);
        assert!(ctx.handle().is_some());

        ctx.terminate();
        assert_eq!(ctx.status(), ContextStatus::Terminated);
        assert!(ctx.handle().is_none());
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let ctx = TransportContext::new();
        ctx.initialize().unwrap();
        let first = ctx.handle().unwrap();
        ctx.initialize().unwrap();
        let second = ctx.handle().unwrap();

        // Оба клона указывают на один контекст: сокет из одного видит
        // inproc-адрес, привязанный через другой.
        let server = first.socket(zmq::PAIR).unwrap();
        server.bind("inproc://context-idempotent").unwrap();
        let client = second.socket(zmq::PAIR).unwrap();
        assert!(client.connect("inproc://context-idempotent").is_ok());
        client.send("ping", 0).unwrap();
        assert_eq!(server.recv_bytes(0).unwrap(), b"ping");
    }

    #[test]
    fn test_terminate_is_idempotent() {
        let ctx = TransportContext::new();
        ctx.terminate();
        ctx.terminate();
        assert_eq!(ctx.status(), ContextStatus::Terminated);

        ctx.initialize().unwrap();
        assert!(ctx.is_initialized());
        ctx.terminate();
    }

    #[test]
    fn test_debug_shows_status() {
        let ctx = TransportContext::new();
        ctx.initialize().unwrap();
        let rendered = format!("{ctx:?}");
        assert!(rendered.contains("io_threads: 1"), "{rendered}");
        assert!(rendered.contains("Initialized"), "{rendered}");
    }
}
