use std::{error::Error, fmt, panic::Location, sync::Arc};

use crate::{ErrorExt, LogLevel, StatusCode};

/// Ошибка операции publisher/subscriber.
///
/// Корень (`TopicError`, `EndpointError`, ошибка транспорта или кодека)
/// хранится за `Arc`, поэтому клонирование дешёвое. Поверх корня
/// накапливаются контексты: каждый `?` с `.context(..)` добавляет шаг, на
/// котором операция сорвалась, вместе с местом вызова.
#[derive(Clone)]
pub struct StackError {
    root: Arc<dyn ErrorExt>,
    /// От самого внутреннего к самому внешнему.
    frames: Vec<ErrorContext>,
}

/// Один шаг цепочки контекстов.
#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub message: String,
    pub location: Option<&'static Location<'static>>,
}

impl fmt::Display for ErrorContext {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self.location {
            Some(at) => write!(f, "{} ({}:{})", self.message, at.file(), at.line()),
            None => f.write_str(&self.message),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl StackError {
    #[track_caller]
    pub fn new<E: ErrorExt>(err: E) -> Self {
        Self {
            root: Arc::new(err),
            frames: Vec::new(),
        }
    }

    /// Добавляет внешний шаг с местом вызова.
    #[track_caller]
    pub fn context(
        mut self,
        msg: impl Into<String>,
    ) -> Self {
        self.frames.push(ErrorContext {
            message: msg.into(),
            location: Some(Location::caller()),
        });
        self
    }

    /// Код статуса определяется только корнем: контексты его не меняют.
    pub fn status_code(&self) -> StatusCode {
        self.root.status_code()
    }

    pub fn client_message(&self) -> String {
        self.root.client_message()
    }

    pub fn root(&self) -> &dyn ErrorExt {
        self.root.as_ref()
    }

    pub fn contexts(&self) -> &[ErrorContext] {
        &self.frames
    }

    pub fn metrics_tags(&self) -> Vec<(&'static str, String)> {
        self.root.metrics_tags()
    }

    pub fn downcast_ref<T: ErrorExt + 'static>(&self) -> Option<&T> {
        self.root.as_any().downcast_ref::<T>()
    }

    /// Контексты в виде `сообщение (файл:строка)`.
    pub fn format_contexts(&self) -> Vec<String> {
        self.frames.iter().map(ToString::to_string).collect()
    }

    pub fn log_level(&self) -> LogLevel {
        self.status_code().log_level()
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов для StackError
////////////////////////////////////////////////////////////////////////////////

impl fmt::Debug for StackError {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("StackError")
            .field("status", &self.status_code())
            .field("root", &format_args!("{}", self.root))
            .field("contexts", &self.format_contexts())
            .finish()
    }
}

/// `внешний: ...: внутренний: корень`.
impl fmt::Display for StackError {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        for frame in self.frames.iter().rev() {
            write!(f, "{}: ", frame.message)?;
        }
        write!(f, "{}", self.root)
    }
}

impl Error for StackError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(self.root.as_ref())
    }
}

impl<E: ErrorExt> From<E> for StackError {
    #[track_caller]
    fn from(err: E) -> Self {
        Self::new(err)
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
