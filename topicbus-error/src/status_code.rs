use std::fmt;

use num_enum::TryFromPrimitive;
#[cfg(feature = "serde_repr")]
use serde_repr::{Deserialize_repr, Serialize_repr};
#[cfg(feature = "strum")]
use strum_macros::{AsRefStr, EnumIter};

use crate::StackError;

/// Коды статуса, которые возвращает каждая операция publisher/subscriber.
///
/// # Значения:
/// - `Ok` (0): операция выполнена
/// - `Error` (1): общая ошибка (нет контекста транспорта, endpoint не
///   запущен, исключение транспорта, ошибка кодека)
/// - `InvalidTopic` (2): пустой топик, топик не соответствует шаблону
///   `[a-zA-Z0-9-_./]+` или пустой список топиков
///
/// Числовые значения входят в публичный контракт. С feature `extras` код
/// сериализуется числом (`serde_repr`) и перечисляется через `strum`.
#[cfg_attr(feature = "strum", derive(AsRefStr, EnumIter))]
#[cfg_attr(feature = "serde_repr", derive(Serialize_repr, Deserialize_repr))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive)]
#[repr(u32)]
pub enum StatusCode {
    Ok = 0,
    Error = 1,
    InvalidTopic = 2,
}

/// Уровень, с которым ошибку стоит логировать.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl StatusCode {
    pub const fn code(self) -> u32 {
        self as u32
    }

    /// `None` для значений вне `0..=2`.
    pub fn from_u32(raw: u32) -> Option<Self> {
        Self::try_from(raw).ok()
    }

    pub fn is_success(raw: u32) -> bool {
        raw == Self::Ok.code()
    }

    /// Сворачивает результат операции в трёхзначный код статуса.
    pub fn of<T>(result: &Result<T, StackError>) -> Self {
        match result {
            Ok(_) => Self::Ok,
            Err(e) => e.status_code(),
        }
    }

    /// Ошибка валидации со стороны вызывающего кода: до транспорта такой
    /// запрос не доходит.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidTopic)
    }

    /// Ошибки топика остаются на стороне вызывающего кода, поэтому `Info`.
    pub fn log_level(&self) -> LogLevel {
        match self {
            Self::Ok => LogLevel::Trace,
            Self::InvalidTopic => LogLevel::Info,
            Self::Error => LogLevel::Error,
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов для StatusCode
////////////////////////////////////////////////////////////////////////////////

impl From<StatusCode> for u32 {
    fn from(status: StatusCode) -> Self {
        status.code()
    }
}

impl fmt::Display for StatusCode {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        #[cfg(feature = "strum")]
        let name: &str = self.as_ref();
        #[cfg(not(feature = "strum"))]
        let name = format!("{self:?}");
        write!(f, "{name} ({})", self.code())
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
