pub mod endpoint;
pub mod topic;

// Публичный экспорт всех типов ошибок и функций из вложенных
// модулей, чтобы упростить доступ к ним из внешнего кода.
pub use endpoint::*;
pub use topic::*;

use std::{any::Any, fmt, io, string::FromUtf8Error};

use crate::{ErrorExt, StatusCode};

/// Ошибка без отдельного типа: код статуса плюс текст. Её собирает
/// `bail!(code, ..)`.
#[derive(Debug, Clone)]
pub struct GenericError {
    code: StatusCode,
    message: String,
}

impl GenericError {
    pub fn new(
        code: StatusCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for GenericError {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for GenericError {}

impl ErrorExt for GenericError {
    fn status_code(&self) -> StatusCode {
        self.code
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl From<io::Error> for crate::StackError {
    #[track_caller]
    fn from(err: io::Error) -> Self {
        Self::new(GenericError::new(StatusCode::Error, err.to_string()))
    }
}

/// Топик из первого фрейма не в UTF-8.
impl From<FromUtf8Error> for crate::StackError {
    #[track_caller]
    fn from(err: FromUtf8Error) -> Self {
        Self::new(GenericError::new(
            StatusCode::Error,
            format!("topic frame is not UTF-8: {err}"),
        ))
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StackError;

    #[test]
    fn test_generic_error_keeps_code() {
        let err = GenericError::new(StatusCode::InvalidTopic, "topic list too long");
        assert_eq!(err.status_code(), StatusCode::InvalidTopic);
        assert_eq!(err.to_string(), "topic list too long");

        let stack = StackError::new(err);
        assert_eq!(stack.status_code(), StatusCode::InvalidTopic);
        assert!(stack.downcast_ref::<GenericError>().is_some());
    }

    #[test]
    fn test_io_error_becomes_error_status() {
        let stack = StackError::from(io::Error::new(io::ErrorKind::AddrInUse, "port busy"));
        assert_eq!(stack.status_code(), StatusCode::Error);
        assert_eq!(stack.to_string(), "port busy");
    }

    #[test]
    fn test_non_utf8_topic_frame() {
        let err = String::from_utf8(vec![b'h', 0xff]).unwrap_err();
        let stack = StackError::from(err);
        assert_eq!(stack.status_code(), StatusCode::Error);
        assert!(stack.to_string().starts_with("topic frame is not UTF-8"));
    }
}
