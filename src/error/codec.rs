use std::any::Any;

use thiserror::Error;
use topicbus_error::{ErrorExt, StatusCode};

/// Ошибка сериализации/десериализации события.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("event encoding failed: {0}")]
    Encode(String),

    #[error("event decoding failed: {0}")]
    Decode(String),
}

// === Преобразования ===

impl From<rmp_serde::encode::Error> for CodecError {
    fn from(err: rmp_serde::encode::Error) -> Self {
        CodecError::Encode(err.to_string())
    }
}

impl From<rmp_serde::decode::Error> for CodecError {
    fn from(err: rmp_serde::decode::Error) -> Self {
        CodecError::Decode(err.to_string())
    }
}

impl From<std::string::FromUtf8Error> for CodecError {
    fn from(err: std::string::FromUtf8Error) -> Self {
        CodecError::Decode(err.to_string())
    }
}

impl ErrorExt for CodecError {
    fn status_code(&self) -> StatusCode {
        StatusCode::Error
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn client_message(&self) -> String {
        match self {
            Self::Encode(_) => "Event encoding failed".to_string(),
            Self::Decode(_) => "Event decoding failed".to_string(),
        }
    }
}
