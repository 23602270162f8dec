use std::any::Any;

use crate::{ErrorExt, StatusCode};

/// Ошибки валидации топика. До транспорта такие запросы не доходят.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopicError {
    /// Пустая строка там, где нужен конкретный топик
    Empty,
    /// Топик содержит символы вне `[a-zA-Z0-9-_./]`
    Malformed { topic: String },
    /// Пустой список топиков
    EmptyList,
}

impl std::fmt::Display for TopicError {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "Topic is empty"),
            Self::Malformed { topic } => {
                write!(f, "Invalid topic '{topic}': allowed characters are [a-zA-Z0-9-_./]")
            }
            Self::EmptyList => write!(f, "Topic list is empty"),
        }
    }
}

impl std::error::Error for TopicError {}

impl ErrorExt for TopicError {
    fn status_code(&self) -> StatusCode {
        StatusCode::InvalidTopic
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn metrics_tags(&self) -> Vec<(&'static str, String)> {
        let mut tags = vec![
            ("error_type", "topic".to_string()),
            ("status_code", self.status_code().code().to_string()),
        ];
        if let Self::Malformed { topic } = self {
            tags.push(("topic", topic.clone()));
        }
        tags
    }
}
