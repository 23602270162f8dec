use std::{any::Any, error::Error};

use crate::StatusCode;

/// Общий интерфейс корневых ошибок шины.
///
/// Трейт object-safe: [`StackError`](crate::StackError) хранит корень как
/// `Arc<dyn ErrorExt>` и через него отдаёт код статуса, сообщение для
/// вызывающего кода и поля для `tracing`.
pub trait ErrorExt: Error + Send + Sync + 'static {
    fn status_code(&self) -> StatusCode {
        StatusCode::Error
    }

    fn as_any(&self) -> &dyn Any;

    /// Сообщение без адресов и кодов errno.
    fn client_message(&self) -> String {
        self.to_string()
    }

    fn log_message(&self) -> String {
        format!("{self:?}")
    }

    /// Пары для полей `tracing`-событий. Реализации транспорта дополняют их
    /// адресом и errno.
    fn metrics_tags(&self) -> Vec<(&'static str, String)> {
        let status = self.status_code();
        vec![
            ("error_type", self.type_name()),
            ("status_code", status.code().to_string()),
        ]
    }

    /// Последний сегмент пути типа, например `TopicError`.
    fn type_name(&self) -> String {
        let full = std::any::type_name::<Self>();
        full.rsplit("::").next().unwrap_or(full).to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::fmt;

    use super::*;

    #[derive(Debug)]
    struct SocketGone;

    impl fmt::Display for SocketGone {
        fn fmt(
            &self,
            f: &mut fmt::Formatter<'_>,
        ) -> fmt::Result {
            f.write_str("socket gone")
        }
    }

    impl Error for SocketGone {}

    impl ErrorExt for SocketGone {
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[derive(Debug)]
    struct RejectedTopic(&'static str);

    impl fmt::Display for RejectedTopic {
        fn fmt(
            &self,
            f: &mut fmt::Formatter<'_>,
        ) -> fmt::Result {
            write!(f, "rejected topic '{}'", self.0)
        }
    }

    impl Error for RejectedTopic {}

    impl ErrorExt for RejectedTopic {
        fn status_code(&self) -> StatusCode {
            StatusCode::InvalidTopic
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[test]
    fn test_defaults() {
        let err = SocketGone;
        assert_eq!(err.status_code(), StatusCode::Error);
        assert_eq!(err.client_message(), "socket gone");
        assert_eq!(err.log_message(), "SocketGone");
        assert_eq!(err.type_name(), "SocketGone");
    }

    #[test]
    fn test_dyn_downcast() {
        let boxed: Box<dyn ErrorExt> = Box::new(RejectedTopic("a b"));
        assert_eq!(boxed.status_code(), StatusCode::InvalidTopic);
        assert_eq!(
            boxed.as_any().downcast_ref::<RejectedTopic>().map(|e| e.0),
            Some("a b")
        );
        assert!(boxed.as_any().downcast_ref::<SocketGone>().is_none());
    }

    #[test]
    fn test_metrics_tags_use_numeric_status() {
        let tags = RejectedTopic("x").metrics_tags();
        assert_eq!(
            tags,
            vec![
                ("error_type", "RejectedTopic".to_string()),
                ("status_code", "2".to_string()),
            ]
        );
    }
}
