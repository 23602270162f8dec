use crate::StackError;

/// Возвращает `Err(StackError)` из текущей функции.
///
/// `bail!(err)` принимает любую ошибку, которая конвертируется в
/// [`StackError`]. `bail!(code, "fmt", args..)` собирает `GenericError` с
/// указанным кодом и отформатированным сообщением.
///
/// ```ignore
/// use topicbus_error::{bail, BusResult, EndpointError};
///
/// fn require_socket(started: bool) -> BusResult<()> {
///     if !started {
///         bail!(EndpointError::NotStarted { endpoint: "publisher" });
///     }
///     Ok(())
/// }
/// ```
#[macro_export]
macro_rules! bail {
    ($err:expr $(,)?) => {
        return Err($crate::StackError::from($err))
    };
    ($code:expr, $($fmt:tt)+) => {
        return Err($crate::StackError::new($crate::types::GenericError::new(
            $code,
            format!($($fmt)+),
        )))
    };
}

/// `bail!`, если условие ложно. Аргументы после условия те же, что у `bail!`.
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $($rest:tt)+) => {
        if !($cond) {
            $crate::bail!($($rest)+);
        }
    };
}

/// Приклеивает к ошибке `Result` отформатированный контекст.
#[macro_export]
macro_rules! context {
    ($result:expr, $($fmt:tt)+) => {
        $crate::ResultExt::context($result, format!($($fmt)+))
    };
}

/// Контекст для любого `Result`, чья ошибка сводится к [`StackError`].
pub trait ResultExt<T> {
    fn context<C>(
        self,
        ctx: C,
    ) -> Result<T, StackError>
    where
        C: Into<String>;

    /// Как [`ResultExt::context`], но строка строится только при ошибке.
    fn with_context<C, F>(
        self,
        f: F,
    ) -> Result<T, StackError>
    where
        C: Into<String>,
        F: FnOnce() -> C;
}

impl<T, E> ResultExt<T> for Result<T, E>
where
    E: Into<StackError>,
{
    #[track_caller]
    fn context<C>(
        self,
        ctx: C,
    ) -> Result<T, StackError>
    where
        C: Into<String>,
    {
        match self {
            Ok(value) => Ok(value),
            Err(e) => Err(e.into().context(ctx)),
        }
    }

    #[track_caller]
    fn with_context<C, F>(
        self,
        f: F,
    ) -> Result<T, StackError>
    where
        C: Into<String>,
        F: FnOnce() -> C,
    {
        match self {
            Ok(value) => Ok(value),
            Err(e) => Err(e.into().context(f())),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::{BusResult, EndpointError, StatusCode, TopicError};

    fn stop(started: bool) -> BusResult<()> {
        if !started {
            bail!(EndpointError::NotStarted { endpoint: "publisher" });
        }
        Ok(())
    }

    #[test]
    fn test_bail_keeps_typed_error() {
        let err = stop(false).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::Error);
        assert!(matches!(
            err.downcast_ref::<EndpointError>(),
            Some(EndpointError::NotStarted { .. })
        ));
        assert!(stop(true).is_ok());
    }

    #[test]
    fn test_bail_formats_generic_error() {
        fn bind(port: u16) -> BusResult<()> {
            bail!(StatusCode::Error, "port {port} is busy");
        }

        let err = bind(5562).unwrap_err();
        assert_eq!(err.to_string(), "port 5562 is busy");
    }

    #[test]
    fn test_ensure_both_forms() {
        fn check_topics(count: usize) -> BusResult<()> {
            ensure!(count > 0, TopicError::EmptyList);
            ensure!(count <= 64, StatusCode::Error, "{} topics in one call", count);
            Ok(())
        }

        assert!(check_topics(3).is_ok());
        assert_eq!(
            check_topics(0).unwrap_err().status_code(),
            StatusCode::InvalidTopic
        );
        let err = check_topics(65).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::Error);
        assert!(err.to_string().contains("65 topics"));
    }

    #[test]
    fn test_context_macro_formats() {
        let result: Result<(), TopicError> = Err(TopicError::Malformed { topic: "a b".into() });
        let err = context!(result, "subscribe #{}", 3).unwrap_err();
        assert_eq!(err.contexts()[0].message, "subscribe #3");
        assert_eq!(err.status_code(), StatusCode::InvalidTopic);
    }

    #[test]
    fn test_with_context_is_lazy() {
        let calls = Cell::new(0);
        let describe = || {
            calls.set(calls.get() + 1);
            "publish to 'home/'"
        };

        let ok: Result<(), TopicError> = Ok(());
        assert!(ok.with_context(describe).is_ok());
        assert_eq!(calls.get(), 0);

        let failed: Result<(), TopicError> = Err(TopicError::Empty);
        let err = failed.with_context(describe).unwrap_err();
        assert_eq!(calls.get(), 1);
        assert_eq!(err.contexts()[0].message, "publish to 'home/'");
    }
}
