//! Валидация и канонизация топиков.
//!
//! Топик допустим, если он непустой и состоит только из символов
//! `[a-zA-Z0-9-_./]`. Каноническая форма всегда заканчивается на `/`:
//! подписчик фильтрует сообщения по префиксу первого фрейма, и завершающий
//! слэш не даёт топику `home` совпасть с `homework`.

use std::{borrow::Borrow, fmt, ops::Deref};

use topicbus_error::TopicError;

/// Разделитель, которым заканчивается каноническая форма топика.
pub const TOPIC_SEPARATOR: char = '/';

/// Валидированный топик в канонической форме.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Topic(String);

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl Topic {
    /// Проверяет строку и приводит её к канонической форме.
    pub fn parse(raw: &str) -> Result<Self, TopicError> {
        if raw.is_empty() {
            return Err(TopicError::Empty);
        }
        if !is_valid(raw) {
            return Err(TopicError::Malformed {
                topic: raw.to_string(),
            });
        }

        let mut topic = String::with_capacity(raw.len() + 1);
        topic.push_str(raw);
        if !topic.ends_with(TOPIC_SEPARATOR) {
            topic.push(TOPIC_SEPARATOR);
        }
        Ok(Self(topic))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// Канонизирует топик, возвращая пустую строку для недопустимого ввода.
///
/// Пустая строка здесь служит маркером ошибки, как и в сетевом API:
/// валидный канонический топик никогда не бывает пустым.
pub fn sanitize(raw: &str) -> String {
    Topic::parse(raw).map(Topic::into_string).unwrap_or_default()
}

/// Проверяет, удовлетворяет ли строка шаблону топика (без канонизации).
pub fn is_valid(raw: &str) -> bool {
    !raw.is_empty() && raw.bytes().all(is_topic_byte)
}

#[inline]
fn is_topic_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b'/')
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов для Topic
////////////////////////////////////////////////////////////////////////////////

impl fmt::Display for Topic {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Deref for Topic {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Topic {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Topic {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for Topic {
    type Error = TopicError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Topic::parse(value)
    }
}

impl TryFrom<String> for Topic {
    type Error = TopicError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Topic::parse(&value)
    }
}

impl From<Topic> for String {
    fn from(topic: Topic) -> Self {
        topic.0
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_appends_separator() {
        assert_eq!(Topic::parse("home").unwrap().as_str(), "home/");
        assert_eq!(Topic::parse("a.b-c_d/e").unwrap().as_str(), "a.b-c_d/e/");
    }

    #[test]
    fn test_keeps_terminated_topic() {
        assert_eq!(Topic::parse("home/").unwrap().as_str(), "home/");
        assert_eq!(Topic::parse("/").unwrap().as_str(), "/");
    }

    #[test]
    fn test_rejects_empty() {
        assert_eq!(Topic::parse(""), Err(TopicError::Empty));
        assert_eq!(sanitize(""), "");
    }

    /// Пробелы, подстановочные символы и не-ASCII буквы не проходят
    /// валидацию.
    #[test]
    fn test_rejects_malformed() {
        for raw in ["This is a topic", "home/*", "дом", "a\tb", "a+b"] {
            assert!(
                matches!(Topic::parse(raw), Err(TopicError::Malformed { .. })),
                "{raw:?} must be rejected"
            );
            assert_eq!(sanitize(raw), "");
            assert!(!is_valid(raw));
        }
    }

    #[test]
    fn test_conversions() {
        let topic = Topic::try_from("office").unwrap();
        assert_eq!(&*topic, "office/");
        assert_eq!(topic.to_string(), "office/");
        assert_eq!(String::from(topic), "office/");
        assert!(Topic::try_from(String::from("bad topic")).is_err());
    }
}
