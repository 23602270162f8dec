//! Граница сериализации событий.
//!
//! Ядро никогда не смотрит внутрь события: publisher превращает его в байты
//! перед отправкой, subscriber восстанавливает из байтов после приёма.

use bytes::Bytes;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::error::CodecError;

/// Событие, которое можно передать через шину.
pub trait Event: Sized + Send + 'static {
    /// Сериализует событие в полезную нагрузку фрейма.
    fn encode(&self) -> Result<Bytes, CodecError>;

    /// Восстанавливает событие из полезной нагрузки фрейма.
    fn decode(bytes: &[u8]) -> Result<Self, CodecError>;
}

impl Event for Bytes {
    fn encode(&self) -> Result<Bytes, CodecError> {
        Ok(self.clone())
    }

    fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        Ok(Bytes::copy_from_slice(bytes))
    }
}

impl Event for Vec<u8> {
    fn encode(&self) -> Result<Bytes, CodecError> {
        Ok(Bytes::copy_from_slice(self))
    }

    fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        Ok(bytes.to_vec())
    }
}

impl Event for String {
    fn encode(&self) -> Result<Bytes, CodecError> {
        Ok(Bytes::copy_from_slice(self.as_bytes()))
    }

    fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        Ok(String::from_utf8(bytes.to_vec())?)
    }
}

/// Обёртка для любых serde-типов: кодирует значение в MessagePack.
///
/// Структуры сериализуются как map, поэтому порядок и добавление полей не
/// ломают совместимость между версиями publisher'а и subscriber'а.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MsgPack<T>(pub T);

impl<T> MsgPack<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> Event for MsgPack<T>
where
    T: Serialize + DeserializeOwned + Send + 'static,
{
    fn encode(&self) -> Result<Bytes, CodecError> {
        let buf = rmp_serde::to_vec_named(&self.0)?;
        Ok(Bytes::from(buf))
    }

    fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        Ok(MsgPack(rmp_serde::from_slice(bytes)?))
    }
}
