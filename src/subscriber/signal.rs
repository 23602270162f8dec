//! Loopback-канал сигналов между контроллером subscriber'а и потоком приёма.
//!
//! Пара PAIR-сокетов на уникальном `inproc://` адресе. Клиентская сторона
//! входит в wait-set потока приёма вместе с data-сокетом, поэтому любой
//! фрейм на ней будит заблокированный `poll`. По каналу ходят токен
//! остановки, команды фильтра и ответы на них.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use uuid::Uuid;

use topicbus_error::BusResult;

use crate::error::TransportError;

/// Токен остановки потока приёма.
pub const SHUTDOWN_TOKEN: &[u8] = b"shutdown";

const TAG_SUBSCRIBE: u8 = b'S';
const TAG_UNSUBSCRIBE: u8 = b'U';
const TAG_ACK: u8 = b'A';

const HEADER_LEN: usize = 1 + 8;

/// Изменение фильтра data-сокета.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterCommand {
    Subscribe(Vec<u8>),
    Unsubscribe(Vec<u8>),
}

/// Фрейм, который контроллер отправляет потоку приёма.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    Shutdown,
    Command { seq: u64, command: FilterCommand },
}

/// Ответ потока приёма на команду. `errno == 0` означает успех.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ack {
    pub seq: u64,
    pub errno: i32,
}

/// Ошибка разбора фрейма сигнального канала.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedSignal(pub usize);

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl FilterCommand {
    pub fn filter(&self) -> &[u8] {
        match self {
            Self::Subscribe(f) | Self::Unsubscribe(f) => f,
        }
    }

    /// Применяет команду к SUB-сокету.
    pub fn apply(
        &self,
        socket: &zmq::Socket,
    ) -> Result<(), zmq::Error> {
        match self {
            Self::Subscribe(filter) => socket.set_subscribe(filter),
            Self::Unsubscribe(filter) => socket.set_unsubscribe(filter),
        }
    }
}

impl Signal {
    pub fn encode(&self) -> Bytes {
        match self {
            Self::Shutdown => Bytes::from_static(SHUTDOWN_TOKEN),
            Self::Command { seq, command } => {
                let tag = match command {
                    FilterCommand::Subscribe(_) => TAG_SUBSCRIBE,
                    FilterCommand::Unsubscribe(_) => TAG_UNSUBSCRIBE,
                };
                let filter = command.filter();
                let mut buf = BytesMut::with_capacity(HEADER_LEN + filter.len());
                buf.put_u8(tag);
                buf.put_u64(*seq);
                buf.put_slice(filter);
                buf.freeze()
            }
        }
    }

    pub fn decode(frame: &[u8]) -> Result<Self, MalformedSignal> {
        if frame == SHUTDOWN_TOKEN {
            return Ok(Self::Shutdown);
        }
        if frame.len() < HEADER_LEN {
            return Err(MalformedSignal(frame.len()));
        }

        let mut buf = frame;
        let tag = buf.get_u8();
        let seq = buf.get_u64();
        let filter = buf.to_vec();
        let command = match tag {
            TAG_SUBSCRIBE => FilterCommand::Subscribe(filter),
            TAG_UNSUBSCRIBE => FilterCommand::Unsubscribe(filter),
            _ => return Err(MalformedSignal(frame.len())),
        };
        Ok(Self::Command { seq, command })
    }
}

impl Ack {
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(HEADER_LEN + 4);
        buf.put_u8(TAG_ACK);
        buf.put_u64(self.seq);
        buf.put_i32(self.errno);
        buf.freeze()
    }

    pub fn decode(frame: &[u8]) -> Result<Self, MalformedSignal> {
        if frame.len() != HEADER_LEN + 4 || frame[0] != TAG_ACK {
            return Err(MalformedSignal(frame.len()));
        }
        let mut buf = &frame[1..];
        Ok(Self {
            seq: buf.get_u64(),
            errno: buf.get_i32(),
        })
    }

    pub fn result(&self) -> Result<(), zmq::Error> {
        match self.errno {
            0 => Ok(()),
            errno => Err(zmq::Error::from_raw(errno)),
        }
    }
}

/// Две стороны сигнального канала.
pub struct SignalPair {
    pub address: String,
    /// Сторона контроллера (bind).
    pub server: zmq::Socket,
    /// Сторона потока приёма (connect).
    pub client: zmq::Socket,
}

/// Адрес сигнального канала. `id` уникален для каждого запуска.
pub fn signal_address(id: &Uuid) -> String {
    format!("inproc://shutdown-{id}")
}

/// Открывает сигнальный канал: сервер делает bind, клиент подключается к
/// нему. Ответы на команды ждутся не дольше `reply_timeout_ms`.
pub fn open(
    context: &zmq::Context,
    id: &Uuid,
    reply_timeout_ms: i32,
) -> BusResult<SignalPair> {
    let address = signal_address(id);

    let server = context
        .socket(zmq::PAIR)
        .map_err(|source| TransportError::Socket { kind: "PAIR", source })?;
    server
        .set_linger(0)
        .map_err(|source| TransportError::SocketOption {
            option: "ZMQ_LINGER",
            source,
        })?;
    server
        .set_rcvtimeo(reply_timeout_ms)
        .map_err(|source| TransportError::SocketOption {
            option: "ZMQ_RCVTIMEO",
            source,
        })?;
    server.bind(&address).map_err(|source| TransportError::Bind {
        address: address.clone(),
        source,
    })?;

    let client = context
        .socket(zmq::PAIR)
        .map_err(|source| TransportError::Socket { kind: "PAIR", source })?;
    client
        .set_linger(0)
        .map_err(|source| TransportError::SocketOption {
            option: "ZMQ_LINGER",
            source,
        })?;
    client.connect(&address).map_err(|source| TransportError::Connect {
        address: address.clone(),
        source,
    })?;

    Ok(SignalPair {
        address,
        server,
        client,
    })
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
