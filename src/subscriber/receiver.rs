//! Тело потока приёма.
//!
//! Поток единолично владеет data-сокетом и клиентской стороной сигнального
//! канала. Он блокируется в `zmq::poll` без таймаута на обоих сокетах и
//! выходит только по токену остановки или при ошибке приёма. Контроллер к
//! этим сокетам не прикасается: после `join` поток возвращает их обратно.

use std::{
    cell::Cell,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
};

use parking_lot::Mutex;
use tracing::{debug, error, trace, warn};
use uuid::Uuid;

use super::{
    handler::EventHandler,
    signal::{Ack, FilterCommand, Signal},
};
use crate::{error::TransportError, event::Event};

thread_local! {
    static CURRENT_RECEIVER: Cell<Option<Uuid>> = const { Cell::new(None) };
}

/// Находится ли вызывающий код на потоке приёма subscriber'а `id`
/// (то есть внутри callback'а).
pub(crate) fn is_receiver_thread(id: &Uuid) -> bool {
    CURRENT_RECEIVER.with(|current| current.get().as_ref() == Some(id))
}

/// Сокеты, которыми владеет поток приёма.
pub(crate) struct ReceiverSockets {
    pub data: zmq::Socket,
    pub signal: zmq::Socket,
}

/// Команды, поставленные callback'ами. Применяются сразу после возврата
/// из callback'а, ответа на них нет.
pub(crate) type PendingCommands = Arc<Mutex<Vec<FilterCommand>>>;

pub(crate) struct Receiver<E, H> {
    pub id: Uuid,
    pub handler: Arc<H>,
    pub running: Arc<AtomicBool>,
    /// Отметка, общая с контроллером: см. `Subscriber::send_filter`.
    pub settled: Arc<AtomicU64>,
    pub pending: PendingCommands,
    pub _event: std::marker::PhantomData<fn() -> E>,
}

enum Wake {
    Data,
    Signal,
    Spurious,
}

/// Полученное сообщение до декодирования.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct RawMessage {
    pub topic: Option<Vec<u8>>,
    pub payload: Vec<u8>,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl<E, H> Receiver<E, H>
where
    E: Event,
    H: EventHandler<E>,
{
    /// Цикл приёма. Возвращает сокеты владельцу при любом выходе.
    pub fn run(
        self,
        sockets: ReceiverSockets,
    ) -> ReceiverSockets {
        CURRENT_RECEIVER.with(|current| current.set(Some(self.id)));
        debug!(subscriber = %self.id, "Receive loop started");

        while self.running.load(Ordering::Acquire) {
            let wake = match wait(&sockets) {
                Ok(wake) => wake,
                Err(e) => {
                    error!(subscriber = %self.id, error = %e, "Receive loop poll failed");
                    break;
                }
            };

            match wake {
                Wake::Data => match receive_message(&sockets.data) {
                    Ok(message) => {
                        self.dispatch(message);
                        self.apply_pending(&sockets.data);
                    }
                    Err(e) => {
                        error!(subscriber = %self.id, error = %e, "Receive failed, stopping receive loop");
                        break;
                    }
                },
                Wake::Signal => {
                    if !self.handle_signal(&sockets) {
                        break;
                    }
                }
                Wake::Spurious => continue,
            }
        }

        self.running.store(false, Ordering::Release);
        CURRENT_RECEIVER.with(|current| current.set(None));
        debug!(subscriber = %self.id, "Receive loop finished");
        sockets
    }

    fn dispatch(
        &self,
        message: RawMessage,
    ) {
        let event = match E::decode(&message.payload) {
            Ok(event) => event,
            Err(e) => {
                warn!(subscriber = %self.id, error = %e, bytes = message.payload.len(), "Dropping undecodable event");
                return;
            }
        };

        match message.topic {
            Some(topic) => match String::from_utf8(topic) {
                Ok(topic) => {
                    trace!(subscriber = %self.id, %topic, "Delivering topic event");
                    self.handler.on_topic_event(&topic, event);
                }
                Err(e) => {
                    warn!(subscriber = %self.id, error = %e, "Dropping event with non UTF-8 topic");
                }
            },
            None => {
                trace!(subscriber = %self.id, "Delivering event");
                self.handler.on_event(event);
            }
        }
    }

    /// Обрабатывает фрейм сигнального канала. `false` означает остановку.
    fn handle_signal(
        &self,
        sockets: &ReceiverSockets,
    ) -> bool {
        let frame = match sockets.signal.recv_bytes(0) {
            Ok(frame) => frame,
            Err(e) => {
                error!(subscriber = %self.id, error = %e, "Signal channel receive failed");
                return false;
            }
        };

        match Signal::decode(&frame) {
            Ok(Signal::Shutdown) => {
                debug!(subscriber = %self.id, "Shutdown signal received");
                false
            }
            Ok(Signal::Command { seq, command }) => {
                if self.settled.fetch_max(seq, Ordering::AcqRel) >= seq {
                    debug!(subscriber = %self.id, seq, ?command, "Skipping cancelled filter command");
                    self.apply_pending(&sockets.data);
                    return true;
                }
                let errno = match command.apply(&sockets.data) {
                    Ok(()) => 0,
                    Err(e) => {
                        warn!(subscriber = %self.id, error = %e, ?command, "Filter command failed");
                        e.to_raw()
                    }
                };
                let ack = Ack { seq, errno };
                if let Err(e) = sockets.signal.send(&ack.encode()[..], zmq::DONTWAIT) {
                    warn!(subscriber = %self.id, error = %e, seq, "Failed to acknowledge filter command");
                }
                self.apply_pending(&sockets.data);
                true
            }
            Err(e) => {
                warn!(subscriber = %self.id, len = e.0, "Ignoring malformed signal frame");
                true
            }
        }
    }

    fn apply_pending(
        &self,
        data: &zmq::Socket,
    ) {
        let commands = std::mem::take(&mut *self.pending.lock());
        for command in commands {
            if let Err(e) = command.apply(data) {
                warn!(subscriber = %self.id, error = %e, ?command, "Queued filter command failed");
            }
        }
    }
}

/// Блокируется до готовности одного из сокетов. Данные имеют приоритет
/// над сигнальным каналом в пределах одного пробуждения.
fn wait(sockets: &ReceiverSockets) -> Result<Wake, TransportError> {
    let mut items = [
        sockets.signal.as_poll_item(zmq::POLLIN),
        sockets.data.as_poll_item(zmq::POLLIN),
    ];
    match zmq::poll(&mut items, -1) {
        Ok(_) => {}
        Err(zmq::Error::EINTR) => return Ok(Wake::Spurious),
        Err(e) => return Err(TransportError::Poll(e)),
    }

    if items[1].is_readable() {
        Ok(Wake::Data)
    } else if items[0].is_readable() {
        Ok(Wake::Signal)
    } else {
        Ok(Wake::Spurious)
    }
}

/// Читает одно сообщение. Два фрейма означают топик и полезную нагрузку,
/// один фрейм означает полезную нагрузку без топика. Лишние фреймы
/// вычитываются и отбрасываются.
pub(crate) fn receive_message(socket: &zmq::Socket) -> Result<RawMessage, TransportError> {
    let first = socket.recv_bytes(0).map_err(TransportError::Recv)?;
    if !socket.get_rcvmore().map_err(TransportError::Recv)? {
        return Ok(RawMessage {
            topic: None,
            payload: first,
        });
    }

    let payload = socket.recv_bytes(0).map_err(TransportError::Recv)?;
    let mut extra = 0usize;
    while socket.get_rcvmore().map_err(TransportError::Recv)? {
        socket.recv_bytes(0).map_err(TransportError::Recv)?;
        extra += 1;
    }
    if extra > 0 {
        debug!(extra, "Discarded trailing frames");
    }

    Ok(RawMessage {
        topic: Some(first),
        payload,
    })
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
