//! Publisher: PUB-сокет, который рассылает события всем подписчикам или
//! помечает их одним или несколькими топиками.

use std::{cell::RefCell, time::Duration};

use bytes::Bytes;
use parking_lot::ReentrantMutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use topicbus_error::{bail, ensure, BusResult, EndpointError, ResultExt, TopicError};

use crate::{config::Settings, context::TransportContext, error::TransportError, event::Event, topic::Topic};

const ENDPOINT: &str = "publisher";

/// Публикующий endpoint.
///
/// Сокет существует только между `start()` и `stop()`. Все операции с ним
/// сериализуются реентерабельной блокировкой, так что `publish` можно
/// вызывать из нескольких потоков.
pub struct Publisher {
    context: Option<zmq::Context>,
    port: u16,
    bind_host: String,
    close_timeout: Duration,
    socket: ReentrantMutex<RefCell<Option<zmq::Socket>>>,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl Publisher {
    pub fn new(
        ctx: &TransportContext,
        port: u16,
    ) -> Self {
        Self::with_settings(ctx, port, &Settings::default())
    }

    pub fn with_settings(
        ctx: &TransportContext,
        port: u16,
        settings: &Settings,
    ) -> Self {
        Self {
            context: ctx.handle(),
            port,
            bind_host: settings.bind_host.clone(),
            close_timeout: settings.close_timeout(),
            socket: ReentrantMutex::new(RefCell::new(None)),
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Адрес, на котором делается bind.
    pub fn address(&self) -> String {
        format!("tcp://{}:{}", self.bind_host, self.port)
    }

    pub fn is_started(&self) -> bool {
        self.socket.lock().borrow().is_some()
    }

    /// Создаёт PUB-сокет и делает bind. Повторный вызов ничего не делает.
    pub fn start(&self) -> BusResult<()> {
        let Some(context) = self.context.as_ref() else {
            error!(port = self.port, "Publisher has no transport context");
            return Err(EndpointError::NoContext.into());
        };

        let guard = self.socket.lock();
        if guard.borrow().is_some() {
            return Ok(());
        }

        let address = self.address();
        let socket = context
            .socket(zmq::PUB)
            .map_err(|source| TransportError::Socket { kind: "PUB", source })?;
        socket
            .set_linger(0)
            .map_err(|source| TransportError::SocketOption {
                option: "ZMQ_LINGER",
                source,
            })?;
        // При ошибке bind сокет освобождается при выходе из функции.
        if let Err(source) = socket.bind(&address) {
            error!(%address, error = %source, "Publisher bind failed");
            return Err(TransportError::Bind { address, source }.into());
        }

        *guard.borrow_mut() = Some(socket);
        info!(%address, "Publisher started");
        Ok(())
    }

    /// Отправляет событие без топика одним фреймом.
    pub fn publish<E: Event>(
        &self,
        event: &E,
    ) -> BusResult<()> {
        let guard = self.socket.lock();
        let socket = guard.borrow();
        let Some(socket) = socket.as_ref() else {
            return Err(EndpointError::NotStarted { endpoint: ENDPOINT }.into());
        };

        let payload = event.encode().context("encode event")?;
        socket.send(&payload[..], 0).map_err(TransportError::Send)?;
        debug!(bytes = payload.len(), "Event published");
        Ok(())
    }

    /// Отправляет событие двумя фреймами: топик и полезная нагрузка.
    ///
    /// Недопустимый топик возвращает `InvalidTopic`, не трогая сокет.
    pub fn publish_topic<E: Event>(
        &self,
        topic: &str,
        event: &E,
    ) -> BusResult<()> {
        let topic = Topic::parse(topic)?;
        let payload = event.encode().context("encode event")?;
        self.send_tagged(&topic, &payload)
    }

    /// Публикует событие в каждый топик по порядку.
    ///
    /// Останавливается на первой ошибке и возвращает её; уже отправленные
    /// сообщения не отзываются. Пустой список возвращает `InvalidTopic`.
    pub fn publish_topics<E, T>(
        &self,
        topics: &[T],
        event: &E,
    ) -> BusResult<()>
    where
        E: Event,
        T: AsRef<str>,
    {
        ensure!(!topics.is_empty(), TopicError::EmptyList);

        let guard = self.socket.lock();
        ensure!(guard.borrow().is_some(), EndpointError::NotStarted { endpoint: ENDPOINT });

        let payload = event.encode().context("encode event")?;
        for (index, raw) in topics.iter().enumerate() {
            let raw = raw.as_ref();
            let topic = Topic::parse(raw)
                .with_context(|| format!("topic #{index} of {}", topics.len()))?;
            self.send_tagged(&topic, &payload)
                .with_context(|| format!("publish to '{raw}'"))?;
        }
        Ok(())
    }

    fn send_tagged(
        &self,
        topic: &Topic,
        payload: &Bytes,
    ) -> BusResult<()> {
        let guard = self.socket.lock();
        let socket = guard.borrow();
        let Some(socket) = socket.as_ref() else {
            return Err(EndpointError::NotStarted { endpoint: ENDPOINT }.into());
        };

        socket
            .send(topic.as_bytes(), zmq::SNDMORE)
            .map_err(TransportError::Send)?;
        socket.send(&payload[..], 0).map_err(TransportError::Send)?;
        debug!(%topic, bytes = payload.len(), "Event published");
        Ok(())
    }

    /// Закрывает сокет и ждёт подтверждения закрытия не дольше
    /// `close_timeout`. Таймаут только логируется: сокет освобождён в любом
    /// случае.
    pub fn stop(&self) -> BusResult<()> {
        let guard = self.socket.lock();
        let Some(socket) = guard.borrow_mut().take() else {
            bail!(EndpointError::NotStarted { endpoint: ENDPOINT });
        };

        match self.context.as_ref() {
            Some(context) => self.close_confirmed(context, socket),
            None => drop(socket),
        }
        info!(port = self.port, "Publisher stopped");
        Ok(())
    }

    fn close_confirmed(
        &self,
        context: &zmq::Context,
        socket: zmq::Socket,
    ) {
        let closed = zmq::SocketEvent::CLOSED.to_raw();
        let monitor_address = format!("inproc://monitor-{}", Uuid::new_v4());

        let monitor = match attach_monitor(context, &socket, &monitor_address, self.close_timeout) {
            Ok(monitor) => monitor,
            Err(e) => {
                info!(error = %e, "Close monitor unavailable, closing without confirmation");
                return;
            }
        };

        drop(socket);

        loop {
            match monitor.recv_bytes(0) {
                Ok(frame) => {
                    // Событие монитора: u16 код события + u32 значение,
                    // затем отдельный фрейм с адресом.
                    skip_address_frame(&monitor);
                    if frame.len() >= 2 && u16::from_ne_bytes([frame[0], frame[1]]) == closed {
                        debug!(port = self.port, "Publisher socket close confirmed");
                        return;
                    }
                }
                Err(zmq::Error::EAGAIN) => {
                    warn!(
                        port = self.port,
                        timeout_ms = self.close_timeout.as_millis() as u64,
                        "Publisher socket close was not confirmed in time"
                    );
                    return;
                }
                Err(e) => {
                    warn!(error = %e, "Close monitor failed");
                    return;
                }
            }
        }
    }
}

/// Подключает PAIR-сокет к монитору событий закрытия `socket`.
fn attach_monitor(
    context: &zmq::Context,
    socket: &zmq::Socket,
    address: &str,
    timeout: Duration,
) -> Result<zmq::Socket, TransportError> {
    let monitor_error = |source| TransportError::Monitor {
        address: address.to_string(),
        source,
    };

    socket
        .monitor(address, zmq::SocketEvent::CLOSED.to_raw() as i32)
        .map_err(monitor_error)?;
    let monitor = context
        .socket(zmq::PAIR)
        .map_err(|source| TransportError::Socket { kind: "PAIR", source })?;
    monitor
        .set_rcvtimeo(timeout.as_millis().min(i32::MAX as u128) as i32)
        .map_err(|source| TransportError::SocketOption {
            option: "ZMQ_RCVTIMEO",
            source,
        })?;
    monitor
        .set_linger(0)
        .map_err(|source| TransportError::SocketOption {
            option: "ZMQ_LINGER",
            source,
        })?;
    monitor.connect(address).map_err(monitor_error)?;
    Ok(monitor)
}

/// Вычитывает фрейм с адресом, который идёт за кодом события монитора.
fn skip_address_frame(monitor: &zmq::Socket) {
    match monitor.get_rcvmore() {
        Ok(true) => {
            if let Err(e) = monitor.recv_bytes(0) {
                debug!(error = %e, "Failed to read monitor address frame");
            }
        }
        Ok(false) => {}
        Err(e) => debug!(error = %e, "Failed to query monitor frame continuation"),
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов для Publisher
////////////////////////////////////////////////////////////////////////////////

impl Drop for Publisher {
    fn drop(&mut self) {
        if self.is_started() {
            if let Err(e) = self.stop() {
                crate::error::report(&e, "Failed to stop publisher on drop");
            }
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
