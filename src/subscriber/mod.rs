//! Subscriber: SUB-сокет, управление фильтрами топиков и фоновый поток
//! приёма с безопасной остановкой.
//!
//! `zmq::Socket` нельзя использовать из двух потоков одновременно, поэтому
//! data-сокет принадлежит потоку приёма целиком. Контроллер общается с ним
//! только через loopback-канал сигналов: команды фильтра, ответы на них и
//! токен остановки. Блокирующий `poll` потока приёма наблюдает оба сокета,
//! так что любой фрейм в канале сигналов его будит.

pub mod handler;
mod receiver;
pub mod signal;

use std::{
    cell::RefCell,
    marker::PhantomData,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

pub use handler::{Callbacks, EventHandler};
use parking_lot::{Mutex, ReentrantMutex};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use receiver::{is_receiver_thread, PendingCommands, Receiver, ReceiverSockets};
use signal::{Ack, FilterCommand, Signal, SignalPair, SHUTDOWN_TOKEN};
use topicbus_error::{context, ensure, BusResult, EndpointError, ResultExt, StackError, TopicError};

use crate::{config::Settings, context::TransportContext, error::TransportError, event::Event, topic::Topic};

const ENDPOINT: &str = "subscriber";

/// Подписывающийся endpoint.
///
/// Жизненный цикл: создан → запущен → остановлен, с возможностью
/// повторного запуска. После `stop()` фильтры сбрасываются вместе с
/// сокетом, после нового `start()` подписку нужно оформить заново.
pub struct Subscriber<E, H> {
    context: Option<zmq::Context>,
    ip: String,
    port: u16,
    id: Uuid,
    command_timeout: Duration,
    handler: Arc<H>,
    pending: PendingCommands,
    /// Читается без блокировки: callback может спросить `is_running()`,
    /// пока контроллер ждёт ответа на команду.
    running: Arc<AtomicBool>,
    /// Наибольший `seq`, который либо взял поток приёма, либо бросил
    /// контроллер по таймауту. Кто первым сдвинул отметку, тот и решил
    /// судьбу команды.
    settled: Arc<AtomicU64>,
    state: ReentrantMutex<RefCell<ControlState>>,
    _event: PhantomData<fn() -> E>,
}

/// Состояние, которым владеет контроллер.
#[derive(Default)]
struct ControlState {
    /// Серверная сторона канала сигналов.
    signal: Option<zmq::Socket>,
    worker: Option<JoinHandle<ReceiverSockets>>,
    next_seq: u64,
}

////////////////////////////////////////////////////////////////////////////////
// Конструкторы и запуск
////////////////////////////////////////////////////////////////////////////////

impl<E, H> Subscriber<E, H>
where
    E: Event,
    H: EventHandler<E>,
{
    pub fn new(
        ctx: &TransportContext,
        ip: impl Into<String>,
        port: u16,
        handler: H,
    ) -> Self {
        Self::with_settings(ctx, ip, port, handler, &Settings::default())
    }

    pub fn with_settings(
        ctx: &TransportContext,
        ip: impl Into<String>,
        port: u16,
        handler: H,
        settings: &Settings,
    ) -> Self {
        Self {
            context: ctx.handle(),
            ip: ip.into(),
            port,
            id: Uuid::new_v4(),
            command_timeout: settings.command_timeout(),
            handler: Arc::new(handler),
            pending: Arc::new(Mutex::new(Vec::new())),
            running: Arc::new(AtomicBool::new(false)),
            settled: Arc::new(AtomicU64::new(0)),
            state: ReentrantMutex::new(RefCell::new(ControlState::default())),
            _event: PhantomData,
        }
    }

    /// Открывает канал сигналов, подключает data-сокет и запускает поток
    /// приёма. На уже запущенном subscriber'е ничего не делает.
    ///
    /// При любой ошибке настройки выполняется полная остановка.
    pub fn start(&self) -> BusResult<()> {
        let Some(context) = self.context.as_ref() else {
            error!(address = %self.address(), "Subscriber has no transport context");
            return Err(EndpointError::NoContext.into());
        };
        if is_receiver_thread(&self.id) {
            return Ok(());
        }

        let guard = self.state.lock();
        {
            let state = guard.borrow();
            if state.worker.is_some() && self.running.load(Ordering::Acquire) {
                return Ok(());
            }
        }

        // Поток приёма мог завершиться сам после ошибки приёма.
        if guard.borrow().worker.is_some() {
            debug!(subscriber = %self.id, "Reclaiming finished receive thread");
            self.teardown(&mut guard.borrow_mut());
        }

        let launched = self.launch(context, &mut guard.borrow_mut());
        match launched {
            Ok(()) => {
                info!(subscriber = %self.id, address = %self.address(), "Subscriber started");
                Ok(())
            }
            Err(e) => {
                error!(subscriber = %self.id, address = %self.address(), error = %e, "Subscriber start failed");
                self.teardown(&mut guard.borrow_mut());
                Err(e.context("start subscriber"))
            }
        }
    }

    fn launch(
        &self,
        context: &zmq::Context,
        state: &mut ControlState,
    ) -> BusResult<()> {
        let reply_timeout_ms = self.command_timeout.as_millis().min(i32::MAX as u128) as i32;
        // Новый адрес на каждый запуск: libzmq освобождает inproc-адрес
        // закрытого сокета асинхронно.
        let channel_id = Uuid::new_v4();
        let SignalPair { server, client, .. } = context!(
            signal::open(context, &channel_id, reply_timeout_ms),
            "open signal channel {channel_id}"
        )?;
        // Сохраняем сразу, чтобы teardown освободил сокет при ошибке ниже.
        state.signal = Some(server);

        let address = self.address();
        let data = context
            .socket(zmq::SUB)
            .map_err(|source| TransportError::Socket { kind: "SUB", source })?;
        data.set_linger(0)
            .map_err(|source| TransportError::SocketOption {
                option: "ZMQ_LINGER",
                source,
            })?;
        data.connect(&address)
            .map_err(|source| TransportError::Connect { address, source })?;

        let receiver = Receiver {
            id: self.id,
            handler: Arc::clone(&self.handler),
            running: Arc::clone(&self.running),
            settled: Arc::clone(&self.settled),
            pending: Arc::clone(&self.pending),
            _event: PhantomData::<fn() -> E>,
        };
        let sockets = ReceiverSockets { data, signal: client };

        self.running.store(true, Ordering::Release);
        let spawned = thread::Builder::new()
            .name(format!("topicbus-sub-{}", self.port))
            .spawn(move || receiver.run(sockets));
        match spawned {
            Ok(worker) => {
                state.worker = Some(worker);
                Ok(())
            }
            Err(e) => {
                self.running.store(false, Ordering::Release);
                Err(StackError::from(e).context("spawn receive thread"))
            }
        }
    }
}

impl<E, F, G> Subscriber<E, Callbacks<E, F, G>>
where
    E: Event,
    F: Fn(E) + Send + Sync + 'static,
    G: Fn(&str, E) + Send + Sync + 'static,
{
    /// Subscriber с двумя callback'ами: для событий без топика и для
    /// событий с топиком.
    pub fn with_callbacks(
        ctx: &TransportContext,
        ip: impl Into<String>,
        port: u16,
        on_event: F,
        on_topic_event: G,
    ) -> Self {
        Self::new(ctx, ip, port, Callbacks::new(on_event, on_topic_event))
    }
}

////////////////////////////////////////////////////////////////////////////////
// Фильтры, остановка и доступ к полям
////////////////////////////////////////////////////////////////////////////////

impl<E, H> Subscriber<E, H> {
    /// Подписка на все сообщения (пустой фильтр).
    pub fn subscribe_all(&self) -> BusResult<()> {
        self.send_filter(FilterCommand::Subscribe(Vec::new()))
    }

    /// Подписка на топик. Недопустимый топик возвращает `InvalidTopic` и
    /// ничего не регистрирует.
    pub fn subscribe(
        &self,
        topic: &str,
    ) -> BusResult<()> {
        let topic = Topic::parse(topic)?;
        self.send_filter(FilterCommand::Subscribe(topic.as_bytes().to_vec()))
            .with_context(|| format!("subscribe to '{topic}'"))
    }

    /// Подписка на топики по порядку. Первая ошибка прерывает список, уже
    /// оформленные подписки остаются.
    pub fn subscribe_topics<T: AsRef<str>>(
        &self,
        topics: &[T],
    ) -> BusResult<()> {
        self.for_each_topic(topics, Self::subscribe)
    }

    pub fn unsubscribe_all(&self) -> BusResult<()> {
        self.send_filter(FilterCommand::Unsubscribe(Vec::new()))
    }

    /// Снимает фильтр канонического топика.
    pub fn unsubscribe(
        &self,
        topic: &str,
    ) -> BusResult<()> {
        let topic = Topic::parse(topic)?;
        self.send_filter(FilterCommand::Unsubscribe(topic.as_bytes().to_vec()))
            .with_context(|| format!("unsubscribe from '{topic}'"))
    }

    pub fn unsubscribe_topics<T: AsRef<str>>(
        &self,
        topics: &[T],
    ) -> BusResult<()> {
        self.for_each_topic(topics, Self::unsubscribe)
    }

    fn for_each_topic<T: AsRef<str>>(
        &self,
        topics: &[T],
        op: fn(&Self, &str) -> BusResult<()>,
    ) -> BusResult<()> {
        ensure!(!topics.is_empty(), TopicError::EmptyList);

        // Весь список применяется под одной блокировкой. Callback на потоке
        // приёма блокировку не берёт: его команды ставятся в очередь.
        let _guard = (!is_receiver_thread(&self.id)).then(|| self.state.lock());
        for (index, topic) in topics.iter().enumerate() {
            op(self, topic.as_ref()).with_context(|| format!("topic #{index} of {}", topics.len()))?;
        }
        Ok(())
    }

    /// Передаёт команду потоку приёма и ждёт подтверждения.
    ///
    /// Если поток приёма не взял команду за `command_timeout` (занят
    /// callback'ом), команда отменяется и возвращается `CommandTimeout`:
    /// поток приёма её пропустит. Взятую команду ждём до ответа.
    fn send_filter(
        &self,
        command: FilterCommand,
    ) -> BusResult<()> {
        if is_receiver_thread(&self.id) {
            debug!(subscriber = %self.id, ?command, "Queueing filter command from callback");
            self.pending.lock().push(command);
            return Ok(());
        }

        let guard = self.state.lock();
        let mut state = guard.borrow_mut();
        ensure!(state.signal.is_some(), EndpointError::NotStarted { endpoint: ENDPOINT });
        ensure!(self.running.load(Ordering::Acquire), EndpointError::ReceiverStopped);

        state.next_seq = state.next_seq.wrapping_add(1);
        let seq = state.next_seq;
        let Some(server) = state.signal.as_ref() else {
            return Err(EndpointError::NotStarted { endpoint: ENDPOINT }.into());
        };

        let option = option_name(&command);
        let frame = Signal::Command { seq, command }.encode();
        server
            .send(&frame[..], zmq::DONTWAIT)
            .map_err(TransportError::Send)?;

        let mut receiver_gone = false;
        loop {
            match server.recv_bytes(0) {
                Ok(reply) => match Ack::decode(&reply) {
                    Ok(ack) if ack.seq == seq => {
                        return ack
                            .result()
                            .map_err(|source| TransportError::SocketOption { option, source }.into());
                    }
                    Ok(ack) => debug!(subscriber = %self.id, seq = ack.seq, "Discarding stale acknowledgement"),
                    Err(e) => warn!(subscriber = %self.id, len = e.0, "Discarding malformed acknowledgement"),
                },
                Err(zmq::Error::EAGAIN) => {
                    if self.settled.fetch_max(seq, Ordering::AcqRel) < seq {
                        warn!(subscriber = %self.id, seq, "Filter command not picked up in time, cancelled");
                        return Err(EndpointError::CommandTimeout(self.command_timeout).into());
                    }
                    // Поток приёма уже применяет команду. Ответ отправляется
                    // до выхода из цикла, так что после остановки потока
                    // достаточно ещё одного ожидания.
                    ensure!(!receiver_gone, EndpointError::ReceiverStopped);
                    receiver_gone = !self.running.load(Ordering::Acquire);
                    debug!(subscriber = %self.id, seq, "Filter command taken, waiting for acknowledgement");
                }
                Err(e) => return Err(TransportError::Recv(e).into()),
            }
        }
    }

    /// Останавливает поток приёма и освобождает сокеты.
    ///
    /// Ошибки при закрытии только логируются. Вызов из callback'а
    /// возвращает `EndpointError::ReentrantStop`: поток не может дождаться
    /// сам себя.
    pub fn stop(&self) -> BusResult<()> {
        if is_receiver_thread(&self.id) {
            return Err(EndpointError::ReentrantStop.into());
        }

        let guard = self.state.lock();
        let mut state = guard.borrow_mut();
        if state.signal.is_none() && state.worker.is_none() {
            return Ok(());
        }
        self.teardown(&mut state);
        info!(subscriber = %self.id, address = %self.address(), "Subscriber stopped");
        Ok(())
    }

    fn teardown(
        &self,
        state: &mut ControlState,
    ) {
        if let (Some(server), Some(_)) = (state.signal.as_ref(), state.worker.as_ref()) {
            if let Err(e) = server.send(SHUTDOWN_TOKEN, zmq::DONTWAIT) {
                warn!(subscriber = %self.id, error = %e, "Failed to deliver shutdown signal");
            }
        }

        let sockets = match state.worker.take() {
            Some(worker) => match worker.join() {
                Ok(sockets) => Some(sockets),
                Err(_) => {
                    error!(subscriber = %self.id, "Receive thread panicked");
                    None
                }
            },
            None => None,
        };

        // Порядок освобождения: клиент сигналов, сервер сигналов, data.
        match sockets {
            Some(ReceiverSockets { data, signal }) => {
                drop(signal);
                drop(state.signal.take());
                drop(data);
            }
            None => drop(state.signal.take()),
        }

        self.running.store(false, Ordering::Release);
        self.pending.lock().clear();
    }

    pub fn ip(&self) -> &str {
        &self.ip
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Subscriber по имени сервиса не поддерживается.
    pub fn service_name(&self) -> Option<&str> {
        None
    }

    pub fn address(&self) -> String {
        format!("tcp://{}:{}", self.ip, self.port)
    }

    /// Работает ли поток приёма.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }
}

fn option_name(command: &FilterCommand) -> &'static str {
    match command {
        FilterCommand::Subscribe(_) => "ZMQ_SUBSCRIBE",
        FilterCommand::Unsubscribe(_) => "ZMQ_UNSUBSCRIBE",
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов для Subscriber
////////////////////////////////////////////////////////////////////////////////

impl<E, H> Drop for Subscriber<E, H> {
    fn drop(&mut self) {
        if is_receiver_thread(&self.id) {
            // Последняя ссылка освобождена внутри callback'а: поток приёма
            // выйдет из цикла сам после его возврата.
            self.running.store(false, Ordering::Release);
            return;
        }
        if let Err(e) = self.stop().with_context(|| format!("drop subscriber {}", self.id)) {
            crate::error::report(&e, "Failed to stop subscriber on drop");
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
