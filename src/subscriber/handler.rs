use std::{fmt, marker::PhantomData};

/// Получатель событий subscriber'а.
///
/// Методы вызываются на потоке приёма. Сообщение из одного фрейма уходит в
/// `on_event`, сообщение из двух фреймов (топик + полезная нагрузка) в
/// `on_topic_event`.
pub trait EventHandler<E>: Send + Sync + 'static {
    fn on_event(
        &self,
        event: E,
    );

    fn on_topic_event(
        &self,
        topic: &str,
        event: E,
    );
}

/// Обработчик из двух замыканий.
pub struct Callbacks<E, F, G> {
    on_event: F,
    on_topic_event: G,
    _event: PhantomData<fn(E)>,
}

impl<E, F, G> Callbacks<E, F, G>
where
    F: Fn(E) + Send + Sync + 'static,
    G: Fn(&str, E) + Send + Sync + 'static,
{
    pub fn new(
        on_event: F,
        on_topic_event: G,
    ) -> Self {
        Self {
            on_event,
            on_topic_event,
            _event: PhantomData,
        }
    }
}

impl<E, F, G> EventHandler<E> for Callbacks<E, F, G>
where
    E: 'static,
    F: Fn(E) + Send + Sync + 'static,
    G: Fn(&str, E) + Send + Sync + 'static,
{
    fn on_event(
        &self,
        event: E,
    ) {
        (self.on_event)(event)
    }

    fn on_topic_event(
        &self,
        topic: &str,
        event: E,
    ) {
        (self.on_topic_event)(topic, event)
    }
}

impl<E, F, G> fmt::Debug for Callbacks<E, F, G> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("Callbacks").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;

    use super::*;

    #[test]
    fn test_callbacks_dispatch() {
        let (tx, rx) = mpsc::channel();
        let tx_topic = tx.clone();
        let handler = Callbacks::new(
            move |event: String| tx.send((None, event)).unwrap(),
            move |topic: &str, event: String| tx_topic.send((Some(topic.to_string()), event)).unwrap(),
        );

        handler.on_event("plain".to_string());
        handler.on_topic_event("home/", "tagged".to_string());

        assert_eq!(rx.recv().unwrap(), (None, "plain".to_string()));
        assert_eq!(
            rx.recv().unwrap(),
            (Some("home/".to_string()), "tagged".to_string())
        );
    }
}
