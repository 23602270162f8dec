use std::{
    sync::mpsc,
    time::{Duration, Instant},
};

use serial_test::serial;

use topicbus::{
    ContextStatus, EndpointError, Publisher, Settings, StatusCode, Subscriber, TransportContext,
};

fn context() -> TransportContext {
    let ctx = TransportContext::new();
    ctx.initialize().expect("transport context");
    ctx
}

fn silent_subscriber(
    ctx: &TransportContext,
    port: u16,
) -> Subscriber<String, topicbus::Callbacks<String, fn(String), fn(&str, String)>> {
    fn ignore(_: String) {}
    fn ignore_topic(
        _: &str,
        _: String,
    ) {
    }
    Subscriber::with_callbacks(ctx, "localhost", port, ignore as fn(String), ignore_topic as fn(&str, String))
}

#[test]
#[serial]
fn test_publisher_start_stop_cycles() {
    let ctx = context();
    let publisher = Publisher::new(&ctx, 5820);

    for cycle in 0..10 {
        assert!(publisher.start().is_ok(), "start #{cycle}");
        assert!(publisher.is_started());

        let started = Instant::now();
        assert!(publisher.stop().is_ok(), "stop #{cycle}");
        assert!(started.elapsed() < Duration::from_secs(3));
        assert!(!publisher.is_started());
    }
    assert_eq!(StatusCode::of(&publisher.stop()), StatusCode::Error);
}

#[test]
#[serial]
fn test_subscriber_start_stop_cycles() {
    let ctx = context();
    let subscriber = silent_subscriber(&ctx, 5821);

    for cycle in 0..10 {
        assert!(subscriber.start().is_ok(), "start #{cycle}");
        assert!(subscriber.is_running());
        subscriber.subscribe_all().unwrap();
        assert!(subscriber.stop().is_ok(), "stop #{cycle}");
        assert!(!subscriber.is_running());
    }
}

/// `stop()` будит поток приёма, заблокированный в ожидании без таймаута.
#[test]
#[serial]
fn test_stop_wakes_blocked_receiver() {
    let ctx = context();
    let subscriber = silent_subscriber(&ctx, 5822);
    subscriber.start().unwrap();
    subscriber.subscribe("nothing/ever/arrives").unwrap();

    let (tx, rx) = mpsc::channel();
    let handle = std::thread::spawn(move || {
        let started = Instant::now();
        let result = subscriber.stop();
        let _ = tx.send((result.is_ok(), started.elapsed()));
        subscriber
    });

    let (ok, elapsed) = rx
        .recv_timeout(Duration::from_secs(5))
        .expect("stop must not deadlock");
    assert!(ok);
    assert!(elapsed < Duration::from_secs(2), "stop took {elapsed:?}");
    let subscriber = handle.join().unwrap();
    assert!(!subscriber.is_running());
}

#[test]
#[serial]
fn test_drop_stops_started_endpoints() {
    let ctx = context();
    {
        let publisher = Publisher::new(&ctx, 5823);
        publisher.start().unwrap();
        let subscriber = silent_subscriber(&ctx, 5823);
        subscriber.start().unwrap();
    }

    // Порт снова свободен.
    let publisher = Publisher::new(&ctx, 5823);
    publisher.start().unwrap();
    publisher.stop().unwrap();
}

#[test]
fn test_endpoints_need_initialized_context() {
    let ctx = TransportContext::new();
    assert_eq!(ctx.status(), ContextStatus::Constructed);

    let publisher = Publisher::new(&ctx, 5824);
    let subscriber = silent_subscriber(&ctx, 5824);
    for result in [publisher.start(), subscriber.start()] {
        let err = result.unwrap_err();
        assert!(matches!(err.downcast_ref::<EndpointError>(), Some(EndpointError::NoContext)));
    }

    // Endpoint'ы забирают дескриптор при создании: инициализация после
    // этого их не оживляет.
    ctx.initialize().unwrap();
    assert_eq!(StatusCode::of(&publisher.start()), StatusCode::Error);
}

#[test]
#[serial]
fn test_terminate_keeps_existing_endpoints_working() {
    let ctx = context();
    let publisher = Publisher::new(&ctx, 5825);
    publisher.start().unwrap();

    ctx.terminate();
    assert_eq!(ctx.status(), ContextStatus::Terminated);
    assert!(ctx.handle().is_none());

    assert!(publisher.publish(&"still alive".to_string()).is_ok());
    assert!(publisher.stop().is_ok());

    let late = Publisher::new(&ctx, 5826);
    assert_eq!(StatusCode::of(&late.start()), StatusCode::Error);
}

#[test]
#[serial]
fn test_settings_are_applied() {
    let settings = Settings {
        io_threads: 2,
        close_timeout_ms: 200,
        command_timeout_ms: 500,
        bind_host: "127.0.0.1".to_string(),
    };
    let ctx = TransportContext::with_settings(&settings);
    ctx.initialize().unwrap();

    let publisher = Publisher::with_settings(&ctx, 5827, &settings);
    assert_eq!(publisher.address(), "tcp://127.0.0.1:5827");
    publisher.start().unwrap();

    let started = Instant::now();
    publisher.stop().unwrap();
    assert!(started.elapsed() < Duration::from_secs(1));
}
