use rolling_appender::appender::{AppenderBuilder, AsyncRollingAppender, LogErrorHandler};
use rolling_appender::buffer::{Admission, interrupt};
use rolling_appender::dispatcher::DispatcherState;
use rolling_appender::domain::{LogEvent, LogLevel};
use rolling_appender::rotation::TriggeringPolicy;
use std::fs;
use std::path::Path;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;

/// Blocks the dispatcher inside its first write until released.
struct GatePolicy {
    entered: Sender<()>,
    release: Receiver<()>,
    armed: bool,
}

impl TriggeringPolicy for GatePolicy {
    fn should_rollover(&mut self, _: &Path, _: u64, _: &LogEvent) -> bool {
        if self.armed {
            self.armed = false;
            let _ = self.entered.send(());
            let _ = self.release.recv();
        }
        false
    }
}

struct Gate {
    entered: Receiver<()>,
    release: Sender<()>,
}

fn gate() -> (GatePolicy, Gate) {
    let (entered_tx, entered_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel();
    (
        GatePolicy {
            entered: entered_tx,
            release: release_rx,
            armed: true,
        },
        Gate {
            entered: entered_rx,
            release: release_tx,
        },
    )
}

fn messages(path: &Path) -> Vec<String> {
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|line| line.split_once(" - ").unwrap().1.to_string())
        .collect()
}

fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        thread::sleep(Duration::from_millis(5));
    }
}

/// Appender whose dispatcher is parked inside the write of "e0".
fn stalled_appender(path: &Path, blocking: bool) -> (AsyncRollingAppender, Gate) {
    let (policy, gate) = gate();
    let appender = AppenderBuilder::new(path)
        .buffer_capacity(1)
        .blocking(blocking)
        .triggering_policy(policy)
        .build()
        .unwrap();
    appender.submit(LogEvent::new(LogLevel::Info, "gate", "e0"));
    gate.entered.recv_timeout(Duration::from_secs(5)).unwrap();
    (appender, gate)
}

#[test]
fn test_each_producer_keeps_its_order() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("app.log");
    let appender = AppenderBuilder::new(&path).buffer_capacity(8).build().unwrap();

    let producers: Vec<_> = (0..4)
        .map(|p| {
            let appender = appender.clone();
            thread::spawn(move || {
                for i in 0..100 {
                    appender.submit(LogEvent::new(LogLevel::Info, format!("p{p}"), format!("p{p}-{i}")));
                }
            })
        })
        .collect();
    for producer in producers {
        producer.join().unwrap();
    }
    appender.close();

    let lines = messages(&path);
    assert_eq!(lines.len(), 400);
    for p in 0..4 {
        let prefix = format!("p{p}-");
        let seen: Vec<usize> = lines
            .iter()
            .filter_map(|m| m.strip_prefix(&prefix))
            .map(|i| i.parse().unwrap())
            .collect();
        assert_eq!(seen, (0..100).collect::<Vec<_>>());
    }
    assert_eq!(appender.metrics().discarded, 0);
}

#[test]
fn test_full_queue_discards_into_summary() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("app.log");
    let (appender, gate) = stalled_appender(&path, false);

    assert!(matches!(
        appender.try_submit(LogEvent::new(LogLevel::Info, "svc", "e1")),
        Admission::Enqueued
    ));
    assert!(matches!(
        appender.try_submit(LogEvent::new(LogLevel::Warn, "svc", "e2")),
        Admission::Discarded
    ));
    appender.submit(LogEvent::new(LogLevel::Info, "svc", "e3"));

    gate.release.send(()).unwrap();
    appender.close();

    assert_eq!(
        messages(&path),
        vec![
            "e0".to_string(),
            "e1".to_string(),
            "Discarded 2 messages due to full event buffer including: e2".to_string(),
        ]
    );
    let metrics = appender.metrics();
    assert_eq!(metrics.discarded, 2);
    assert_eq!(metrics.events_written, 3);
}

#[test]
fn test_blocking_producer_waits_for_space() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("app.log");
    let (appender, gate) = stalled_appender(&path, true);
    appender.submit(LogEvent::new(LogLevel::Info, "svc", "e1"));

    let producer = {
        let appender = appender.clone();
        thread::spawn(move || appender.submit(LogEvent::new(LogLevel::Info, "svc", "e2")))
    };
    wait_until(|| appender.metrics().blocked_waits >= 1);
    assert!(!producer.is_finished());

    gate.release.send(()).unwrap();
    producer.join().unwrap();
    appender.close();

    assert_eq!(messages(&path), vec!["e0", "e1", "e2"]);
    assert_eq!(appender.metrics().discarded, 0);
}

#[test]
fn test_interrupted_producer_discards_and_keeps_flag() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("app.log");
    let (appender, gate) = stalled_appender(&path, true);
    appender.submit(LogEvent::new(LogLevel::Info, "svc", "e1"));

    let (handle_tx, handle_rx) = mpsc::channel();
    let producer = {
        let appender = appender.clone();
        thread::spawn(move || {
            handle_tx.send(interrupt::current()).unwrap();
            appender.submit(LogEvent::new(LogLevel::Error, "late", "e2"));
            interrupt::is_interrupted()
        })
    };
    let handle = handle_rx.recv().unwrap();
    wait_until(|| appender.metrics().blocked_waits >= 1);

    handle.interrupt();
    assert!(producer.join().unwrap());

    gate.release.send(()).unwrap();
    appender.close();

    assert_eq!(
        messages(&path),
        vec![
            "e0".to_string(),
            "e1".to_string(),
            "Discarded 1 messages due to full event buffer including: e2".to_string(),
        ]
    );
}

#[test]
fn test_close_drains_everything_admitted() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("app.log");
    let appender = AppenderBuilder::new(&path).buffer_capacity(1000).build().unwrap();

    for i in 0..500 {
        appender.submit(LogEvent::new(LogLevel::Debug, "drain", format!("{i}")));
    }
    appender.close();

    assert_eq!(messages(&path).len(), 500);
    assert_eq!(appender.queue_len(), 0);
}

/// Submits from inside the dispatcher's write path on its first call.
struct ReentrantPolicy {
    appender: Arc<Mutex<Option<AsyncRollingAppender>>>,
}

impl TriggeringPolicy for ReentrantPolicy {
    fn should_rollover(&mut self, _: &Path, _: u64, _: &LogEvent) -> bool {
        let taken = self.appender.lock().unwrap().take();
        if let Some(appender) = taken {
            for i in 1..=3 {
                appender.submit(LogEvent::new(LogLevel::Info, "inner", format!("r{i}")));
            }
        }
        false
    }
}

#[test]
fn test_dispatcher_submitting_to_full_queue_does_not_deadlock() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("app.log");
    let slot = Arc::new(Mutex::new(None));
    let appender = AppenderBuilder::new(&path)
        .buffer_capacity(1)
        .blocking(true)
        .triggering_policy(ReentrantPolicy {
            appender: Arc::clone(&slot),
        })
        .build()
        .unwrap();
    *slot.lock().unwrap() = Some(appender.clone());

    appender.submit(LogEvent::new(LogLevel::Info, "outer", "e0"));
    wait_until(|| slot.lock().unwrap().is_none());
    appender.close();

    assert_eq!(
        messages(&path),
        vec![
            "e0".to_string(),
            "r1".to_string(),
            "Discarded 2 messages due to full event buffer including: r2".to_string(),
        ]
    );
}

/// Panics inside the dispatcher's first write once released.
struct PanickingPolicy {
    gate: GatePolicy,
}

impl TriggeringPolicy for PanickingPolicy {
    fn should_rollover(&mut self, path: &Path, bytes: u64, event: &LogEvent) -> bool {
        if self.gate.armed {
            self.gate.should_rollover(path, bytes, event);
            panic!("policy failure");
        }
        false
    }
}

#[test]
fn test_dispatcher_panic_writes_queued_events_in_order() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("app.log");
    let (policy, gate) = gate();
    let appender = AppenderBuilder::new(&path)
        .buffer_capacity(8)
        .triggering_policy(PanickingPolicy { gate: policy })
        .build()
        .unwrap();

    appender.submit(LogEvent::new(LogLevel::Info, "panic", "lost"));
    gate.entered.recv_timeout(Duration::from_secs(5)).unwrap();
    for i in 0..3 {
        appender.submit(LogEvent::new(LogLevel::Info, "panic", format!("queued-{i}")));
    }
    gate.release.send(()).unwrap();

    wait_until(|| appender.dispatcher_state() == DispatcherState::Stopped);
    appender.submit(LogEvent::new(LogLevel::Info, "panic", "after-panic"));
    appender.close();

    assert_eq!(
        messages(&path),
        vec!["queued-0", "queued-1", "queued-2", "after-panic"]
    );
    assert_eq!(appender.queue_len(), 0);
}

#[cfg(target_os = "linux")]
#[test]
fn test_write_failure_closes_appender_by_default() {
    let appender = AppenderBuilder::new("/dev/full").build().unwrap();

    appender.submit(LogEvent::new(LogLevel::Info, "full", "no space"));
    wait_until(|| appender.is_closed());

    // Either bypassed or drained by the exiting dispatcher; dropped both ways
    appender.submit(LogEvent::new(LogLevel::Info, "full", "after close"));
    wait_until(|| appender.metrics().dropped_after_close == 1);
    assert_eq!(appender.metrics().write_errors, 1);
}

#[cfg(target_os = "linux")]
#[test]
fn test_log_error_handler_keeps_appender_open() {
    let handler = Arc::new(LogErrorHandler::new());
    let appender = AppenderBuilder::new("/dev/full")
        .buffer_capacity(0)
        .error_handler(handler.clone())
        .build()
        .unwrap();

    appender.submit(LogEvent::new(LogLevel::Info, "full", "one"));
    appender.submit(LogEvent::new(LogLevel::Info, "full", "two"));

    assert!(!appender.is_closed());
    assert!(handler.has_reported());
    assert_eq!(appender.metrics().write_errors, 2);
    appender.close();
}
