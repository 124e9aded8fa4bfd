use chrono::{Duration as ChronoDuration, Utc};
use flate2::read::GzDecoder;
use mockall::mock;
use rolling_appender::appender::AppenderBuilder;
use rolling_appender::domain::{LogEvent, LogLevel};
use rolling_appender::rotation::{
    CompositeTriggeringPolicy, FixedWindowRollingStrategy, RolloverDescription, RolloverError,
    RolloverStrategy, RotationInterval, SizeBasedTriggeringPolicy, TimeBasedTriggeringPolicy,
    TimestampRollingStrategy, TriggeringPolicy,
};
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;

mock! {
    pub Strategy {}

    impl RolloverStrategy for Strategy {
        fn initialize(
            &mut self,
            configured_file: &Path,
            append: bool,
        ) -> Result<Option<RolloverDescription>, RolloverError>;

        fn plan_rollover(
            &mut self,
            active_file: &Path,
            append: bool,
        ) -> Result<Option<RolloverDescription>, RolloverError>;
    }
}

mock! {
    pub Policy {}

    impl TriggeringPolicy for Policy {
        fn should_rollover(&mut self, active_file: &Path, bytes_written: u64, event: &LogEvent) -> bool;
    }
}

fn event(message: &str) -> LogEvent {
    LogEvent::new(LogLevel::Info, "rotation", message)
}

fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        thread::sleep(Duration::from_millis(10));
    }
}

fn family(dir: &Path, prefix: &str) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .filter(|p| p.file_name().unwrap().to_string_lossy().starts_with(prefix))
        .collect();
    files.sort();
    files
}

#[test]
fn test_fixed_window_keeps_newest_files() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("app.log");
    let appender = AppenderBuilder::new(&path)
        .buffer_capacity(0)
        .triggering_policy(SizeBasedTriggeringPolicy::new(1))
        .rollover_strategy(FixedWindowRollingStrategy::numbered(&path, 2).unwrap())
        .build()
        .unwrap();

    for i in 0..5 {
        appender.submit(event(&format!("line-{i}")));
    }
    appender.close();

    let read = |p: PathBuf| fs::read_to_string(p).unwrap();
    assert!(read(path.clone()).contains("line-4"));
    assert!(read(dir.path().join("app.log.1")).contains("line-3"));
    assert!(read(dir.path().join("app.log.2")).contains("line-2"));
    assert!(!dir.path().join("app.log.3").exists());
    assert_eq!(appender.metrics().rollovers, 4);
}

#[test]
fn test_gz_pattern_compresses_rotated_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("app.log");
    let pattern = format!("{}/app.%i.log.gz", dir.path().display());
    let appender = AppenderBuilder::new(&path)
        .buffer_capacity(0)
        .rollover_strategy(FixedWindowRollingStrategy::new(pattern, 1, 3).unwrap())
        .build()
        .unwrap();

    appender.submit(event("compressed"));
    assert!(appender.rollover().unwrap());

    let archive = dir.path().join("app.1.log.gz");
    let staging = dir.path().join("app.1.log");
    wait_until(|| archive.exists() && !staging.exists());
    appender.close();

    assert!(gunzip(&archive).contains("compressed"));
}

fn gunzip(path: &Path) -> String {
    let mut content = String::new();
    GzDecoder::new(File::open(path).unwrap())
        .read_to_string(&mut content)
        .unwrap();
    content
}

#[test]
fn test_back_to_back_gz_rollovers_keep_both_generations() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("app.log");
    let pattern = format!("{}/app.%i.log.gz", dir.path().display());
    let appender = AppenderBuilder::new(&path)
        .buffer_capacity(0)
        .rollover_strategy(FixedWindowRollingStrategy::new(pattern, 1, 3).unwrap())
        .build()
        .unwrap();

    // Large enough that the first compression is still running at the second rollover
    let filler = "a".repeat(1024);
    for _ in 0..20_000 {
        appender.submit(event(&filler));
    }
    appender.submit(event("GEN-A"));
    assert!(appender.rollover().unwrap());

    appender.submit(event("GEN-B"));
    assert!(appender.rollover().unwrap());

    let newest = dir.path().join("app.1.log.gz");
    let staging = dir.path().join("app.1.log");
    wait_until(|| newest.exists() && !staging.exists());
    appender.close();

    let older = gunzip(&dir.path().join("app.2.log.gz"));
    assert!(older.contains("GEN-A"));
    assert_eq!(older.lines().count(), 20_001);
    let newer = gunzip(&newest);
    assert!(newer.contains("GEN-B"));
    assert!(!newer.contains("GEN-A"));
}

#[test]
fn test_timestamp_strategy_applies_retention_quota() {
    let dir = TempDir::new().unwrap();
    let base = dir.path().join("svc.log");
    let appender = AppenderBuilder::new(&base)
        .buffer_capacity(0)
        .rollover_strategy(TimestampRollingStrategy::new().with_retention(300))
        .build()
        .unwrap();

    let first = appender.active_file();
    assert_ne!(first, base);
    assert!(first.file_name().unwrap().to_string_lossy().starts_with("svc_"));

    let filler = "x".repeat(150);
    for _ in 0..3 {
        appender.submit(event(&filler));
        assert!(appender.rollover().unwrap());
    }
    let active = appender.active_file();

    // Three rotated files of ~200 bytes each do not fit in 300 bytes
    wait_until(|| family(dir.path(), "svc_").len() <= 2);
    appender.close();

    let remaining = family(dir.path(), "svc_");
    assert!(remaining.contains(&active));
    assert!(!remaining.contains(&first));
}

#[test]
fn test_time_trigger_rolls_on_later_interval() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("app.log");
    let appender = AppenderBuilder::new(&path)
        .buffer_capacity(0)
        .triggering_policy(
            CompositeTriggeringPolicy::new()
                .with(SizeBasedTriggeringPolicy::default())
                .with(TimeBasedTriggeringPolicy::new(RotationInterval::Hour)),
        )
        .rollover_strategy(FixedWindowRollingStrategy::numbered(&path, 3).unwrap())
        .build()
        .unwrap();

    appender.submit(event("this hour"));
    appender.submit(event("next hour").with_timestamp(Utc::now() + ChronoDuration::hours(2)));
    appender.close();

    assert!(fs::read_to_string(dir.path().join("app.log.1")).unwrap().contains("this hour"));
    assert!(fs::read_to_string(&path).unwrap().contains("next hour"));
}

#[test]
fn test_strategy_failure_keeps_writing_to_current_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("app.log");

    let mut strategy = MockStrategy::new();
    strategy.expect_initialize().returning(|_, _| Ok(None));
    strategy
        .expect_plan_rollover()
        .times(2)
        .returning(|_, _| Err(RolloverError::InvalidPattern("broken".to_string())));

    let mut policy = MockPolicy::new();
    let mut calls = 0;
    policy.expect_should_rollover().returning(move |_, _, _| {
        calls += 1;
        calls > 1
    });

    let appender = AppenderBuilder::new(&path)
        .buffer_capacity(0)
        .triggering_policy(policy)
        .rollover_strategy(strategy)
        .build()
        .unwrap();

    for i in 0..3 {
        appender.submit(event(&format!("kept-{i}")));
    }

    assert!(!appender.is_closed());
    assert_eq!(appender.metrics().rollovers, 0);
    appender.close();
    assert_eq!(fs::read_to_string(&path).unwrap().lines().count(), 3);
}

#[test]
fn test_strategy_may_pick_initial_file() {
    let dir = TempDir::new().unwrap();
    let configured = dir.path().join("app.log");
    let chosen = dir.path().join("chosen.log");

    let mut strategy = MockStrategy::new();
    let target = chosen.clone();
    strategy
        .expect_initialize()
        .times(1)
        .returning(move |_, _| Ok(Some(RolloverDescription::new(target.clone(), false))));

    let appender = AppenderBuilder::new(&configured)
        .buffer_capacity(0)
        .rollover_strategy(strategy)
        .build()
        .unwrap();
    appender.submit(event("redirected"));
    appender.close();

    assert_eq!(appender.active_file(), chosen);
    assert!(!configured.exists());
    assert!(fs::read_to_string(&chosen).unwrap().contains("redirected"));
}
