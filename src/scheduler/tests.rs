use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::*;
use crate::fetch::{CurrentConditions, FetchError};
use crate::queue::PublishError;

#[derive(Clone, Default)]
struct ScriptedSource {
    inner: Arc<SourceState>,
}

#[derive(Default)]
struct SourceState {
    outcomes: Mutex<VecDeque<Result<CurrentConditions, FetchError>>>,
    calls: AtomicUsize,
}

impl ScriptedSource {
    /// Outcomes are consumed in order; once the script runs out, every
    /// further fetch succeeds with default conditions.
    fn with_outcomes(outcomes: Vec<Result<CurrentConditions, FetchError>>) -> Self {
        Self {
            inner: Arc::new(SourceState {
                outcomes: Mutex::new(outcomes.into()),
                calls: AtomicUsize::new(0),
            }),
        }
    }

    fn calls(&self) -> usize {
        self.inner.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WeatherSource for ScriptedSource {
    async fn fetch_current(&self) -> Result<CurrentConditions, FetchError> {
        self.inner.calls.fetch_add(1, Ordering::SeqCst);
        self.inner
            .outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(CurrentConditions::default()))
    }
}

#[derive(Clone, Default)]
struct RecordingSink {
    inner: Arc<SinkState>,
}

#[derive(Default)]
struct SinkState {
    published: Mutex<Vec<Observation>>,
    fail: AtomicBool,
}

impl RecordingSink {
    fn failing() -> Self {
        let sink = Self::default();
        sink.inner.fail.store(true, Ordering::SeqCst);
        sink
    }

    fn published(&self) -> Vec<Observation> {
        self.inner.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl ObservationSink for RecordingSink {
    async fn publish(&self, observation: &Observation) -> Result<(), PublishError> {
        if self.inner.fail.load(Ordering::SeqCst) {
            return Err(PublishError::Exhausted {
                attempts: 5,
                last: "connection refused".to_string(),
            });
        }
        self.inner.published.lock().unwrap().push(observation.clone());
        Ok(())
    }
}

fn schedule() -> ScheduleConfig {
    ScheduleConfig {
        interval: Duration::from_secs(60),
        startup_delay: Duration::ZERO,
        cooldown: Duration::from_secs(60),
    }
}

fn site() -> SiteConfig {
    SiteConfig::default()
}

fn server_error() -> FetchError {
    FetchError::Status(reqwest::StatusCode::INTERNAL_SERVER_ERROR)
}

#[tokio::test(start_paused = true)]
async fn test_first_cycle_runs_immediately() {
    let source = ScriptedSource::default();
    let sink = RecordingSink::default();
    let (tx, rx) = watch::channel(false);
    let scheduler = Scheduler::new(schedule(), site(), source.clone(), sink.clone());
    let handle = tokio::spawn(async move { scheduler.run(rx).await });

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(source.calls(), 1);
    assert_eq!(sink.published().len(), 1);

    tx.send(true).unwrap();
    handle.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_cycles_fire_at_the_interval() {
    let source = ScriptedSource::default();
    let sink = RecordingSink::default();
    let (tx, rx) = watch::channel(false);
    let scheduler = Scheduler::new(schedule(), site(), source.clone(), sink.clone());
    let handle = tokio::spawn(async move { scheduler.run(rx).await });

    tokio::time::sleep(Duration::from_secs(61)).await;
    assert_eq!(source.calls(), 2);
    assert_eq!(sink.published().len(), 2);

    tx.send(true).unwrap();
    handle.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_fetch_failure_skips_publish_for_that_tick() {
    let source = ScriptedSource::with_outcomes(vec![Err(server_error())]);
    let sink = RecordingSink::default();
    let (tx, rx) = watch::channel(false);
    let scheduler = Scheduler::new(schedule(), site(), source.clone(), sink.clone());
    let handle = tokio::spawn(async move { scheduler.run(rx).await });

    // Tick 1 fails to fetch: no publish attempt at all
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(source.calls(), 1);
    assert_eq!(sink.published().len(), 0);

    // Loop proceeds to tick 2 at the next scheduled interval
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(source.calls(), 2);
    assert_eq!(sink.published().len(), 1);

    tx.send(true).unwrap();
    handle.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_publish_failure_does_not_stop_the_loop() {
    let source = ScriptedSource::default();
    let sink = RecordingSink::failing();
    let (tx, rx) = watch::channel(false);
    let scheduler = Scheduler::new(schedule(), site(), source.clone(), sink.clone());
    let handle = tokio::spawn(async move { scheduler.run(rx).await });

    tokio::time::sleep(Duration::from_secs(61)).await;
    assert_eq!(source.calls(), 2);
    assert_eq!(sink.published().len(), 0);
    assert!(!handle.is_finished());

    tx.send(true).unwrap();
    handle.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_between_ticks_exits_cleanly() {
    let source = ScriptedSource::default();
    let sink = RecordingSink::default();
    let (tx, rx) = watch::channel(false);
    let scheduler = Scheduler::new(schedule(), site(), source.clone(), sink.clone());
    let handle = tokio::spawn(async move { scheduler.run(rx).await });

    tokio::time::sleep(Duration::from_millis(10)).await;
    tx.send(true).unwrap();
    handle.await.unwrap().unwrap();

    // No new cycle started after cancellation
    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(source.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_startup_delay_postpones_first_cycle() {
    let source = ScriptedSource::default();
    let sink = RecordingSink::default();
    let (tx, rx) = watch::channel(false);
    let scheduler = Scheduler::new(
        ScheduleConfig {
            startup_delay: Duration::from_secs(30),
            ..schedule()
        },
        site(),
        source.clone(),
        sink.clone(),
    );
    let handle = tokio::spawn(async move { scheduler.run(rx).await });

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(source.calls(), 0);

    tokio::time::sleep(Duration::from_secs(26)).await;
    assert_eq!(source.calls(), 1);

    tx.send(true).unwrap();
    handle.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_during_startup_delay_skips_the_cycle() {
    let source = ScriptedSource::default();
    let sink = RecordingSink::default();
    let (tx, rx) = watch::channel(false);
    let scheduler = Scheduler::new(
        ScheduleConfig {
            startup_delay: Duration::from_secs(30),
            ..schedule()
        },
        site(),
        source.clone(),
        sink.clone(),
    );
    let handle = tokio::spawn(async move { scheduler.run(rx).await });

    tokio::time::sleep(Duration::from_secs(5)).await;
    tx.send(true).unwrap();
    handle.await.unwrap().unwrap();

    assert_eq!(source.calls(), 0);
    assert_eq!(sink.published().len(), 0);
}
