// ── Polling coordinator ──
//
// Refreshes every known sensor on a fixed interval and publishes the
// merged result. A sensor that fails to answer keeps its previous value,
// and its timestamp is left alone so `is_stale` can flag it.

use std::collections::{BTreeMap, HashMap};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use arc_swap::ArcSwap;
use async_trait::async_trait;
use futures_util::FutureExt;
use futures_util::future::join_all;
use serde::Serialize;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use viamhub_api::{DataApiClient, Readings};

use crate::config::PollConfig;
use crate::error::CoreError;
use crate::listener::{ListenerId, Listeners, panic_message};
use crate::manager::ConnectionManager;
use crate::model::CapabilityKind;

/// Sensor name → latest readings.
pub type ReadingSet = BTreeMap<String, Readings>;

// ── Reading sources ──────────────────────────────────────────────

/// Where the coordinator gets its data from.
#[async_trait]
pub trait ReadingSource: Send + Sync {
    /// Short name for log output.
    fn label(&self) -> &'static str;

    /// `false` skips the whole cycle.
    async fn ready(&self) -> bool;

    /// Sensors to read this cycle.
    fn sensor_names(&self) -> Vec<String>;

    async fn read(&self, sensor: &str) -> Result<Readings, CoreError>;
}

/// Reads sensors directly from the robot through a [`ConnectionManager`].
pub struct DeviceSource {
    manager: ConnectionManager,
}

impl DeviceSource {
    pub fn new(manager: ConnectionManager) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl ReadingSource for DeviceSource {
    fn label(&self) -> &'static str {
        "device"
    }

    async fn ready(&self) -> bool {
        self.manager.ensure_connection().await
    }

    fn sensor_names(&self) -> Vec<String> {
        self.manager.get_all_sensors().into_keys().collect()
    }

    async fn read(&self, sensor: &str) -> Result<Readings, CoreError> {
        let handle = self
            .manager
            .get_sensor(sensor)
            .ok_or_else(|| CoreError::CapabilityNotFound {
                name: sensor.to_owned(),
                kind: CapabilityKind::Sensor,
            })?;
        Ok(handle.get_readings().await?)
    }
}

/// Reads the newest synced record per sensor from the cloud data API.
pub struct DataApiSource {
    client: Arc<DataApiClient>,
    sensors: Vec<String>,
    hours_back: u32,
}

impl DataApiSource {
    pub fn new(client: Arc<DataApiClient>, sensors: Vec<String>, hours_back: u32) -> Self {
        Self {
            client,
            sensors,
            hours_back,
        }
    }
}

#[async_trait]
impl ReadingSource for DataApiSource {
    fn label(&self) -> &'static str {
        "data-api"
    }

    async fn ready(&self) -> bool {
        self.client.ensure_connection().await
    }

    fn sensor_names(&self) -> Vec<String> {
        self.sensors.clone()
    }

    async fn read(&self, sensor: &str) -> Result<Readings, CoreError> {
        self.client
            .latest_readings(sensor, self.hours_back)
            .await?
            .ok_or_else(|| CoreError::NoData {
                sensor: sensor.to_owned(),
            })
    }
}

// ── RefreshOutcome ───────────────────────────────────────────────

/// Result of one refresh cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RefreshOutcome {
    /// The source was not ready; nothing was read or published.
    Skipped,
    Completed { succeeded: usize, failed: usize },
    /// The cycle panicked; previously published data is untouched.
    Crashed,
    ShutDown,
}

// ── Coordinator ──────────────────────────────────────────────────

/// Cheaply cloneable via `Arc<CoordinatorInner>`.
#[derive(Clone)]
pub struct Coordinator {
    inner: Arc<CoordinatorInner>,
}

struct CoordinatorInner {
    source: Arc<dyn ReadingSource>,
    config: PollConfig,
    readings: ArcSwap<ReadingSet>,
    last_success: ArcSwap<HashMap<String, Instant>>,
    interval: watch::Sender<Duration>,
    cycle: Mutex<()>,
    listeners: Listeners<Arc<ReadingSet>>,
    cancel: CancellationToken,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
    shut_down: AtomicBool,
}

impl Coordinator {
    pub fn new(source: Arc<dyn ReadingSource>, config: PollConfig) -> Result<Self, CoreError> {
        config.validate()?;
        let (interval, _) = watch::channel(config.interval);

        Ok(Self {
            inner: Arc::new(CoordinatorInner {
                source,
                config,
                readings: ArcSwap::from_pointee(ReadingSet::new()),
                last_success: ArcSwap::from_pointee(HashMap::new()),
                interval,
                cycle: Mutex::new(()),
                listeners: Listeners::new("data"),
                cancel: CancellationToken::new(),
                task_handles: Mutex::new(Vec::new()),
                shut_down: AtomicBool::new(false),
            }),
        })
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.shut_down.load(Ordering::Acquire)
    }

    pub fn interval(&self) -> Duration {
        *self.inner.interval.borrow()
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Refresh once, then keep refreshing every `interval`.
    ///
    /// Calling it again on a running coordinator only changes the
    /// interval.
    pub async fn start(&self, interval: Duration) -> Result<RefreshOutcome, CoreError> {
        if self.is_shut_down() {
            return Err(CoreError::ShutDown);
        }
        if interval.is_zero() {
            return Err(CoreError::Configuration {
                field: "poll.interval".into(),
                reason: "must be greater than zero".into(),
            });
        }
        self.inner.interval.send_replace(interval);

        let first = self.refresh_now().await;

        let mut handles = self.inner.task_handles.lock().await;
        if handles.is_empty() {
            let coordinator = self.clone();
            let cancel = self.inner.cancel.clone();
            handles.push(tokio::spawn(poll_task(coordinator, cancel)));
            info!(
                source = self.inner.source.label(),
                interval = ?interval,
                "polling started"
            );
        }
        Ok(first)
    }

    /// Run one cycle now. Waits for any cycle already in progress.
    pub async fn refresh_now(&self) -> RefreshOutcome {
        match AssertUnwindSafe(self.cycle()).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(payload) => {
                error!(
                    source = self.inner.source.label(),
                    panic = %panic_message(payload.as_ref()),
                    "refresh cycle crashed"
                );
                RefreshOutcome::Crashed
            }
        }
    }

    /// Stop the loop, wait for it, and drop all cached data and listeners.
    pub async fn shutdown(&self) {
        if self.inner.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        self.inner.cancel.cancel();

        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }
        drop(handles);

        let _cycle = self.inner.cycle.lock().await;
        self.inner.readings.store(Arc::new(ReadingSet::new()));
        self.inner.last_success.store(Arc::new(HashMap::new()));
        self.inner.listeners.clear();
        debug!(source = self.inner.source.label(), "coordinator shut down");
    }

    async fn cycle(&self) -> RefreshOutcome {
        let _cycle = self.inner.cycle.lock().await;
        if self.is_shut_down() {
            return RefreshOutcome::ShutDown;
        }

        let source = self.inner.source.as_ref();
        if !source.ready().await {
            debug!(source = source.label(), "source not ready; skipping cycle");
            return RefreshOutcome::Skipped;
        }

        let read_timeout = self.inner.config.read_timeout;
        let names = source.sensor_names();
        let results = join_all(names.iter().map(|name| async move {
            let result = tokio::time::timeout(read_timeout, source.read(name)).await;
            (name, result)
        }))
        .await;

        if self.is_shut_down() {
            return RefreshOutcome::ShutDown;
        }

        let now = Instant::now();
        // Sensors that fail or are not listed this cycle keep their
        // previous entry.
        let mut next: ReadingSet = ReadingSet::clone(&self.inner.readings.load());
        let mut stamps = HashMap::clone(&self.inner.last_success.load());
        let mut succeeded = 0;
        let mut failed = 0;

        for (name, result) in results {
            match result {
                Ok(Ok(readings)) => {
                    next.insert(name.clone(), readings);
                    stamps.insert(name.clone(), now);
                    succeeded += 1;
                }
                Ok(Err(e)) => {
                    warn!(sensor = %name, error = %e, "sensor read failed");
                    failed += 1;
                }
                Err(_) => {
                    warn!(sensor = %name, timeout = ?read_timeout, "sensor read timed out");
                    failed += 1;
                }
            }
        }

        let published = Arc::new(next);
        self.inner.readings.store(Arc::clone(&published));
        self.inner.last_success.store(Arc::new(stamps));
        self.inner.listeners.publish(&published);

        debug!(source = source.label(), succeeded, failed, "refresh cycle complete");
        RefreshOutcome::Completed { succeeded, failed }
    }

    // ── Queries ──────────────────────────────────────────────────

    /// `true` once the last successful read of `name` is older than
    /// `stale_multiplier × interval`. A sensor that was never read is
    /// not stale; check [`last_success`](Self::last_success) for that.
    pub fn is_stale(&self, name: &str) -> bool {
        let Some(at) = self.last_success(name) else {
            return false;
        };
        let threshold = self.inner.config.stale_after(self.interval());
        Instant::now().saturating_duration_since(at) > threshold
    }

    pub fn last_success(&self, name: &str) -> Option<Instant> {
        self.inner.last_success.load().get(name).copied()
    }

    /// Time since the last successful read of `name`.
    pub fn age(&self, name: &str) -> Option<Duration> {
        self.last_success(name)
            .map(|at| Instant::now().saturating_duration_since(at))
    }

    pub fn readings(&self) -> Arc<ReadingSet> {
        self.inner.readings.load_full()
    }

    pub fn sensor_readings(&self, name: &str) -> Option<Readings> {
        self.inner.readings.load().get(name).cloned()
    }

    // ── Listeners ────────────────────────────────────────────────

    /// Called once per completed cycle with the newly published set.
    pub fn add_listener<F>(&self, callback: F) -> ListenerId
    where
        F: Fn(&Arc<ReadingSet>) + Send + Sync + 'static,
    {
        self.inner.listeners.subscribe(callback)
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.inner.listeners.unsubscribe(id)
    }
}

// ── Background tasks ─────────────────────────────────────────────

fn ticker(period: Duration) -> tokio::time::Interval {
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

/// Refresh on every tick until cancelled. After a crashed cycle the loop
/// pauses for the recovery delay before resuming.
async fn poll_task(coordinator: Coordinator, cancel: CancellationToken) {
    let mut interval_rx = coordinator.inner.interval.subscribe();
    let mut interval = ticker(*interval_rx.borrow_and_update());
    let recovery_delay = coordinator.inner.config.recovery_delay;

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            Ok(()) = interval_rx.changed() => {
                let period = *interval_rx.borrow_and_update();
                debug!(interval = ?period, "poll interval changed");
                interval = ticker(period);
            }
            _ = interval.tick() => {
                // An in-flight cycle is dropped on cancellation; it only
                // publishes after its last await point.
                let outcome = tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    outcome = coordinator.refresh_now() => outcome,
                };
                if outcome == RefreshOutcome::Crashed {
                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => break,
                        () = tokio::time::sleep(recovery_delay) => {}
                    }
                }
            }
        }
    }
    debug!("poll loop stopped");
}
