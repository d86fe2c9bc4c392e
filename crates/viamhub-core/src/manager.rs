// ── Connection manager ──
//
// Owns the session to one robot. Reconnects are single-flight behind an
// async gate and rate-limited by exponential backoff; capability handles
// are served from an `ArcSwap` snapshot and never wait on the gate.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use arc_swap::ArcSwap;
use serde::Serialize;
use strum::Display;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use viamhub_api::{DeviceTransport, Motor, Sensor};

use crate::backoff::AttemptState;
use crate::config::DeviceConfig;
use crate::discovery::discover;
use crate::error::CoreError;
use crate::listener::{ListenerId, Listeners};
use crate::model::{CapabilityHandle, CapabilityRegistry};
use crate::session::Session;

// ── ConnectionState ──────────────────────────────────────────────

/// Connection state observable by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Point-in-time view of the reconnect state machine, for diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionSummary {
    pub state: ConnectionState,
    pub consecutive_failures: u32,
    pub next_backoff: Duration,
    pub established_at: Option<chrono::DateTime<chrono::Utc>>,
}

// ── ConnectionManager ────────────────────────────────────────────

/// Cheaply cloneable via `Arc<ManagerInner>`.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<ManagerInner>,
}

struct ManagerInner {
    config: DeviceConfig,
    transport: Arc<dyn DeviceTransport>,
    gate: Mutex<Gate>,
    registry: ArcSwap<CapabilityRegistry>,
    state: watch::Sender<ConnectionState>,
    listeners: Listeners<bool>,
    cancel: CancellationToken,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
    shut_down: AtomicBool,
}

/// Everything only one `ensure_connection` may touch at a time.
struct Gate {
    session: Option<Session>,
    attempts: AttemptState,
}

impl ConnectionManager {
    /// Validate `config` and build a manager. Does NOT connect.
    pub fn new(
        config: DeviceConfig,
        transport: Arc<dyn DeviceTransport>,
    ) -> Result<Self, CoreError> {
        config.validate()?;
        let attempts = AttemptState::new(&config.backoff);
        let (state, _) = watch::channel(ConnectionState::Disconnected);

        Ok(Self {
            inner: Arc::new(ManagerInner {
                config,
                transport,
                gate: Mutex::new(Gate {
                    session: None,
                    attempts,
                }),
                registry: ArcSwap::from_pointee(CapabilityRegistry::default()),
                state,
                listeners: Listeners::new("connection"),
                cancel: CancellationToken::new(),
                task_handles: Mutex::new(Vec::new()),
                shut_down: AtomicBool::new(false),
            }),
        })
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.inner.config
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.shut_down.load(Ordering::Acquire)
    }

    // ── Connection lifecycle ─────────────────────────────────────

    /// `true` iff a live session is confirmed by the end of this call.
    ///
    /// An existing session is probed; a dead or missing one is replaced,
    /// unless the last attempt is still inside its backoff window, in
    /// which case this returns `false` without touching the network.
    pub async fn ensure_connection(&self) -> bool {
        if self.is_shut_down() {
            return false;
        }
        let mut gate = self.inner.gate.lock().await;
        if self.is_shut_down() {
            return false;
        }

        let config = &self.inner.config;

        if let Some(session) = &gate.session {
            if session.probe(config.timeouts.probe).await {
                if self.inner.registry.load().classified_count() == 0 {
                    self.rediscover(session).await;
                }
                return true;
            }
            warn!(address = %config.address, "session lost");
            if let Some(dead) = gate.session.take() {
                dead.close().await;
            }
            self.inner.registry.store(Arc::new(CapabilityRegistry::default()));
            self.transition(ConnectionState::Disconnected);
        }

        let now = Instant::now();
        if gate.attempts.in_backoff_window(now) {
            debug!(
                remaining = ?gate.attempts.remaining(now),
                "reconnect suppressed by backoff"
            );
            return false;
        }
        gate.attempts.record_attempt(now);
        self.transition(ConnectionState::Connecting);

        match Session::connect(
            self.inner.transport.as_ref(),
            &config.address,
            &config.credentials,
            config.timeouts.connect,
        )
        .await
        {
            Ok(session) => {
                gate.attempts.record_success(&config.backoff);
                let registry =
                    discover(&session, config.timeouts.connect, config.timeouts.discovery_probe)
                        .await
                        .unwrap_or_else(|e| {
                            warn!(error = %e, "discovery failed after connect");
                            CapabilityRegistry::default()
                        });
                self.inner.registry.store(Arc::new(registry));
                gate.session = Some(session);
                self.transition(ConnectionState::Connected);
                info!(address = %config.address, "connected");
                true
            }
            Err(e) => {
                gate.attempts.record_failure(&config.backoff);
                warn!(
                    address = %config.address,
                    error = %e,
                    failures = gate.attempts.consecutive_failures(),
                    backoff = ?gate.attempts.next_backoff(),
                    "connect failed"
                );
                self.transition(ConnectionState::Disconnected);
                false
            }
        }
    }

    /// Re-run discovery on a live session. Keeps the previous registry
    /// when the scan fails.
    async fn rediscover(&self, session: &Session) {
        let timeouts = &self.inner.config.timeouts;
        match discover(session, timeouts.connect, timeouts.discovery_probe).await {
            Ok(registry) => self.inner.registry.store(Arc::new(registry)),
            Err(e) => warn!(error = %e, "rediscovery failed; keeping previous capabilities"),
        }
    }

    /// Publish `next` and fire listeners when connectivity flips.
    fn transition(&self, next: ConnectionState) {
        let prev = self.inner.state.send_replace(next);
        let was = prev == ConnectionState::Connected;
        let is = next == ConnectionState::Connected;
        if was != is {
            self.inner.listeners.publish(&is);
        }
    }

    /// Spawn the reconnect supervisor. Calling it again is a no-op.
    pub async fn start(&self) {
        if self.is_shut_down() {
            return;
        }
        let mut handles = self.inner.task_handles.lock().await;
        if !handles.is_empty() {
            return;
        }
        let manager = self.clone();
        let cancel = self.inner.cancel.clone();
        handles.push(tokio::spawn(supervisor_task(manager, cancel)));
        debug!("reconnect supervisor started");
    }

    /// Stop the supervisor, close the session, clear every cache and
    /// listener. Idempotent.
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

        let mut gate = self.inner.gate.lock().await;
        if let Some(session) = gate.session.take() {
            session.close().await;
        }
        drop(gate);

        self.inner.registry.store(Arc::new(CapabilityRegistry::default()));
        self.transition(ConnectionState::Disconnected);
        self.inner.listeners.clear();
        info!(address = %self.inner.config.address, "connection manager shut down");
    }

    /// How long the supervisor should wait before its next check.
    async fn next_check_delay(&self) -> Duration {
        let gate = self.inner.gate.lock().await;
        if gate.session.is_some() {
            self.inner.config.health_check_interval
        } else {
            gate.attempts.remaining(Instant::now())
        }
    }

    // ── Cache accessors (never wait on the gate) ─────────────────

    pub fn get_motor(&self, name: &str) -> Option<Arc<dyn Motor>> {
        self.inner.registry.load().get(name)?.as_motor().cloned()
    }

    pub fn get_sensor(&self, name: &str) -> Option<Arc<dyn Sensor>> {
        self.inner.registry.load().get(name)?.as_sensor().cloned()
    }

    pub fn get_all_motors(&self) -> BTreeMap<String, Arc<dyn Motor>> {
        self.inner.registry.load().motors()
    }

    pub fn get_all_sensors(&self) -> BTreeMap<String, Arc<dyn Sensor>> {
        self.inner.registry.load().sensors()
    }

    /// Every discovered handle including `Unknown`s, sorted by name.
    pub fn get_all_capabilities(&self) -> Vec<CapabilityHandle> {
        self.inner.registry.load().handles()
    }

    // ── State observation ────────────────────────────────────────

    /// `callback(true)` on every transition to connected, `callback(false)`
    /// on every transition away from it.
    pub fn add_connection_listener<F>(&self, callback: F) -> ListenerId
    where
        F: Fn(&bool) + Send + Sync + 'static,
    {
        self.inner.listeners.subscribe(callback)
    }

    pub fn remove_connection_listener(&self, id: ListenerId) -> bool {
        self.inner.listeners.unsubscribe(id)
    }

    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        *self.inner.state.borrow() == ConnectionState::Connected
    }

    /// Waits on the gate, so it may block behind an in-flight connect.
    pub async fn summary(&self) -> ConnectionSummary {
        let gate = self.inner.gate.lock().await;
        ConnectionSummary {
            state: *self.inner.state.borrow(),
            consecutive_failures: gate.attempts.consecutive_failures(),
            next_backoff: gate.attempts.next_backoff(),
            established_at: gate.session.as_ref().map(Session::established_at),
        }
    }
}

// ── Background tasks ─────────────────────────────────────────────

/// Keep the session alive: probe it while connected, retry as soon as
/// the backoff window allows while disconnected.
async fn supervisor_task(manager: ConnectionManager, cancel: CancellationToken) {
    loop {
        let delay = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            delay = manager.next_check_delay() => delay,
        };

        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(delay) => {}
        }

        // Shutdown resets the state, so an attempt dropped here leaves
        // nothing behind.
        let connected = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            connected = manager.ensure_connection() => connected,
        };
        debug!(connected, "supervisor check");
    }
    debug!("reconnect supervisor stopped");
}
