// ── Cover actuation ──
//
// Drives one motor as a garage-door style cover: full power one way for
// a configured time, then stop. Position is assumed, not measured.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use viamhub_api::Motor;

use crate::config::CoverConfig;
use crate::error::{CoreError, with_timeout};
use crate::manager::ConnectionManager;
use crate::model::CapabilityKind;

const FULLY_OPEN: u8 = 100;
const FULLY_CLOSED: u8 = 0;
/// Assumed position after a move is interrupted by `stop`.
const PARTIAL: u8 = 50;

/// Assumed cover state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CoverState {
    /// 0 = closed, 100 = open.
    pub position: u8,
    pub is_closed: bool,
    pub is_opening: bool,
    pub is_closing: bool,
}

impl Default for CoverState {
    fn default() -> Self {
        Self {
            position: FULLY_OPEN,
            is_closed: false,
            is_opening: false,
            is_closing: false,
        }
    }
}

impl CoverState {
    pub fn is_moving(&self) -> bool {
        self.is_opening || self.is_closing
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Open,
    Close,
}

struct Inner {
    state: CoverState,
    /// Cancelled by `stop` to cut the run short.
    cancel: Option<CancellationToken>,
    /// Set until a run has stopped its motor, even after `stop` has
    /// already cleared the opening/closing flags.
    running: bool,
}

pub struct Cover {
    manager: ConnectionManager,
    config: CoverConfig,
    inner: Mutex<Inner>,
}

impl Cover {
    pub fn new(manager: ConnectionManager, config: CoverConfig) -> Self {
        Self {
            manager,
            config,
            inner: Mutex::new(Inner {
                state: CoverState::default(),
                cancel: None,
                running: false,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.config.motor_name
    }

    pub async fn state(&self) -> CoverState {
        self.inner.lock().await.state
    }

    pub async fn open(&self) -> Result<(), CoreError> {
        self.run(Direction::Open).await
    }

    pub async fn close(&self) -> Result<(), CoreError> {
        self.run(Direction::Close).await
    }

    /// Stop immediately, cutting short any move in progress.
    pub async fn stop(&self) -> Result<(), CoreError> {
        {
            let mut inner = self.inner.lock().await;
            if let Some(cancel) = inner.cancel.take() {
                cancel.cancel();
            }
            inner.state.is_opening = false;
            inner.state.is_closing = false;
        }

        let motor = self.motor().await?;
        with_timeout("motor stop", self.config.call_timeout, motor.stop()).await?;
        info!(cover = %self.name(), "stopped");
        Ok(())
    }

    async fn run(&self, direction: Direction) -> Result<(), CoreError> {
        let token = CancellationToken::new();
        {
            let mut inner = self.inner.lock().await;
            if inner.running || inner.state.is_moving() {
                return Err(CoreError::CoverBusy {
                    name: self.config.motor_name.clone(),
                });
            }
            match direction {
                Direction::Open => inner.state.is_opening = true,
                Direction::Close => inner.state.is_closing = true,
            }
            inner.running = true;
            inner.cancel = Some(token.clone());
        }

        let result = self.drive(direction, &token).await;

        let mut inner = self.inner.lock().await;
        inner.running = false;
        inner.cancel = None;
        inner.state.is_opening = false;
        inner.state.is_closing = false;
        match &result {
            Ok(true) => {
                inner.state.is_closed = direction == Direction::Close;
                inner.state.position = if inner.state.is_closed {
                    FULLY_CLOSED
                } else {
                    FULLY_OPEN
                };
                info!(cover = %self.name(), ?direction, "move complete");
            }
            Ok(false) => {
                inner.state.is_closed = false;
                inner.state.position = PARTIAL;
                info!(cover = %self.name(), ?direction, "move interrupted");
            }
            Err(e) => warn!(cover = %self.name(), ?direction, error = %e, "move failed"),
        }
        result.map(|_| ())
    }

    /// Returns `Ok(false)` when `stop` interrupted the run.
    async fn drive(
        &self,
        direction: Direction,
        token: &CancellationToken,
    ) -> Result<bool, CoreError> {
        let motor = self.motor().await?;
        let (power, run_for) = self.plan(direction);
        let limit = self.config.call_timeout;

        if token.is_cancelled() {
            return Ok(false);
        }
        debug!(cover = %self.name(), power, run_for = ?run_for, "driving");
        with_timeout("motor set_power", limit, motor.set_power(power)).await?;

        let completed = tokio::select! {
            () = token.cancelled() => false,
            () = tokio::time::sleep(run_for) => true,
        };

        // Always stop: a concurrent stop() may have landed before set_power.
        with_timeout("motor stop", limit, motor.stop()).await?;
        Ok(completed)
    }

    fn plan(&self, direction: Direction) -> (f64, Duration) {
        let opening_power = if self.config.flip_direction { -1.0 } else { 1.0 };
        match direction {
            Direction::Open => (opening_power, self.config.open_time),
            Direction::Close => (-opening_power, self.config.close_time),
        }
    }

    async fn motor(&self) -> Result<Arc<dyn Motor>, CoreError> {
        if !self.manager.ensure_connection().await {
            return Err(CoreError::NotConnected);
        }
        self.manager
            .get_motor(&self.config.motor_name)
            .ok_or_else(|| CoreError::CapabilityNotFound {
                name: self.config.motor_name.clone(),
                kind: CapabilityKind::Motor,
            })
    }
}
