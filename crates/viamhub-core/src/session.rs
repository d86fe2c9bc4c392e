// Session handle: one authenticated connection to one robot.
//
// No retry logic lives here; the connection manager decides when to
// build, probe, and drop sessions.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use viamhub_api::{Credentials, DeviceSession, DeviceTransport};

use crate::error::{CoreError, with_timeout};

const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

pub struct Session {
    device: Arc<dyn DeviceSession>,
    address: String,
    established_at: DateTime<Utc>,
    closed: AtomicBool,
}

impl Session {
    /// Open a session, bounded by `timeout`.
    pub async fn connect(
        transport: &dyn DeviceTransport,
        address: &str,
        credentials: &Credentials,
        timeout: Duration,
    ) -> Result<Self, CoreError> {
        debug!(address, "connecting");
        let device = with_timeout(
            "connect",
            timeout,
            transport.connect(address, credentials),
        )
        .await?;

        Ok(Self {
            device,
            address: address.to_owned(),
            established_at: Utc::now(),
            closed: AtomicBool::new(false),
        })
    }

    /// `true` iff a version query answers within `timeout`.
    pub async fn probe(&self, timeout: Duration) -> bool {
        if self.closed.load(Ordering::Acquire) {
            return false;
        }
        match with_timeout("probe", timeout, self.device.probe()).await {
            Ok(()) => true,
            Err(e) => {
                debug!(address = %self.address, error = %e, "liveness probe failed");
                false
            }
        }
    }

    /// Best-effort close. Safe to call more than once.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Err(e) = with_timeout("close", CLOSE_TIMEOUT, self.device.close()).await {
            warn!(address = %self.address, error = %e, "error closing session (ignored)");
        }
    }

    pub fn device(&self) -> &dyn DeviceSession {
        self.device.as_ref()
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn established_at(&self) -> DateTime<Utc> {
        self.established_at
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}
