// ── Runtime device configuration ──
//
// These types describe *how* to reach and poll one robot. They carry
// credentials and tuning, but never touch disk: the CLI (or any other
// front end) builds a `DeviceConfig` and hands it in.

use std::time::Duration;

use secrecy::ExposeSecret;
use viamhub_api::Credentials;

use crate::error::CoreError;

/// Hard ceilings for every outbound call the core makes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timeouts {
    /// Session establishment and resource listing. Default: 10s.
    pub connect: Duration,
    /// Liveness probe on an existing session. Default: 5s.
    pub probe: Duration,
    /// Per-resource capability probe during discovery. Default: 5s.
    pub discovery_probe: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(10),
            probe: Duration::from_secs(5),
            discovery_probe: Duration::from_secs(5),
        }
    }
}

/// Exponential backoff between reconnect attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffConfig {
    /// Base delay, also the window after a success. Default: 1s.
    pub initial_delay: Duration,
    /// Upper bound on the window. Default: 30s.
    pub max_delay: Duration,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

/// Configuration for one managed device connection.
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// Host name or URL of the robot (e.g. `garage-main.abc123.viam.cloud`).
    pub address: String,
    pub credentials: Credentials,
    pub timeouts: Timeouts,
    pub backoff: BackoffConfig,
    /// How often the reconnect supervisor re-probes a live session.
    pub health_check_interval: Duration,
}

impl DeviceConfig {
    pub fn new(address: impl Into<String>, credentials: Credentials) -> Self {
        Self {
            address: address.into(),
            credentials,
            timeouts: Timeouts::default(),
            backoff: BackoffConfig::default(),
            health_check_interval: Duration::from_secs(30),
        }
    }

    /// Reject configurations that can never connect.
    pub fn validate(&self) -> Result<(), CoreError> {
        let address = self.address.trim();
        if address.is_empty() {
            return Err(CoreError::config("address", "must not be empty"));
        }
        if address.chars().any(char::is_whitespace) {
            return Err(CoreError::config("address", "must not contain whitespace"));
        }
        if self.credentials.api_key_id.trim().is_empty() {
            return Err(CoreError::config("api_key_id", "must not be empty"));
        }
        if self.credentials.api_key.expose_secret().is_empty() {
            return Err(CoreError::config("api_key", "must not be empty"));
        }

        for (field, value) in [
            ("timeouts.connect", self.timeouts.connect),
            ("timeouts.probe", self.timeouts.probe),
            ("timeouts.discovery_probe", self.timeouts.discovery_probe),
            ("backoff.initial_delay", self.backoff.initial_delay),
            ("health_check_interval", self.health_check_interval),
        ] {
            if value.is_zero() {
                return Err(CoreError::config(field, "must be greater than zero"));
            }
        }
        if self.backoff.max_delay < self.backoff.initial_delay {
            return Err(CoreError::config(
                "backoff.max_delay",
                "must not be smaller than backoff.initial_delay",
            ));
        }
        Ok(())
    }
}

/// Polling coordinator tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollConfig {
    /// Time between refresh cycles. Default: 30s.
    pub interval: Duration,
    /// A sensor is stale once its last good read is older than
    /// `stale_multiplier × interval`. Default: 10.
    pub stale_multiplier: u32,
    /// Per-sensor read ceiling. Default: 5s.
    pub read_timeout: Duration,
    /// Pause after a crashed cycle before the loop resumes. Default: 5s.
    pub recovery_delay: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            stale_multiplier: 10,
            read_timeout: Duration::from_secs(5),
            recovery_delay: Duration::from_secs(5),
        }
    }
}

impl PollConfig {
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.interval.is_zero() {
            return Err(CoreError::config("poll.interval", "must be greater than zero"));
        }
        if self.stale_multiplier == 0 {
            return Err(CoreError::config("poll.stale_multiplier", "must be at least 1"));
        }
        if self.read_timeout.is_zero() {
            return Err(CoreError::config("poll.read_timeout", "must be greater than zero"));
        }
        Ok(())
    }

    /// Age beyond which a reading counts as stale, for a given interval.
    pub fn stale_after(&self, interval: Duration) -> Duration {
        interval
            .checked_mul(self.stale_multiplier)
            .unwrap_or(Duration::MAX)
    }
}

/// Garage-door style actuation of one motor.
#[derive(Debug, Clone, PartialEq)]
pub struct CoverConfig {
    pub motor_name: String,
    /// Run time at full power to go from closed to open. Default: 10s.
    pub open_time: Duration,
    /// Run time at full power to go from open to closed. Default: 10s.
    pub close_time: Duration,
    /// Swap which power sign opens the cover.
    pub flip_direction: bool,
    /// Ceiling for each individual motor call. Default: 5s.
    pub call_timeout: Duration,
}

impl CoverConfig {
    pub fn new(motor_name: impl Into<String>) -> Self {
        Self {
            motor_name: motor_name.into(),
            open_time: Duration::from_secs(10),
            close_time: Duration::from_secs(10),
            flip_direction: false,
            call_timeout: Duration::from_secs(5),
        }
    }
}
