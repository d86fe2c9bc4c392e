// ── Core error types ──
//
// Only `Configuration` is fatal; every other variant describes a
// recoverable condition that the manager turns into a disconnected state
// or the coordinator turns into a carried-forward reading. Front ends see
// these through the cover and one-shot read operations.

use std::time::Duration;

use thiserror::Error;

use crate::model::CapabilityKind;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Configuration errors ─────────────────────────────────────────
    #[error("Invalid configuration for `{field}`: {reason}")]
    Configuration { field: String, reason: String },

    // ── Connection errors ────────────────────────────────────────────
    #[error(transparent)]
    Transport(#[from] viamhub_api::Error),

    #[error("{operation} timed out after {}s", .timeout.as_secs())]
    Timeout { operation: String, timeout: Duration },

    #[error("Device is not connected")]
    NotConnected,

    // ── Data errors ──────────────────────────────────────────────────
    #[error("No {kind} named `{name}` on this device")]
    CapabilityNotFound { name: String, kind: CapabilityKind },

    #[error("No data available for sensor `{sensor}`")]
    NoData { sensor: String },

    // ── Operation errors ─────────────────────────────────────────────
    #[error("Cover `{name}` is already moving")]
    CoverBusy { name: String },

    #[error("Already shut down")]
    ShutDown,
}

impl CoreError {
    pub(crate) fn config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Configuration {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn timeout(operation: impl Into<String>, timeout: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout,
        }
    }

    /// `true` when the failure is about credentials rather than reachability.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Transport(e) if e.is_auth())
    }
}

/// Run `fut` under `limit`, folding both failure layers into `CoreError`.
pub(crate) async fn with_timeout<T, F>(
    operation: &str,
    limit: Duration,
    fut: F,
) -> Result<T, CoreError>
where
    F: Future<Output = Result<T, viamhub_api::Error>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result.map_err(CoreError::from),
        Err(_) => Err(CoreError::timeout(operation, limit)),
    }
}
