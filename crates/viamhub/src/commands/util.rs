//! Shared helpers for command handlers.

use std::sync::Arc;

use viamhub_api::Motor;
use viamhub_core::ConnectionManager;

use crate::config::Resolved;
use crate::error::CliError;

/// Everything a robot-bound command needs.
pub struct Runtime {
    pub resolved: Resolved,
    pub manager: ConnectionManager,
}

impl Runtime {
    pub fn address(&self) -> &str {
        &self.manager.config().address
    }
}

/// Connect (or confirm the session is alive), or fail with a connection error.
pub async fn connect(rt: &Runtime) -> Result<(), CliError> {
    if rt.manager.ensure_connection().await {
        Ok(())
    } else {
        Err(CliError::ConnectionFailed {
            address: rt.address().to_owned(),
        })
    }
}

/// Look up a discovered motor by name.
pub async fn motor(rt: &Runtime, name: &str) -> Result<Arc<dyn Motor>, CliError> {
    connect(rt).await?;
    rt.manager.get_motor(name).ok_or_else(|| CliError::NotFound {
        resource_type: "motor".into(),
        identifier: name.into(),
        list_command: "resources".into(),
    })
}
