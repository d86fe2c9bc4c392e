//! CLI error types with miette diagnostics.
//!
//! Maps library errors into user-facing errors with actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use viamhub_config::ConfigError;
use viamhub_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not connect to robot at {address}")]
    #[diagnostic(
        code(viamhub::connection_failed),
        help(
            "Check that the robot is online and the address is right.\n\
             Address: {address}\n\
             Run with -v for connection details."
        )
    )]
    ConnectionFailed { address: String },

    #[error("TLS setup failed: {message}")]
    #[diagnostic(
        code(viamhub::tls_error),
        help("Use --insecure (-k) to accept any certificate, or set ca_cert in your profile.")
    )]
    Tls { message: String },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed")]
    #[diagnostic(
        code(viamhub::auth_failed),
        help(
            "Verify the API key id and API key for this robot.\n\
             Run: viamhub config set-key {profile}"
        )
    )]
    AuthFailed { profile: String },

    #[error("No credentials configured for profile '{profile}'")]
    #[diagnostic(
        code(viamhub::no_credentials),
        help(
            "Configure credentials with: viamhub config init\n\
             Or set VIAMHUB_API_KEY_ID and VIAMHUB_API_KEY."
        )
    )]
    NoCredentials { profile: String },

    // ── Resources ────────────────────────────────────────────────────
    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(viamhub::not_found),
        help("Run: viamhub {list_command} to see what the robot exposes")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    #[error("Cover '{name}' is already moving")]
    #[diagnostic(
        code(viamhub::busy),
        help("Wait for the move to finish, or run: viamhub motor stop {name}")
    )]
    Busy { name: String },

    // ── API ──────────────────────────────────────────────────────────
    #[error("API error ({code}): {message}")]
    #[diagnostic(code(viamhub::api_error))]
    ApiError { code: String, message: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(viamhub::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(viamhub::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: viamhub config init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No robot configured")]
    #[diagnostic(
        code(viamhub::no_config),
        help(
            "Create a profile with: viamhub config init\n\
             Expected at: {path}\n\
             Or pass --address with --api-key-id and --api-key."
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(viamhub::config))]
    Config(Box<ConfigError>),

    // ── Timeout ──────────────────────────────────────────────────────
    #[error("{operation} timed out after {seconds}s")]
    #[diagnostic(
        code(viamhub::timeout),
        help("Increase the timeout with --timeout or check the robot's responsiveness.")
    )]
    Timeout { operation: String, seconds: u64 },

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    #[diagnostic(code(viamhub::json))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::Tls { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── Library error mapping ────────────────────────────────────────────

impl From<viamhub_api::Error> for CliError {
    fn from(err: viamhub_api::Error) -> Self {
        use viamhub_api::Error as ApiErr;

        match err {
            ApiErr::Authentication { .. } => Self::AuthFailed {
                profile: "current".into(),
            },
            ApiErr::Timeout { timeout_secs } => Self::Timeout {
                operation: "Request".into(),
                seconds: timeout_secs,
            },
            ApiErr::Tls(message) => Self::Tls { message },
            ApiErr::NotFound { name } => Self::NotFound {
                resource_type: "resource".into(),
                identifier: name,
                list_command: "resources".into(),
            },
            ApiErr::Transport(e) => Self::ConnectionFailed {
                address: e
                    .url()
                    .and_then(|u| u.host_str().map(str::to_owned))
                    .unwrap_or_else(|| "(unknown)".into()),
            },
            ApiErr::SessionClosed => Self::ConnectionFailed {
                address: "(session closed)".into(),
            },
            ApiErr::InvalidUrl(e) => Self::Validation {
                field: "address".into(),
                reason: e.to_string(),
            },
            ApiErr::Api { status, message } => Self::ApiError {
                code: status.to_string(),
                message,
            },
            ApiErr::Deserialization { message, .. } => Self::ApiError {
                code: "decode".into(),
                message,
            },
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Configuration { field, reason } => Self::Validation { field, reason },
            CoreError::Transport(e) => e.into(),
            CoreError::Timeout { operation, timeout } => Self::Timeout {
                operation,
                seconds: timeout.as_secs(),
            },
            CoreError::NotConnected => Self::ConnectionFailed {
                address: "(robot)".into(),
            },
            CoreError::CapabilityNotFound { name, kind } => Self::NotFound {
                resource_type: kind.to_string(),
                identifier: name,
                list_command: "resources".into(),
            },
            CoreError::NoData { sensor } => Self::ApiError {
                code: "no_data".into(),
                message: format!("no recent data for sensor '{sensor}'"),
            },
            CoreError::CoverBusy { name } => Self::Busy { name },
            CoreError::ShutDown => Self::ApiError {
                code: "shut_down".into(),
                message: "already shut down".into(),
            },
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NoCredentials { profile } => Self::NoCredentials { profile },
            ConfigError::UnknownProfile { name } => Self::ProfileNotFound {
                name,
                available: "(none)".into(),
            },
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            other => Self::Config(Box::new(other)),
        }
    }
}
