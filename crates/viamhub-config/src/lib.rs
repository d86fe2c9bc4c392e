//! Shared configuration for the viamhub tools.
//!
//! TOML profiles, credential resolution (env + keyring + plaintext), and
//! translation into the runtime types of `viamhub_core` and
//! `viamhub_api`. The CLI layers its flag overrides on top.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use viamhub_api::{
    Credentials, DataApiSettings, TlsMode, TransportConfig, data_api, robot_id_from_address,
};
use viamhub_core::{CoreError, CoverConfig, DeviceConfig, PollConfig};

/// Service name under which API keys live in the system keyring.
pub const KEYRING_SERVICE: &str = "viamhub";

/// Environment variable that overrides the config file location.
pub const CONFIG_PATH_ENV: &str = "VIAMHUB_CONFIG";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no credentials configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("profile '{name}' not found in config")]
    UnknownProfile { name: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

impl From<CoreError> for ConfigError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Configuration { field, reason } => Self::Validation { field, reason },
            other => Self::Validation {
                field: "profile".into(),
                reason: other.to_string(),
            },
        }
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Profile used when none is named on the command line.
    pub default_profile: Option<String>,

    #[serde(default)]
    pub defaults: Defaults,

    /// Named robot profiles.
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Look up a profile by name, falling back to `default_profile`.
    pub fn profile<'a>(
        &'a self,
        name: Option<&'a str>,
    ) -> Result<(&'a str, &'a Profile), ConfigError> {
        let name = name
            .or(self.default_profile.as_deref())
            .unwrap_or("default");
        self.profiles
            .get(name)
            .map(|p| (name, p))
            .ok_or_else(|| ConfigError::UnknownProfile { name: name.into() })
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            timeout: default_timeout(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_timeout() -> u64 {
    30
}
fn default_poll_interval() -> u64 {
    30
}
fn default_stale_multiplier() -> u32 {
    10
}
fn default_run_time() -> u64 {
    10
}
fn default_hours_back() -> u32 {
    data_api::DEFAULT_HOURS_BACK
}

/// A named robot profile.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Profile {
    /// Robot address (e.g. "garage-main.abc123.viam.cloud").
    pub address: String,

    /// Robot API key identifier.
    pub api_key_id: Option<String>,

    /// API key (plaintext, prefer keyring or env var).
    pub api_key: Option<String>,

    /// Environment variable name containing the API key.
    pub api_key_env: Option<String>,

    /// Path to custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    /// Accept invalid TLS certificates.
    pub insecure: Option<bool>,

    /// Override the default request timeout (seconds).
    pub timeout: Option<u64>,

    /// Seconds between sensor refreshes.
    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,

    /// Readings older than `stale_multiplier × poll_interval` are stale.
    #[serde(default = "default_stale_multiplier")]
    pub stale_multiplier: u32,

    /// Motors driven as covers.
    #[serde(default)]
    pub motor_names: Vec<String>,

    /// Seconds at full power from closed to open.
    #[serde(default = "default_run_time")]
    pub open_time: u64,

    /// Seconds at full power from open to closed.
    #[serde(default = "default_run_time")]
    pub close_time: u64,

    #[serde(default)]
    pub flip_direction: bool,

    #[serde(default)]
    pub data_api: Option<DataApiProfile>,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            address: String::new(),
            api_key_id: None,
            api_key: None,
            api_key_env: None,
            ca_cert: None,
            insecure: None,
            timeout: None,
            poll_interval: default_poll_interval(),
            stale_multiplier: default_stale_multiplier(),
            motor_names: Vec::new(),
            open_time: default_run_time(),
            close_time: default_run_time(),
            flip_direction: false,
            data_api: None,
        }
    }
}

/// Cloud data API settings for one profile.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DataApiProfile {
    #[serde(default)]
    pub enabled: bool,

    /// Organization ID, used as the key identifier.
    pub org_id: Option<String>,

    /// Organization API key (plaintext, prefer keyring or env var).
    pub api_key: Option<String>,

    /// Environment variable name containing the organization API key.
    pub api_key_env: Option<String>,

    /// Sensors to read from the cloud instead of the robot.
    #[serde(default)]
    pub sensor_names: Vec<String>,

    /// Override the cloud endpoint.
    pub base_url: Option<String>,

    /// How far back to look for the latest reading.
    #[serde(default = "default_hours_back")]
    pub hours_back: u32,
}

impl Default for DataApiProfile {
    fn default() -> Self {
        Self {
            enabled: false,
            org_id: None,
            api_key: None,
            api_key_env: None,
            sensor_names: Vec::new(),
            base_url: None,
            hours_back: default_hours_back(),
        }
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path: `$VIAMHUB_CONFIG`, then platform conventions.
pub fn config_path() -> PathBuf {
    if let Some(path) = std::env::var_os(CONFIG_PATH_ENV) {
        return PathBuf::from(path);
    }
    ProjectDirs::from("", "", "viamhub").map_or_else(
        || {
            let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
            p.push(".config");
            p.push("viamhub");
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the default path + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from an explicit file. A missing file is not an error.
///
/// `VIAMHUB_`-prefixed variables override file values; nested keys use a
/// double underscore, e.g. `VIAMHUB_PROFILES__GARAGE__ADDRESS`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    debug!(path = %path.display(), "loading config");
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("VIAMHUB_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if loading fails.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<PathBuf, ConfigError> {
    let path = config_path();
    save_config_to(cfg, &path)?;
    Ok(path)
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential resolution ───────────────────────────────────────────

fn keyring_account(profile_name: &str, what: &str) -> String {
    format!("{profile_name}/{what}")
}

/// Store a robot API key in the system keyring.
pub fn store_api_key(profile_name: &str, api_key: &str) -> Result<(), ConfigError> {
    let entry = keyring::Entry::new(KEYRING_SERVICE, &keyring_account(profile_name, "api-key"))?;
    entry.set_password(api_key)?;
    Ok(())
}

/// Walk the chain: named env var, keyring, plaintext.
fn resolve_secret(
    env_name: Option<&str>,
    keyring_account: &str,
    plaintext: Option<&str>,
    profile_name: &str,
) -> Result<SecretString, ConfigError> {
    if let Some(val) = env_name.and_then(|name| std::env::var(name).ok()) {
        return Ok(SecretString::from(val));
    }

    if let Ok(entry) = keyring::Entry::new(KEYRING_SERVICE, keyring_account) {
        if let Ok(secret) = entry.get_password() {
            return Ok(SecretString::from(secret));
        }
    }

    if let Some(key) = plaintext {
        return Ok(SecretString::from(key.to_owned()));
    }

    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
    })
}

/// Resolve the robot API key from the credential chain.
pub fn resolve_api_key(profile: &Profile, profile_name: &str) -> Result<SecretString, ConfigError> {
    resolve_secret(
        profile.api_key_env.as_deref(),
        &keyring_account(profile_name, "api-key"),
        profile.api_key.as_deref(),
        profile_name,
    )
}

/// Resolve the full robot credential pair.
pub fn resolve_credentials(
    profile: &Profile,
    profile_name: &str,
) -> Result<Credentials, ConfigError> {
    let api_key_id = profile
        .api_key_id
        .clone()
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ConfigError::NoCredentials {
            profile: profile_name.into(),
        })?;
    Ok(Credentials {
        api_key_id,
        api_key: resolve_api_key(profile, profile_name)?,
    })
}

// ── Translation ─────────────────────────────────────────────────────

/// HTTP transport settings shared by the robot and cloud clients.
pub fn profile_transport(profile: &Profile, defaults: &Defaults) -> TransportConfig {
    let tls = if profile.insecure.unwrap_or(false) {
        TlsMode::DangerAcceptInvalid
    } else if let Some(ref ca_path) = profile.ca_cert {
        TlsMode::CustomCa(ca_path.clone())
    } else {
        TlsMode::System
    };

    TransportConfig {
        tls,
        timeout: Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout)),
    }
}

/// Build a validated `DeviceConfig` from a profile.
pub fn profile_to_device_config(
    profile: &Profile,
    profile_name: &str,
) -> Result<DeviceConfig, ConfigError> {
    let credentials = resolve_credentials(profile, profile_name)?;
    let config = DeviceConfig::new(profile.address.trim(), credentials);
    config.validate()?;
    Ok(config)
}

pub fn profile_to_poll_config(profile: &Profile) -> Result<PollConfig, ConfigError> {
    let config = PollConfig {
        interval: Duration::from_secs(profile.poll_interval),
        stale_multiplier: profile.stale_multiplier,
        ..PollConfig::default()
    };
    config.validate()?;
    Ok(config)
}

/// One cover per configured motor, sharing the profile's timings.
pub fn profile_to_cover_configs(profile: &Profile) -> Vec<CoverConfig> {
    profile
        .motor_names
        .iter()
        .map(|name| CoverConfig {
            open_time: Duration::from_secs(profile.open_time),
            close_time: Duration::from_secs(profile.close_time),
            flip_direction: profile.flip_direction,
            ..CoverConfig::new(name.trim())
        })
        .collect()
}

/// Cloud data settings, or `None` when the data API is disabled.
pub fn profile_to_data_api_settings(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
) -> Result<Option<DataApiSettings>, ConfigError> {
    let Some(data) = profile.data_api.as_ref().filter(|d| d.enabled) else {
        return Ok(None);
    };

    let org_id = data
        .org_id
        .clone()
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ConfigError::Validation {
            field: "data_api.org_id".into(),
            reason: "required when the data API is enabled".into(),
        })?;
    let api_key = resolve_secret(
        data.api_key_env.as_deref(),
        &keyring_account(profile_name, "data-api-key"),
        data.api_key.as_deref(),
        profile_name,
    )?;

    let raw_url = data
        .base_url
        .as_deref()
        .unwrap_or(data_api::DEFAULT_DATA_API_URL);
    let base_url: url::Url = raw_url.parse().map_err(|_| ConfigError::Validation {
        field: "data_api.base_url".into(),
        reason: format!("invalid URL: {raw_url}"),
    })?;

    Ok(Some(DataApiSettings {
        base_url,
        credentials: Credentials {
            api_key_id: org_id,
            api_key,
        },
        robot_id: robot_id_from_address(&profile.address),
        transport: profile_transport(profile, defaults),
    }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn profile() -> Profile {
        Profile {
            address: "garage-main.abc123.viam.cloud".into(),
            api_key_id: Some("key-id".into()),
            api_key: Some("plain".into()),
            ..Profile::default()
        }
    }

    #[test]
    fn profile_lookup_falls_back_to_default_profile() {
        let mut cfg = Config::default();
        cfg.default_profile = Some("garage".into());
        cfg.profiles.insert("garage".into(), profile());

        let (name, _) = cfg.profile(None).unwrap();
        assert_eq!(name, "garage");
        assert!(matches!(
            cfg.profile(Some("shed")),
            Err(ConfigError::UnknownProfile { .. })
        ));
    }

    #[test]
    fn missing_key_id_is_no_credentials() {
        let mut p = profile();
        p.api_key_id = None;
        assert!(matches!(
            resolve_credentials(&p, "unit-test-no-id"),
            Err(ConfigError::NoCredentials { .. })
        ));
    }

    #[test]
    fn transport_prefers_insecure_over_custom_ca() {
        let mut p = profile();
        p.ca_cert = Some(PathBuf::from("/tmp/ca.pem"));
        assert_eq!(
            profile_transport(&p, &Defaults::default()).tls,
            TlsMode::CustomCa(PathBuf::from("/tmp/ca.pem"))
        );
        p.insecure = Some(true);
        assert_eq!(
            profile_transport(&p, &Defaults::default()).tls,
            TlsMode::DangerAcceptInvalid
        );
    }

    #[test]
    fn zero_poll_interval_is_rejected() {
        let mut p = profile();
        p.poll_interval = 0;
        let err = profile_to_poll_config(&p).unwrap_err();
        assert!(matches!(err, ConfigError::Validation { ref field, .. } if field == "poll.interval"));
    }

    #[test]
    fn covers_share_profile_timings() {
        let mut p = profile();
        p.motor_names = vec!["left".into(), " right ".into()];
        p.close_time = 14;
        p.flip_direction = true;

        let covers = profile_to_cover_configs(&p);
        assert_eq!(covers.len(), 2);
        assert_eq!(covers[1].motor_name, "right");
        assert_eq!(covers[1].close_time, Duration::from_secs(14));
        assert!(covers[0].flip_direction);
    }

    #[test]
    fn data_api_disabled_yields_none() {
        let mut p = profile();
        p.data_api = Some(DataApiProfile {
            enabled: false,
            org_id: Some("org".into()),
            ..DataApiProfile::default()
        });
        assert!(
            profile_to_data_api_settings(&p, "x", &Defaults::default())
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn data_api_requires_org_id() {
        let mut p = profile();
        p.data_api = Some(DataApiProfile {
            enabled: true,
            api_key: Some("org-key".into()),
            ..DataApiProfile::default()
        });
        let err = profile_to_data_api_settings(&p, "x", &Defaults::default()).unwrap_err();
        assert!(matches!(err, ConfigError::Validation { ref field, .. } if field == "data_api.org_id"));
    }
}
