//! Profile resolution with CLI flag overrides.
//!
//! The shared `viamhub-config` crate owns the TOML format and credential
//! chain; this module layers `GlobalOpts` on top and builds the runtime
//! objects every robot-bound command needs.

use std::path::PathBuf;
use std::sync::Arc;

use secrecy::SecretString;
use viamhub_api::{Credentials, HttpTransport, TlsMode, TransportConfig};
use viamhub_config::{Config, Defaults, Profile};
use viamhub_core::{ConnectionManager, DeviceConfig};

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Config file path honoring `--config`.
pub fn config_path(global: &GlobalOpts) -> PathBuf {
    global
        .config
        .clone()
        .unwrap_or_else(viamhub_config::config_path)
}

pub fn load_config(global: &GlobalOpts) -> Result<Config, CliError> {
    Ok(viamhub_config::load_config_from(&config_path(global))?)
}

/// `--profile`, then the file's `default_profile`, then "default".
pub fn active_profile_name(global: &GlobalOpts, cfg: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| cfg.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

pub fn available_profiles(cfg: &Config) -> String {
    if cfg.profiles.is_empty() {
        "(none)".into()
    } else {
        cfg.profiles.keys().cloned().collect::<Vec<_>>().join(", ")
    }
}

/// A profile with every flag override applied.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub profile_name: String,
    pub profile: Profile,
    pub defaults: Defaults,
    /// `--api-key` beats the whole credential chain.
    flag_api_key: Option<String>,
}

/// Resolve the active profile, falling back to flags alone when the
/// profile does not exist but `--address` was given.
pub fn resolve(global: &GlobalOpts) -> Result<Resolved, CliError> {
    let cfg = load_config(global)?;
    let profile_name = active_profile_name(global, &cfg);

    let mut profile = match cfg.profiles.get(&profile_name) {
        Some(p) => p.clone(),
        None if global.address.is_some() => Profile::default(),
        None if global.profile.is_some() => {
            return Err(CliError::ProfileNotFound {
                name: profile_name,
                available: available_profiles(&cfg),
            });
        }
        None => {
            return Err(CliError::NoConfig {
                path: config_path(global).display().to_string(),
            });
        }
    };

    if let Some(ref address) = global.address {
        profile.address.clone_from(address);
    }
    if let Some(ref id) = global.api_key_id {
        profile.api_key_id = Some(id.clone());
    }
    if global.insecure {
        profile.insecure = Some(true);
    }
    if let Some(timeout) = global.timeout {
        profile.timeout = Some(timeout);
    }

    Ok(Resolved {
        profile_name,
        profile,
        defaults: cfg.defaults,
        flag_api_key: global.api_key.clone(),
    })
}

impl Resolved {
    pub fn transport_config(&self) -> TransportConfig {
        viamhub_config::profile_transport(&self.profile, &self.defaults)
    }

    pub fn device_config(&self) -> Result<DeviceConfig, CliError> {
        let Some(ref key) = self.flag_api_key else {
            return Ok(viamhub_config::profile_to_device_config(
                &self.profile,
                &self.profile_name,
            )?);
        };

        let api_key_id = self
            .profile
            .api_key_id
            .clone()
            .ok_or_else(|| CliError::NoCredentials {
                profile: self.profile_name.clone(),
            })?;
        let config = DeviceConfig::new(
            self.profile.address.trim(),
            Credentials {
                api_key_id,
                api_key: SecretString::from(key.clone()),
            },
        );
        config.validate()?;
        Ok(config)
    }

    /// Build an unconnected manager over the HTTP gateway transport.
    pub fn manager(&self) -> Result<ConnectionManager, CliError> {
        let config = self.device_config()?;
        let transport = self.transport_config();
        if transport.tls == TlsMode::DangerAcceptInvalid {
            tracing::warn!(address = %config.address, "TLS certificate verification disabled");
        }
        Ok(ConnectionManager::new(
            config,
            Arc::new(HttpTransport::new(transport)),
        )?)
    }
}
