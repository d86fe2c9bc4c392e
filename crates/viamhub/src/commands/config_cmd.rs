//! Config subcommand handlers.

use dialoguer::{Input, Select};
use viamhub_config::{Config, Profile};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config;
use crate::error::CliError;
use crate::output;

const REDACTED: &str = "********";

// ── Helpers ─────────────────────────────────────────────────────────

/// Map a dialoguer / interactive I/O failure into CliError.
fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

/// Copy of `cfg` with every plaintext secret masked.
pub fn redacted(cfg: &Config) -> Config {
    let mut out = cfg.clone();
    for profile in out.profiles.values_mut() {
        if profile.api_key.is_some() {
            profile.api_key = Some(REDACTED.into());
        }
        if let Some(data) = profile.data_api.as_mut() {
            if data.api_key.is_some() {
                data.api_key = Some(REDACTED.into());
            }
        }
    }
    out
}

fn split_names(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Init => init(global),

        ConfigCommand::Show => {
            let cfg = redacted(&config::load_config(global)?);
            let out = output::render_single(
                global.output,
                &cfg,
                |c| toml::to_string_pretty(c).unwrap_or_else(|e| format!("{e}")),
                |c| c.default_profile.clone().unwrap_or_default(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Path => {
            println!("{}", config::config_path(global).display());
            Ok(())
        }

        ConfigCommand::Profiles => {
            let cfg = config::load_config(global)?;
            let default = cfg.default_profile.as_deref().unwrap_or("default");
            if cfg.profiles.is_empty() {
                eprintln!("No profiles configured. Run: viamhub config init");
            } else {
                for name in cfg.profiles.keys() {
                    let marker = if name == default { " *" } else { "" };
                    println!("{name}{marker}");
                }
            }
            Ok(())
        }

        ConfigCommand::Use { name } => {
            let mut cfg = config::load_config(global)?;
            if !cfg.profiles.contains_key(&name) {
                return Err(CliError::ProfileNotFound {
                    available: config::available_profiles(&cfg),
                    name,
                });
            }
            cfg.default_profile = Some(name.clone());
            viamhub_config::save_config_to(&cfg, &config::config_path(global))?;
            eprintln!("✓ Default profile set to '{name}'");
            Ok(())
        }

        ConfigCommand::SetKey { name } => {
            let cfg = config::load_config(global)?;
            let profile_name = name.unwrap_or_else(|| config::active_profile_name(global, &cfg));
            if !cfg.profiles.contains_key(&profile_name) {
                return Err(CliError::ProfileNotFound {
                    available: config::available_profiles(&cfg),
                    name: profile_name,
                });
            }

            let secret = rpassword::prompt_password("API key: ").map_err(prompt_err)?;
            if secret.is_empty() {
                return Err(CliError::Validation {
                    field: "api_key".into(),
                    reason: "value cannot be empty".into(),
                });
            }
            viamhub_config::store_api_key(&profile_name, &secret)?;
            eprintln!("✓ API key stored in system keyring for profile '{profile_name}'");
            Ok(())
        }
    }
}

// ── Init: interactive wizard ────────────────────────────────────────

fn init(global: &GlobalOpts) -> Result<(), CliError> {
    let path = config::config_path(global);
    eprintln!("viamhub configuration wizard");
    eprintln!("   Config path: {}\n", path.display());

    let profile_name: String = Input::new()
        .with_prompt("Profile name")
        .default("default".into())
        .interact_text()
        .map_err(prompt_err)?;

    let address: String = Input::new()
        .with_prompt("Robot address (e.g. garage-main.abc123.viam.cloud)")
        .interact_text()
        .map_err(prompt_err)?;

    let api_key_id: String = Input::new()
        .with_prompt("API key ID")
        .interact_text()
        .map_err(prompt_err)?;

    let key = rpassword::prompt_password("API key: ").map_err(prompt_err)?;
    if key.is_empty() {
        return Err(CliError::Validation {
            field: "api_key".into(),
            reason: "API key cannot be empty".into(),
        });
    }

    let store_choices = &[
        "Store in system keyring (recommended)",
        "Save to config file (plaintext)",
    ];
    let store_selection = Select::new()
        .with_prompt("Where to store the API key?")
        .items(store_choices)
        .default(0)
        .interact()
        .map_err(prompt_err)?;

    let api_key = if store_selection == 0 {
        viamhub_config::store_api_key(&profile_name, &key)?;
        eprintln!("   ✓ API key stored in system keyring");
        None
    } else {
        Some(key)
    };

    let motors: String = Input::new()
        .with_prompt("Motors to drive as covers (comma separated, blank for none)")
        .allow_empty(true)
        .interact_text()
        .map_err(prompt_err)?;

    let poll_interval: u64 = Input::new()
        .with_prompt("Sensor refresh interval (seconds)")
        .default(30)
        .interact_text()
        .map_err(prompt_err)?;

    let profile = Profile {
        address: address.trim().to_owned(),
        api_key_id: Some(api_key_id.trim().to_owned()),
        api_key,
        motor_names: split_names(&motors),
        poll_interval,
        ..Profile::default()
    };

    let mut cfg = config::load_config(global).unwrap_or_default();
    cfg.profiles.insert(profile_name.clone(), profile);
    cfg.default_profile = Some(profile_name.clone());
    viamhub_config::save_config_to(&cfg, &path)?;

    eprintln!("\n✓ Configuration written to {}", path.display());
    eprintln!("  Active profile: {profile_name}");
    eprintln!("\n  Test it: viamhub status");
    Ok(())
}
