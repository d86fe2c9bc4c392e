#![allow(clippy::unwrap_used)]
// Profile loading from TOML + environment, and translation to runtime config.

use std::path::Path;
use std::time::Duration;

use figment::Jail;
use pretty_assertions::assert_eq;
use secrecy::ExposeSecret;
use viamhub_config::{
    Config, ConfigError, DataApiProfile, Profile, load_config_from, profile_to_data_api_settings,
    profile_to_device_config, profile_to_poll_config, save_config_to,
};

const GARAGE: &str = r#"
default_profile = "garage"

[profiles.garage]
address = "garage-main.abc123.viam.cloud"
api_key_id = "key-id"
api_key = "plaintext-key"
poll_interval = 15
motor_names = ["door"]
open_time = 12

[profiles.garage.data_api]
enabled = true
org_id = "org-1"
api_key_env = "GARAGE_ORG_KEY"
sensor_names = ["outside"]
"#;

fn load(path: &str) -> Result<Config, figment::Error> {
    load_config_from(Path::new(path)).map_err(|e| figment::Error::from(e.to_string()))
}

#[test]
fn test_toml_profile_fills_defaults() {
    Jail::expect_with(|jail| {
        jail.create_file("config.toml", GARAGE)?;
        let cfg = load("config.toml")?;

        let (name, profile) = cfg.profile(None).map_err(|e| e.to_string())?;
        assert_eq!(name, "garage");
        assert_eq!(profile.poll_interval, 15);
        assert_eq!(profile.stale_multiplier, 10);
        assert_eq!(profile.open_time, 12);
        assert_eq!(profile.close_time, 10);
        assert_eq!(cfg.defaults.output, "table");
        assert_eq!(profile.data_api.as_ref().unwrap().hours_back, 24);
        Ok(())
    });
}

#[test]
fn test_environment_overrides_file() {
    Jail::expect_with(|jail| {
        jail.create_file("config.toml", GARAGE)?;
        jail.set_env("VIAMHUB_PROFILES__GARAGE__POLL_INTERVAL", "60");
        jail.set_env("VIAMHUB_DEFAULTS__OUTPUT", "json");

        let cfg = load("config.toml")?;

        assert_eq!(cfg.profiles["garage"].poll_interval, 60);
        assert_eq!(cfg.defaults.output, "json");
        Ok(())
    });
}

#[test]
fn test_missing_file_yields_defaults() {
    Jail::expect_with(|_jail| {
        let cfg = load("nope.toml")?;
        assert!(cfg.profiles.is_empty());
        assert!(matches!(
            cfg.profile(None),
            Err(ConfigError::UnknownProfile { ref name }) if name == "default"
        ));
        Ok(())
    });
}

#[test]
fn test_profile_translates_to_runtime_config() {
    Jail::expect_with(|jail| {
        jail.create_file("config.toml", GARAGE)?;
        jail.set_env("GARAGE_ORG_KEY", "org-secret");
        let cfg = load("config.toml")?;
        let profile = &cfg.profiles["garage"];

        let device = profile_to_device_config(profile, "garage").map_err(|e| e.to_string())?;
        assert_eq!(device.address, "garage-main.abc123.viam.cloud");
        assert_eq!(device.credentials.api_key_id, "key-id");

        let poll = profile_to_poll_config(profile).map_err(|e| e.to_string())?;
        assert_eq!(poll.interval, Duration::from_secs(15));
        assert_eq!(poll.stale_after(poll.interval), Duration::from_secs(150));

        let data = profile_to_data_api_settings(profile, "garage", &cfg.defaults)
            .map_err(|e| e.to_string())?
            .unwrap();
        assert_eq!(data.robot_id, "garage-main");
        assert_eq!(data.credentials.api_key_id, "org-1");
        assert_eq!(data.credentials.api_key.expose_secret(), "org-secret");
        assert_eq!(data.base_url.as_str(), "https://app.viam.com/");
        Ok(())
    });
}

#[test]
fn test_api_key_env_wins_over_plaintext() {
    Jail::expect_with(|jail| {
        jail.set_env("ROBOT_KEY_FOR_TEST", "from-env");
        let profile = Profile {
            address: "robot.local".into(),
            api_key_id: Some("id".into()),
            api_key: Some("plaintext".into()),
            api_key_env: Some("ROBOT_KEY_FOR_TEST".into()),
            ..Profile::default()
        };

        let device = profile_to_device_config(&profile, "env-test").map_err(|e| e.to_string())?;
        assert_eq!(device.credentials.api_key.expose_secret(), "from-env");
        Ok(())
    });
}

#[test]
fn test_blank_address_is_rejected() {
    let profile = Profile {
        address: "  ".into(),
        api_key_id: Some("id".into()),
        api_key: Some("key".into()),
        ..Profile::default()
    };

    let err = profile_to_device_config(&profile, "blank").unwrap_err();

    assert!(matches!(err, ConfigError::Validation { ref field, .. } if field == "address"));
}

#[test]
fn test_save_then_load_preserves_profiles() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.toml");

    let mut cfg = Config::default();
    cfg.profiles.insert(
        "default".into(),
        Profile {
            address: "shed-main.xyz.viam.cloud".into(),
            api_key_id: Some("id".into()),
            motor_names: vec!["door".into()],
            flip_direction: true,
            data_api: Some(DataApiProfile {
                enabled: true,
                org_id: Some("org".into()),
                ..DataApiProfile::default()
            }),
            ..Profile::default()
        },
    );
    save_config_to(&cfg, &path).unwrap();

    let loaded = load_config_from(&path).unwrap();
    let (_, profile) = loaded.profile(None).unwrap();
    assert_eq!(profile.address, "shed-main.xyz.viam.cloud");
    assert!(profile.flip_direction);
    assert_eq!(profile.motor_names, vec!["door".to_owned()]);
    assert_eq!(profile.data_api.as_ref().unwrap().org_id.as_deref(), Some("org"));
}
