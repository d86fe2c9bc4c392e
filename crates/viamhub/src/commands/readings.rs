//! `viamhub readings`: run one refresh cycle and print what it produced.

use std::sync::Arc;

use serde::Serialize;
use tabled::Tabled;
use viamhub_api::{DataApiClient, ReadingValue};
use viamhub_core::{Coordinator, DataApiSource, DeviceSource, ReadingSource, RefreshOutcome};

use crate::cli::{GlobalOpts, OutputFormat, ReadingsArgs, SourceKind};
use crate::error::CliError;
use crate::output;

use super::util::Runtime;

// ── Source selection ─────────────────────────────────────────────────

/// A reading source plus the cloud client behind it, if any.
pub struct Source {
    pub reader: Arc<dyn ReadingSource>,
    pub cloud: Option<Arc<DataApiClient>>,
}

impl Source {
    pub async fn shutdown(&self) {
        if let Some(ref client) = self.cloud {
            client.shutdown().await;
        }
    }
}

/// Pick the device or the cloud data API. `Auto` prefers the cloud when
/// the profile enables it.
pub fn build_source(
    rt: &Runtime,
    kind: SourceKind,
    sensors: &[String],
) -> Result<Source, CliError> {
    let resolved = &rt.resolved;
    let settings = viamhub_config::profile_to_data_api_settings(
        &resolved.profile,
        &resolved.profile_name,
        &resolved.defaults,
    )?;

    match (kind, settings) {
        (SourceKind::Device, _) | (SourceKind::Auto, None) => Ok(Source {
            reader: Arc::new(DeviceSource::new(rt.manager.clone())),
            cloud: None,
        }),
        (SourceKind::Cloud, None) => Err(CliError::Validation {
            field: "source".into(),
            reason: format!(
                "the data API is not enabled for profile '{}'",
                resolved.profile_name
            ),
        }),
        (SourceKind::Cloud | SourceKind::Auto, Some(settings)) => {
            let data = resolved.profile.data_api.clone().unwrap_or_default();
            let names = if sensors.is_empty() {
                data.sensor_names
            } else {
                sensors.to_vec()
            };
            if names.is_empty() {
                return Err(CliError::Validation {
                    field: "data_api.sensor_names".into(),
                    reason: "name at least one sensor (or pass --sensor)".into(),
                });
            }
            let client = Arc::new(DataApiClient::new(settings));
            Ok(Source {
                reader: Arc::new(DataApiSource::new(
                    Arc::clone(&client),
                    names,
                    data.hours_back,
                )),
                cloud: Some(client),
            })
        }
    }
}

// ── Rows ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct ReadingView {
    pub sensor: String,
    pub reading: String,
    pub value: ReadingValue,
    pub age_secs: Option<u64>,
    pub stale: bool,
}

#[derive(Tabled)]
pub struct ReadingRow {
    #[tabled(rename = "Sensor")]
    sensor: String,
    #[tabled(rename = "Reading")]
    reading: String,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Age")]
    age: String,
    #[tabled(rename = "Stale")]
    stale: String,
}

impl From<&ReadingView> for ReadingRow {
    fn from(v: &ReadingView) -> Self {
        Self {
            sensor: v.sensor.clone(),
            reading: v.reading.clone(),
            value: v.value.to_string(),
            age: output::age(v.age_secs.map(std::time::Duration::from_secs)),
            stale: if v.stale { "yes".into() } else { String::new() },
        }
    }
}

/// Flatten the coordinator's current set, optionally filtered by sensor.
pub fn collect_views(coordinator: &Coordinator, filter: &[String]) -> Vec<ReadingView> {
    let set = coordinator.readings();
    set.iter()
        .filter(|(sensor, _)| filter.is_empty() || filter.contains(sensor))
        .flat_map(|(sensor, readings)| {
            let age = coordinator.age(sensor).map(|d| d.as_secs());
            let stale = coordinator.is_stale(sensor);
            readings.iter().map(move |(reading, value)| ReadingView {
                sensor: sensor.clone(),
                reading: reading.clone(),
                value: value.clone(),
                age_secs: age,
                stale,
            })
        })
        .collect()
}

pub fn render(views: &[ReadingView], format: OutputFormat) -> String {
    output::render_list(format, views, |v| ReadingRow::from(v), |v| {
        format!("{}.{}={}", v.sensor, v.reading, v.value)
    })
}

// ── Handler ──────────────────────────────────────────────────────────

pub async fn handle(rt: &Runtime, args: ReadingsArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let source = build_source(rt, args.source, &args.sensor)?;
    let poll = viamhub_config::profile_to_poll_config(&rt.resolved.profile)?;
    let coordinator = Coordinator::new(Arc::clone(&source.reader), poll)?;

    let outcome = coordinator.refresh_now().await;
    let views = collect_views(&coordinator, &args.sensor);
    coordinator.shutdown().await;
    source.shutdown().await;

    match outcome {
        RefreshOutcome::Skipped => {
            return Err(CliError::ConnectionFailed {
                address: rt.address().to_owned(),
            });
        }
        RefreshOutcome::Crashed | RefreshOutcome::ShutDown => {
            return Err(CliError::ApiError {
                code: "refresh".into(),
                message: "the refresh cycle did not complete".into(),
            });
        }
        RefreshOutcome::Completed { failed, .. } if failed > 0 && !global.quiet => {
            eprintln!("warning: {failed} sensor(s) could not be read (run with -v for details)");
        }
        RefreshOutcome::Completed { .. } => {}
    }

    output::print_output(&render(&views, global.output), global.quiet);
    Ok(())
}
