// Cloud data API client
//
// Reads sensor history that the robot has already synced to the cloud.
// Used as an alternative reading source when the robot itself is not
// reachable from the home network.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use url::Url;

use crate::device::{Credentials, ReadingValue, Readings};
use crate::error::Error;
use crate::http::{decode, read_success_body};
use crate::transport::TransportConfig;

pub const DEFAULT_DATA_API_URL: &str = "https://app.viam.com";

/// Default look-back window for "latest reading" queries.
pub const DEFAULT_HOURS_BACK: u32 = 24;

const LATEST_TIMEOUT: Duration = Duration::from_secs(10);
const RANGE_TIMEOUT: Duration = Duration::from_secs(15);

// ── Wire types ───────────────────────────────────────────────────────

#[derive(Serialize)]
struct TabularFilterRequest<'a> {
    filter: Filter<'a>,
    limit: u32,
}

#[derive(Serialize)]
struct Filter<'a> {
    component_name: &'a str,
    robot_id: &'a str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

#[derive(Deserialize)]
struct TabularFilterResponse {
    #[serde(default)]
    data: Vec<TabularRecord>,
}

/// One captured data point.
#[derive(Debug, Clone, Deserialize)]
pub struct TabularRecord {
    #[serde(default)]
    pub time_received: Option<DateTime<Utc>>,
    #[serde(default)]
    pub readings: Vec<NamedReading>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NamedReading {
    pub reading_name: String,
    pub value: ReadingValue,
}

impl TabularRecord {
    pub fn into_readings(self) -> Readings {
        self.readings
            .into_iter()
            .map(|r| (r.reading_name, r.value))
            .collect()
    }
}

// ── Client ───────────────────────────────────────────────────────────

/// Connection settings for [`DataApiClient`].
#[derive(Debug, Clone)]
pub struct DataApiSettings {
    pub base_url: Url,
    /// Organization API key pair.
    pub credentials: Credentials,
    pub robot_id: String,
    pub transport: TransportConfig,
}

/// Lazily-connected cloud data client.
///
/// The underlying HTTP client is created and tested on first use under
/// an async gate, and dropped again on [`shutdown`](Self::shutdown).
pub struct DataApiClient {
    settings: DataApiSettings,
    client: Mutex<Option<reqwest::Client>>,
}

impl DataApiClient {
    pub fn new(settings: DataApiSettings) -> Self {
        Self {
            settings,
            client: Mutex::new(None),
        }
    }

    pub fn robot_id(&self) -> &str {
        &self.settings.robot_id
    }

    /// `true` once a client exists and answered a test query.
    pub async fn ensure_connection(&self) -> bool {
        let mut guard = self.client.lock().await;
        if guard.is_some() {
            return true;
        }

        let client = match self.build_client() {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "failed to build data API client");
                return false;
            }
        };

        let now = Utc::now();
        let test = self
            .query(&client, "test", now - chrono::Duration::hours(1), now, 1, LATEST_TIMEOUT)
            .await;
        match test {
            Ok(_) => {
                info!(robot_id = %self.settings.robot_id, "connected to data API");
                *guard = Some(client);
                true
            }
            Err(e) => {
                warn!(error = %e, "data API connection test failed");
                false
            }
        }
    }

    /// Newest record for `sensor` within the last `hours_back` hours.
    ///
    /// `Ok(None)` means the query succeeded but nothing was captured in
    /// the window.
    pub async fn latest_readings(
        &self,
        sensor: &str,
        hours_back: u32,
    ) -> Result<Option<Readings>, Error> {
        let client = self.connected_client().await?;
        let end = Utc::now();
        let start = end - chrono::Duration::hours(i64::from(hours_back));

        let mut records = self
            .query(&client, sensor, start, end, 1, LATEST_TIMEOUT)
            .await?;
        if records.is_empty() {
            debug!(sensor, "no data in window");
            return Ok(None);
        }
        Ok(Some(records.swap_remove(0).into_readings()))
    }

    /// Up to `limit` records for `sensor` between `start` and `end`.
    pub async fn readings_in_range(
        &self,
        sensor: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<Readings>, Error> {
        let client = self.connected_client().await?;
        let records = self
            .query(&client, sensor, start, end, limit, RANGE_TIMEOUT)
            .await?;
        Ok(records.into_iter().map(TabularRecord::into_readings).collect())
    }

    /// Drop the client; the next call reconnects.
    pub async fn shutdown(&self) {
        if self.client.lock().await.take().is_some() {
            debug!("data API client closed");
        }
    }

    async fn connected_client(&self) -> Result<reqwest::Client, Error> {
        if !self.ensure_connection().await {
            return Err(Error::SessionClosed);
        }
        self.client.lock().await.clone().ok_or(Error::SessionClosed)
    }

    fn build_client(&self) -> Result<reqwest::Client, Error> {
        let creds = &self.settings.credentials;
        let mut headers = HeaderMap::new();
        headers.insert("key_id", header_value(&creds.api_key_id)?);
        headers.insert("key", header_value(creds.api_key.expose_secret())?);
        self.settings.transport.build_client_with_headers(headers)
    }

    async fn query(
        &self,
        client: &reqwest::Client,
        component_name: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: u32,
        timeout: Duration,
    ) -> Result<Vec<TabularRecord>, Error> {
        let url = self.settings.base_url.join("api/v1/data/tabular/filter")?;
        let body = TabularFilterRequest {
            filter: Filter {
                component_name,
                robot_id: &self.settings.robot_id,
                start,
                end,
            },
            limit,
        };

        debug!("POST {}", url);
        let send = async {
            let resp = client.post(url).json(&body).send().await?;
            read_success_body(resp).await
        };
        let text = tokio::time::timeout(timeout, send)
            .await
            .map_err(|_| Error::Timeout {
                timeout_secs: timeout.as_secs(),
            })??;

        let parsed: TabularFilterResponse = decode(&text)?;
        Ok(parsed.data)
    }
}

fn header_value(raw: &str) -> Result<HeaderValue, Error> {
    let mut value = HeaderValue::from_str(raw).map_err(|_| Error::Authentication {
        message: "API key contains characters not allowed in a header".into(),
    })?;
    value.set_sensitive(true);
    Ok(value)
}

/// Robot id as the data API knows it: the first DNS label of the
/// device address (`garage-main.abc123.viam.cloud` → `garage-main`).
pub fn robot_id_from_address(address: &str) -> String {
    let host = address
        .split_once("://")
        .map_or(address, |(_, rest)| rest);
    host.split(['.', ':', '/'])
        .next()
        .unwrap_or_default()
        .to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn robot_id_is_first_label() {
        assert_eq!(robot_id_from_address("garage-main.abc123.viam.cloud"), "garage-main");
        assert_eq!(robot_id_from_address("https://shed.local:8080/x"), "shed");
        assert_eq!(robot_id_from_address("bare"), "bare");
    }

    #[test]
    fn record_flattens_into_readings() {
        let record: TabularRecord = serde_json::from_value(serde_json::json!({
            "time_received": "2026-01-01T00:00:00Z",
            "readings": [
                {"reading_name": "temp", "value": 20.5},
                {"reading_name": "state", "value": "idle"},
            ]
        }))
        .expect("valid record");

        let readings = record.into_readings();
        assert_eq!(readings.len(), 2);
        assert_eq!(readings["temp"], ReadingValue::Number(20.5));
    }
}
