// Component clients: `/api/v1/components/{name}/{motor|sensor}/...`

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::device::{Motor, MotorProperties, Readings, Sensor};
use crate::error::Error;
use crate::http::client::GatewayClient;

#[derive(Serialize)]
struct SetPowerRequest {
    power_pct: f64,
}

#[derive(Serialize)]
struct GoForRequest {
    rpm: f64,
    revolutions: f64,
}

#[derive(Serialize)]
struct Empty {}

#[derive(Deserialize)]
struct ReadingsResponse {
    #[serde(default)]
    readings: Readings,
}

/// Motor client bound to one named component.
pub struct HttpMotor {
    client: Arc<GatewayClient>,
    name: String,
}

impl HttpMotor {
    pub(crate) fn new(client: Arc<GatewayClient>, name: &str) -> Self {
        Self {
            client,
            name: name.to_owned(),
        }
    }

    fn path<'a>(&'a self, action: &'a str) -> [&'a str; 6] {
        ["api", "v1", "components", self.name.as_str(), "motor", action]
    }
}

#[async_trait]
impl Motor for HttpMotor {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get_properties(&self) -> Result<MotorProperties, Error> {
        self.client.get_json(&self.path("properties")).await
    }

    async fn set_power(&self, power_pct: f64) -> Result<(), Error> {
        self.client
            .post_unit(&self.path("set_power"), &SetPowerRequest { power_pct })
            .await
    }

    async fn stop(&self) -> Result<(), Error> {
        self.client.post_unit(&self.path("stop"), &Empty {}).await
    }

    async fn go_for(&self, rpm: f64, revolutions: f64) -> Result<(), Error> {
        self.client
            .post_unit(&self.path("go_for"), &GoForRequest { rpm, revolutions })
            .await
    }
}

/// Sensor client bound to one named component.
pub struct HttpSensor {
    client: Arc<GatewayClient>,
    name: String,
}

impl HttpSensor {
    pub(crate) fn new(client: Arc<GatewayClient>, name: &str) -> Self {
        Self {
            client,
            name: name.to_owned(),
        }
    }
}

#[async_trait]
impl Sensor for HttpSensor {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get_readings(&self) -> Result<Readings, Error> {
        let resp: ReadingsResponse = self
            .client
            .get_json(&["api", "v1", "components", self.name.as_str(), "sensor", "readings"])
            .await?;
        Ok(resp.readings)
    }
}
