// ── Device SDK boundary ──
//
// Everything the core is allowed to do against a remote robot: connect,
// list resources, instantiate capability clients, invoke them, close.
// Implementations must be cheap to clone into `Arc`s; the core holds
// capability clients for as long as a discovery pass keeps them.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::error::Error;

// ── Credentials ──────────────────────────────────────────────────────

/// API key pair used to authenticate against a robot (or the cloud API).
#[derive(Debug, Clone)]
pub struct Credentials {
    /// Public key identifier.
    pub api_key_id: String,
    /// Secret key material.
    pub api_key: SecretString,
}

impl Credentials {
    pub fn new(api_key_id: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            api_key_id: api_key_id.into(),
            api_key: SecretString::from(api_key.into()),
        }
    }
}

// ── Resource identifiers ─────────────────────────────────────────────

/// A resource as reported by the robot's resource listing.
///
/// The `subtype` is advisory only: gateways are known to report generic
/// subtypes, so the core classifies resources by probing instead.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceName {
    #[serde(default)]
    pub namespace: String,
    #[serde(rename = "type", default)]
    pub resource_type: String,
    #[serde(default)]
    pub subtype: String,
    pub name: String,
}

impl ResourceName {
    /// A component resource in the default `rdk` namespace.
    pub fn component(subtype: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: "rdk".into(),
            resource_type: "component".into(),
            subtype: subtype.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ResourceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}/{}",
            self.namespace, self.resource_type, self.subtype, self.name
        )
    }
}

// ── Readings ─────────────────────────────────────────────────────────

/// A single sensor field value.
///
/// Numeric and text values are the ones home-automation entities can
/// display; anything else is kept verbatim for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReadingValue {
    Number(f64),
    Text(String),
    Other(serde_json::Value),
}

impl ReadingValue {
    /// `true` for numeric and text values.
    pub fn is_scalar(&self) -> bool {
        matches!(self, Self::Number(_) | Self::Text(_))
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }
}

impl fmt::Display for ReadingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
            Self::Other(v) => write!(f, "{v}"),
        }
    }
}

impl From<f64> for ReadingValue {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

impl From<&str> for ReadingValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_owned())
    }
}

/// Field name → value, as returned by one sensor read.
pub type Readings = BTreeMap<String, ReadingValue>;

/// Static motor capabilities reported by `get_properties`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MotorProperties {
    #[serde(default)]
    pub position_reporting: bool,
}

// ── Capability traits ────────────────────────────────────────────────

/// An actuator resource.
#[async_trait]
pub trait Motor: Send + Sync {
    fn name(&self) -> &str;

    /// Cheap read-only call; used by discovery to confirm the resource
    /// really is a motor.
    async fn get_properties(&self) -> Result<MotorProperties, Error>;

    /// Drive at a fraction of full power in `[-1.0, 1.0]`.
    async fn set_power(&self, power_pct: f64) -> Result<(), Error>;

    async fn stop(&self) -> Result<(), Error>;

    /// Turn `revolutions` at `rpm`; negative values reverse.
    async fn go_for(&self, rpm: f64, revolutions: f64) -> Result<(), Error>;
}

/// A reading source resource.
#[async_trait]
pub trait Sensor: Send + Sync {
    fn name(&self) -> &str;

    async fn get_readings(&self) -> Result<Readings, Error>;
}

// ── Session / transport ──────────────────────────────────────────────

/// One authenticated connection to one robot.
#[async_trait]
pub trait DeviceSession: Send + Sync {
    /// Cheap no-op round trip used as a liveness check.
    async fn probe(&self) -> Result<(), Error>;

    async fn list_resources(&self) -> Result<Vec<ResourceName>, Error>;

    /// Build a motor client for `resource`. No I/O happens here; the
    /// resource may turn out not to be a motor on first use.
    fn as_motor(&self, resource: &ResourceName) -> Arc<dyn Motor>;

    /// Build a sensor client for `resource`. No I/O happens here.
    fn as_sensor(&self, resource: &ResourceName) -> Arc<dyn Sensor>;

    /// Release the connection. Calling it twice is allowed.
    async fn close(&self) -> Result<(), Error>;
}

/// Factory for [`DeviceSession`]s.
#[async_trait]
pub trait DeviceTransport: Send + Sync {
    async fn connect(
        &self,
        address: &str,
        credentials: &Credentials,
    ) -> Result<Arc<dyn DeviceSession>, Error>;
}
