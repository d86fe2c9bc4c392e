// In-memory device transport shared by the core integration tests.

#![allow(dead_code, clippy::unwrap_used)]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use viamhub_api::{
    Credentials, DeviceSession, DeviceTransport, Error, Motor, MotorProperties, ReadingValue,
    Readings, ResourceName, Sensor,
};
use viamhub_core::DeviceConfig;

/// How a mock resource answers the discovery probes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behaves {
    Motor,
    Sensor,
    Neither,
    /// Never answers; exercises probe timeouts.
    Hangs,
}

#[derive(Default)]
pub struct MockState {
    pub connect_calls: AtomicUsize,
    pub list_calls: AtomicUsize,
    pub probe_calls: AtomicUsize,
    pub close_calls: AtomicUsize,
    pub fail_connect: AtomicBool,
    pub fail_probe: AtomicBool,
    pub fail_list: AtomicBool,
    pub connect_delay: Mutex<Duration>,
    pub stop_delay: Mutex<Duration>,
    pub resources: Mutex<Vec<(ResourceName, Behaves)>>,
    pub sensor_values: Mutex<HashMap<String, f64>>,
    pub failing_sensors: Mutex<HashSet<String>>,
    pub motor_log: Mutex<Vec<String>>,
}

impl MockState {
    pub fn add(&self, name: &str, behaves: Behaves) {
        let subtype = match behaves {
            Behaves::Motor => "motor",
            Behaves::Sensor => "sensor",
            Behaves::Neither | Behaves::Hangs => "generic",
        };
        self.resources
            .lock()
            .unwrap()
            .push((ResourceName::component(subtype, name), behaves));
    }

    pub fn set_value(&self, sensor: &str, value: f64) {
        self.sensor_values
            .lock()
            .unwrap()
            .insert(sensor.to_owned(), value);
    }

    pub fn set_failing(&self, sensor: &str, failing: bool) {
        let mut set = self.failing_sensors.lock().unwrap();
        if failing {
            set.insert(sensor.to_owned());
        } else {
            set.remove(sensor);
        }
    }

    pub fn connects(&self) -> usize {
        self.connect_calls.load(Ordering::SeqCst)
    }

    pub fn motor_log(&self) -> Vec<String> {
        self.motor_log.lock().unwrap().clone()
    }

    fn behaviour(&self, name: &str) -> Behaves {
        self.resources
            .lock()
            .unwrap()
            .iter()
            .find(|(r, _)| r.name == name)
            .map_or(Behaves::Neither, |(_, b)| *b)
    }
}

#[derive(Clone, Default)]
pub struct MockTransport {
    pub state: Arc<MockState>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DeviceTransport for MockTransport {
    async fn connect(
        &self,
        _address: &str,
        _credentials: &Credentials,
    ) -> Result<Arc<dyn DeviceSession>, Error> {
        self.state.connect_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.state.connect_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.state.fail_connect.load(Ordering::SeqCst) {
            return Err(Error::Api {
                status: 503,
                message: "unreachable".into(),
            });
        }
        Ok(Arc::new(MockSession {
            state: Arc::clone(&self.state),
        }))
    }
}

struct MockSession {
    state: Arc<MockState>,
}

#[async_trait]
impl DeviceSession for MockSession {
    async fn probe(&self) -> Result<(), Error> {
        self.state.probe_calls.fetch_add(1, Ordering::SeqCst);
        if self.state.fail_probe.load(Ordering::SeqCst) {
            return Err(Error::SessionClosed);
        }
        Ok(())
    }

    async fn list_resources(&self) -> Result<Vec<ResourceName>, Error> {
        self.state.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.state.fail_list.load(Ordering::SeqCst) {
            return Err(Error::Api {
                status: 500,
                message: "listing failed".into(),
            });
        }
        Ok(self
            .state
            .resources
            .lock()
            .unwrap()
            .iter()
            .map(|(r, _)| r.clone())
            .collect())
    }

    fn as_motor(&self, resource: &ResourceName) -> Arc<dyn Motor> {
        Arc::new(MockMotor {
            name: resource.name.clone(),
            state: Arc::clone(&self.state),
        })
    }

    fn as_sensor(&self, resource: &ResourceName) -> Arc<dyn Sensor> {
        Arc::new(MockSensor {
            name: resource.name.clone(),
            state: Arc::clone(&self.state),
        })
    }

    async fn close(&self) -> Result<(), Error> {
        self.state.close_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct MockMotor {
    name: String,
    state: Arc<MockState>,
}

impl MockMotor {
    fn log(&self, entry: String) {
        self.state.motor_log.lock().unwrap().push(entry);
    }
}

#[async_trait]
impl Motor for MockMotor {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get_properties(&self) -> Result<MotorProperties, Error> {
        match self.state.behaviour(&self.name) {
            Behaves::Motor => Ok(MotorProperties::default()),
            Behaves::Hangs => std::future::pending().await,
            _ => Err(Error::NotFound {
                name: self.name.clone(),
            }),
        }
    }

    async fn set_power(&self, power_pct: f64) -> Result<(), Error> {
        self.log(format!("{}:set_power:{power_pct}", self.name));
        Ok(())
    }

    async fn stop(&self) -> Result<(), Error> {
        let delay = *self.state.stop_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.log(format!("{}:stop", self.name));
        Ok(())
    }

    async fn go_for(&self, rpm: f64, revolutions: f64) -> Result<(), Error> {
        self.log(format!("{}:go_for:{rpm}:{revolutions}", self.name));
        Ok(())
    }
}

struct MockSensor {
    name: String,
    state: Arc<MockState>,
}

#[async_trait]
impl Sensor for MockSensor {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get_readings(&self) -> Result<Readings, Error> {
        match self.state.behaviour(&self.name) {
            Behaves::Sensor => {}
            Behaves::Hangs => return std::future::pending().await,
            _ => {
                return Err(Error::NotFound {
                    name: self.name.clone(),
                });
            }
        }
        if self.state.failing_sensors.lock().unwrap().contains(&self.name) {
            return Err(Error::Timeout { timeout_secs: 5 });
        }
        let value = self
            .state
            .sensor_values
            .lock()
            .unwrap()
            .get(&self.name)
            .copied()
            .unwrap_or_default();
        Ok(BTreeMap::from([("value".to_owned(), ReadingValue::Number(value))]))
    }
}

pub fn device_config() -> DeviceConfig {
    DeviceConfig::new("garage-main.abc123.viam.cloud", Credentials::new("key-id", "key"))
}
