// viamhub-api: device transport traits and HTTP clients.
//
// `device` is the boundary the core programs against; `http` is the
// JSON/HTTP gateway implementation of it; `data_api` reads synced sensor
// history from the cloud.

pub mod data_api;
pub mod device;
pub mod error;
pub mod http;
pub mod transport;

pub use data_api::{DataApiClient, DataApiSettings, robot_id_from_address};
pub use device::{
    Credentials, DeviceSession, DeviceTransport, Motor, MotorProperties, ReadingValue, Readings,
    ResourceName, Sensor,
};
pub use error::Error;
pub use http::{HttpSession, HttpTransport};
pub use transport::{TlsMode, TransportConfig};
