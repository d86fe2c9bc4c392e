// JSON/HTTP implementation of the device transport.
//
// Talks to a REST gateway sitting in front of the robot. Session-level
// calls live in `client`, per-component clients in `components`.

mod client;
mod components;

pub use client::{HttpSession, HttpTransport};
pub use components::{HttpMotor, HttpSensor};

pub(crate) use client::{decode, read_success_body};
