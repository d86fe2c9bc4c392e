// viamhub-core: connection lifecycle and data-freshness engine.
//
// `ConnectionManager` keeps one robot session alive and serves cached
// capability handles; `Coordinator` polls sensors through a
// `ReadingSource` and tracks per-sensor staleness; `Cover` drives a motor
// as a timed actuator. Nothing here reads config files.

pub mod backoff;
pub mod config;
pub mod coordinator;
pub mod cover;
pub mod discovery;
pub mod error;
pub mod listener;
pub mod manager;
pub mod model;
pub mod session;

pub use config::{BackoffConfig, CoverConfig, DeviceConfig, PollConfig, Timeouts};
pub use coordinator::{
    Coordinator, DataApiSource, DeviceSource, ReadingSet, ReadingSource, RefreshOutcome,
};
pub use cover::{Cover, CoverState};
pub use error::CoreError;
pub use listener::{ListenerId, Listeners};
pub use manager::{ConnectionManager, ConnectionState, ConnectionSummary};
pub use model::{
    Capability, CapabilityHandle, CapabilityKind, CapabilityRegistry, robot_display_name,
};
pub use session::Session;
