// ── Capability discovery ──
//
// The robot's resource listing cannot be trusted to report the right
// subtype, so every resource is classified by asking it to behave as a
// motor, then as a sensor. Whatever answers first wins.

use std::time::Duration;

use futures_util::future::join_all;
use tracing::{debug, info};
use viamhub_api::{DeviceSession, ResourceName};

use crate::error::{CoreError, with_timeout};
use crate::model::{Capability, CapabilityHandle, CapabilityKind, CapabilityRegistry};
use crate::session::Session;

/// Classify one resource by probing it.
///
/// Never fails: a resource that answers neither probe in time is
/// returned as [`Capability::Unknown`].
pub async fn classify(
    device: &dyn DeviceSession,
    resource: ResourceName,
    probe_timeout: Duration,
) -> CapabilityHandle {
    let motor = device.as_motor(&resource);
    match with_timeout("motor probe", probe_timeout, motor.get_properties()).await {
        Ok(_) => {
            return CapabilityHandle {
                resource,
                capability: Capability::Motor(motor),
            };
        }
        Err(e) => debug!(resource = %resource, error = %e, "not a motor"),
    }

    let sensor = device.as_sensor(&resource);
    match with_timeout("sensor probe", probe_timeout, sensor.get_readings()).await {
        Ok(_) => {
            return CapabilityHandle {
                resource,
                capability: Capability::Sensor(sensor),
            };
        }
        Err(e) => debug!(resource = %resource, error = %e, "not a sensor"),
    }

    debug!(resource = %resource, "unclassified resource");
    CapabilityHandle {
        capability: Capability::Unknown(resource.clone()),
        resource,
    }
}

/// List every resource on `session` and classify them concurrently.
///
/// Only a failed listing fails the scan; per-resource problems end up as
/// `Unknown` entries.
pub async fn discover(
    session: &Session,
    list_timeout: Duration,
    probe_timeout: Duration,
) -> Result<CapabilityRegistry, CoreError> {
    let device = session.device();
    let resources = with_timeout("list resources", list_timeout, device.list_resources()).await?;
    debug!(count = resources.len(), "resources listed");

    let handles = join_all(
        resources
            .into_iter()
            .map(|resource| classify(device, resource, probe_timeout)),
    )
    .await;

    let registry = CapabilityRegistry::from_handles(handles);
    info!(
        motors = registry.count_of(CapabilityKind::Motor),
        sensors = registry.count_of(CapabilityKind::Sensor),
        unknown = registry.count_of(CapabilityKind::Unknown),
        "discovery complete"
    );
    Ok(registry)
}
