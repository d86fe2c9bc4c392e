// ── Capability model ──
//
// Discovery turns the robot's resource listing into a registry of typed
// handles. The registry is immutable once built; the manager swaps in a
// new one after each successful scan.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use strum::{Display, EnumString};
use tracing::debug;
use viamhub_api::{Motor, ResourceName, Sensor};

/// What discovery decided a resource is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CapabilityKind {
    Motor,
    Sensor,
    Unknown,
}

/// A classified resource together with its client.
#[derive(Clone)]
pub enum Capability {
    Motor(Arc<dyn Motor>),
    Sensor(Arc<dyn Sensor>),
    /// Answered neither probe. Kept for diagnostics only.
    Unknown(ResourceName),
}

impl Capability {
    pub fn kind(&self) -> CapabilityKind {
        match self {
            Self::Motor(_) => CapabilityKind::Motor,
            Self::Sensor(_) => CapabilityKind::Sensor,
            Self::Unknown(_) => CapabilityKind::Unknown,
        }
    }
}

impl fmt::Debug for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Motor(m) => f.debug_tuple("Motor").field(&m.name()).finish(),
            Self::Sensor(s) => f.debug_tuple("Sensor").field(&s.name()).finish(),
            Self::Unknown(r) => f.debug_tuple("Unknown").field(r).finish(),
        }
    }
}

/// One registry entry.
#[derive(Debug, Clone)]
pub struct CapabilityHandle {
    pub resource: ResourceName,
    pub capability: Capability,
}

impl CapabilityHandle {
    pub fn name(&self) -> &str {
        &self.resource.name
    }

    pub fn kind(&self) -> CapabilityKind {
        self.capability.kind()
    }

    pub fn as_motor(&self) -> Option<&Arc<dyn Motor>> {
        match &self.capability {
            Capability::Motor(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_sensor(&self) -> Option<&Arc<dyn Sensor>> {
        match &self.capability {
            Capability::Sensor(s) => Some(s),
            _ => None,
        }
    }
}

/// Name → handle map produced by one discovery pass.
#[derive(Debug, Clone, Default)]
pub struct CapabilityRegistry {
    entries: HashMap<String, CapabilityHandle>,
}

impl CapabilityRegistry {
    /// Build a registry, keeping one handle per name.
    ///
    /// If a name shows up twice, a classified handle wins over `Unknown`;
    /// otherwise the first one listed is kept.
    pub fn from_handles(handles: impl IntoIterator<Item = CapabilityHandle>) -> Self {
        let mut entries: HashMap<String, CapabilityHandle> = HashMap::new();
        for handle in handles {
            let name = handle.name().to_owned();
            let replace = match entries.get(&name) {
                None => true,
                Some(existing) => {
                    let upgrade = existing.kind() == CapabilityKind::Unknown
                        && handle.kind() != CapabilityKind::Unknown;
                    debug!(
                        name = %name,
                        existing = %existing.kind(),
                        incoming = %handle.kind(),
                        upgrade,
                        "duplicate resource name"
                    );
                    upgrade
                }
            };
            if replace {
                entries.insert(name, handle);
            }
        }
        Self { entries }
    }

    pub fn get(&self, name: &str) -> Option<&CapabilityHandle> {
        self.entries.get(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Count of entries that discovery classified as motor or sensor.
    pub fn classified_count(&self) -> usize {
        self.entries
            .values()
            .filter(|h| h.kind() != CapabilityKind::Unknown)
            .count()
    }

    pub fn count_of(&self, kind: CapabilityKind) -> usize {
        self.entries.values().filter(|h| h.kind() == kind).count()
    }

    pub fn motors(&self) -> BTreeMap<String, Arc<dyn Motor>> {
        self.entries
            .iter()
            .filter_map(|(name, h)| h.as_motor().map(|m| (name.clone(), Arc::clone(m))))
            .collect()
    }

    pub fn sensors(&self) -> BTreeMap<String, Arc<dyn Sensor>> {
        self.entries
            .iter()
            .filter_map(|(name, h)| h.as_sensor().map(|s| (name.clone(), Arc::clone(s))))
            .collect()
    }

    /// Every entry, sorted by name.
    pub fn handles(&self) -> Vec<CapabilityHandle> {
        let mut all: Vec<_> = self.entries.values().cloned().collect();
        all.sort_by(|a, b| a.name().cmp(b.name()));
        all
    }
}

/// Friendly robot name for display.
///
/// Cloud addresses look like `garage-main.abc123.viam.cloud`; the first
/// label minus its `-main` part suffix is the robot's name. Anything else
/// is returned as given.
pub fn robot_display_name(address: &str) -> &str {
    if !address.ends_with(".viam.cloud") {
        return address;
    }
    let first = address.split('.').next().unwrap_or(address);
    first.strip_suffix("-main").unwrap_or(first)
}
