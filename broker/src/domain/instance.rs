//! Domain types for cloud instances and lifecycle requests.
//!
//! Pure data — no I/O, no async. The serde shapes here double as the wire
//! shapes of the compute provider's JSON API.

use std::fmt;

use serde::{Deserialize, Serialize};

// ── Tag schema ────────────────────────────────────────────────────────────────
//
// Tags are the only persisted record linking a provider instance to a service
// instance. The key names below are a compatibility contract with instances
// tagged by earlier deployments and must not change.

pub const TAG_SERVICE_INSTANCE_REF: &str = "service_instance_ref";
pub const TAG_ORG_GUID: &str = "org_guid";
pub const TAG_SPACE_GUID: &str = "space_guid";
pub const TAG_SERVICE_TYPE: &str = "service_type";

/// `service_type` tag value marking instances managed by this broker, as
/// opposed to unrelated instances in the same provider account.
pub const SERVICE_TYPE: &str = "ci_build_agent";

// ── Identity ──────────────────────────────────────────────────────────────────

/// Opaque, caller-supplied identifier naming one logical service instance.
///
/// Stable for the instance's lifetime and the sole correlation key between
/// the service catalog's "instance" and the provider's "machine".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceInstanceRef(String);

impl ServiceInstanceRef {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServiceInstanceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ── Provider resources ────────────────────────────────────────────────────────

/// Key/value pair attached to a provider resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Provider-side lifecycle state of an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InstanceState {
    Pending,
    Running,
    ShuttingDown,
    Terminated,
    Stopping,
    Stopped,
}

impl InstanceState {
    /// Whether an instance in this state counts as existing for ref lookups.
    #[must_use]
    pub fn is_live(self) -> bool {
        matches!(self, Self::Pending | Self::Running)
    }
}

/// One machine at the provider: provider-assigned identity plus tags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloudInstance {
    pub instance_id: String,
    pub instance_type: String,
    pub state: InstanceState,
    #[serde(default)]
    pub tags: Vec<Tag>,
}

/// A provider-level grouping of instances returned by a single launch or
/// lookup call. A ref may map to several reservations (and instances) if a
/// previous operation left orphans, so lifecycle operations always treat
/// "instances for a ref" as the flattened set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub reservation_id: String,
    #[serde(default)]
    pub instances: Vec<CloudInstance>,
}

/// A machine image the provider can boot instances from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    pub image_id: String,
    pub name: String,
}

/// Per-id outcome of a terminate call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceStateChange {
    pub instance_id: String,
    pub previous_state: InstanceState,
    pub current_state: InstanceState,
}

// ── Lifecycle inputs and outputs ──────────────────────────────────────────────

/// Launch parameters for creating instances. The orchestrator always fixes
/// `count` at exactly one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LaunchSpec {
    pub image_id: String,
    pub instance_type: String,
    pub security_group_ids: Vec<String>,
    /// Base64-encoded boot script handed to the instance's boot hook.
    pub user_data: String,
    pub count: u32,
}

/// Read-only input to one lifecycle operation. Not persisted anywhere; the
/// tags attached to the launched instance are the only durable record.
#[derive(Debug, Clone)]
pub struct LifecycleRequest {
    pub service_instance_ref: ServiceInstanceRef,
    pub org_guid: String,
    pub space_guid: String,
    /// Provider instance type resolved from the requested plan.
    pub instance_type: String,
    /// Opaque caller parameters, forwarded into the boot-script template.
    pub parameters: serde_json::Value,
}

/// Result of an accepted lifecycle operation, handed back to the broker
/// surface. The `operation` token feeds the caller's polling mechanism.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptedOperation {
    pub operation: String,
    pub is_async: bool,
}
