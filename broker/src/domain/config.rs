//! Broker configuration schema and validators.
//!
//! Pure functions only — loading the file from disk lives in
//! `crate::infra::config`.

use serde::{Deserialize, Serialize};

use crate::domain::error::ConfigError;

// ── Defaults ──────────────────────────────────────────────────────────────────

pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_REGION: &str = "eu-west-2";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

// ── Schema ────────────────────────────────────────────────────────────────────

/// Top-level broker configuration, loaded from a YAML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Socket address the broker API binds to.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Compute-provider connection settings.
    pub compute: ComputeConfig,

    /// Service catalog advertised to the platform.
    pub catalog: Catalog,
}

/// Connection settings for the compute provider's API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputeConfig {
    /// Base URL of the compute API.
    pub endpoint: String,

    /// Provider region every call is scoped to.
    #[serde(default = "default_region")]
    pub region: String,

    /// Bearer token for the compute API, if it requires one.
    #[serde(default)]
    pub api_token: Option<String>,

    /// Per-call timeout. There is no overall per-operation deadline.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Security group attached to every launched instance.
    pub security_group_id: String,

    /// Owner account of the agent machine image.
    pub image_owner: String,

    /// Name filter selecting the agent machine image.
    pub image_name: String,
}

/// The single service offering this broker advertises.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Catalog {
    pub service_id: String,
    pub service_name: String,
    #[serde(default)]
    pub description: String,
    pub plans: Vec<Plan>,
}

/// One service plan. The plan resolves to a provider instance type; a plan
/// change therefore means replacing instances, not resizing them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub id: String,
    pub name: String,
    pub instance_type: String,
    #[serde(default)]
    pub description: String,
}

fn default_listen_addr() -> String {
    DEFAULT_LISTEN_ADDR.to_string()
}

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

// ── Validation and lookups ────────────────────────────────────────────────────

impl BrokerConfig {
    /// Check the parts of the configuration that have no usable default.
    ///
    /// # Errors
    ///
    /// Returns the first `ConfigError` encountered.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.compute.endpoint.trim().is_empty() {
            return Err(ConfigError::MissingEndpoint);
        }
        if self.compute.security_group_id.trim().is_empty() {
            return Err(ConfigError::MissingSecurityGroup);
        }
        if self.compute.image_owner.trim().is_empty() || self.compute.image_name.trim().is_empty() {
            return Err(ConfigError::MissingImage);
        }
        if self.catalog.plans.is_empty() {
            return Err(ConfigError::NoPlans);
        }
        for plan in &self.catalog.plans {
            if plan.instance_type.trim().is_empty() {
                return Err(ConfigError::EmptyInstanceType(plan.id.clone()));
            }
        }
        Ok(())
    }
}

impl Catalog {
    /// Look up a plan by its catalog id.
    #[must_use]
    pub fn plan(&self, plan_id: &str) -> Option<&Plan> {
        self.plans.iter().find(|p| p.id == plan_id)
    }
}
