//! JSON-over-HTTP adapter for the `ComputeClient` port.
//!
//! One POST per provider action, bounded by the configured per-call timeout.
//! The adapter owns no state beyond the configured region (carried in every
//! request body) and the HTTP agent; request bodies are built by pure
//! functions so the wire shapes can be tested without a network.

use std::time::Duration;

use serde::Deserialize;
use serde_json::{Value, json};

use crate::application::ports::ComputeClient;
use crate::domain::config::ComputeConfig;
use crate::domain::error::ProviderError;
use crate::domain::instance::{
    Image, InstanceStateChange, LaunchSpec, Reservation, ServiceInstanceRef, Tag,
    TAG_SERVICE_INSTANCE_REF,
};

// ── Request bodies ────────────────────────────────────────────────────────────

/// Body for a `LaunchInstances` call. `count` feeds both min and max, so a
/// launch either creates exactly `count` instances or nothing.
#[must_use]
pub fn launch_body(spec: &LaunchSpec, region: &str) -> Value {
    json!({
        "region": region,
        "image_id": spec.image_id,
        "instance_type": spec.instance_type,
        "security_group_ids": spec.security_group_ids,
        "user_data": spec.user_data,
        "min_count": spec.count,
        "max_count": spec.count,
    })
}

/// Body for a `TerminateInstances` call.
#[must_use]
pub fn terminate_body(instance_ids: &[String], region: &str) -> Value {
    json!({
        "region": region,
        "instance_ids": instance_ids,
    })
}

/// Body for a `CreateTags` call.
#[must_use]
pub fn tag_body(instance_id: &str, tags: &[Tag], region: &str) -> Value {
    json!({
        "region": region,
        "resource_id": instance_id,
        "tags": tags,
    })
}

/// Body for the ref lookup: a `DescribeInstances` call filtered on the ref
/// tag and the live instance states. The ref travels as a JSON value, never
/// interpolated into a filter expression, so filter-significant characters
/// in a ref cannot change the query.
#[must_use]
pub fn describe_instances_body(service_ref: &ServiceInstanceRef, region: &str) -> Value {
    json!({
        "region": region,
        "filters": [
            {
                "name": format!("tag:{TAG_SERVICE_INSTANCE_REF}"),
                "values": [service_ref.as_str()],
            },
            {
                "name": "instance-state-name",
                "values": ["running", "pending"],
            },
        ],
    })
}

/// Body for a `DescribeImages` call.
#[must_use]
pub fn describe_images_body(owner: &str, name: &str, region: &str) -> Value {
    json!({
        "region": region,
        "owners": [owner],
        "filters": [
            { "name": "name", "values": [name] },
        ],
    })
}

// ── Response shapes ───────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct TerminateResponse {
    #[serde(default)]
    state_changes: Vec<InstanceStateChange>,
}

#[derive(Deserialize)]
struct DescribeInstancesResponse {
    #[serde(default)]
    reservations: Vec<Reservation>,
}

#[derive(Deserialize)]
struct DescribeImagesResponse {
    #[serde(default)]
    images: Vec<Image>,
}

// ── Adapter ───────────────────────────────────────────────────────────────────

/// Production `ComputeClient` speaking the provider's JSON API.
pub struct HttpComputeClient {
    agent: ureq::Agent,
    endpoint: String,
    region: String,
    api_token: Option<String>,
}

impl HttpComputeClient {
    #[must_use]
    pub fn new(config: &ComputeConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build();
        Self {
            agent,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            region: config.region.clone(),
            api_token: config.api_token.clone(),
        }
    }

    /// One provider round trip: POST the body to `{endpoint}/{action}` and
    /// decode the JSON response.
    fn call<T: for<'de> Deserialize<'de>>(
        &self,
        action: &'static str,
        body: Value,
    ) -> Result<T, ProviderError> {
        let url = format!("{}/{}", self.endpoint, action);
        let request = self.agent.post(&url);
        let request = match &self.api_token {
            Some(token) => request.set("Authorization", &format!("Bearer {token}")),
            None => request,
        };

        match request.send_json(body) {
            Ok(response) => response
                .into_json::<T>()
                .map_err(|err| ProviderError::Malformed {
                    action,
                    message: err.to_string(),
                }),
            Err(ureq::Error::Status(status, response)) => {
                let message = response.into_string().unwrap_or_default();
                Err(ProviderError::Rejected {
                    action,
                    status,
                    message,
                })
            }
            Err(err) => Err(ProviderError::Transport {
                action,
                message: err.to_string(),
            }),
        }
    }
}

impl ComputeClient for HttpComputeClient {
    fn launch(&self, spec: &LaunchSpec) -> Result<Reservation, ProviderError> {
        self.call("LaunchInstances", launch_body(spec, &self.region))
    }

    fn terminate(&self, instance_ids: &[String]) -> Result<Vec<InstanceStateChange>, ProviderError> {
        // Nothing to terminate is a success, not a wire call.
        if instance_ids.is_empty() {
            return Ok(Vec::new());
        }
        let response: TerminateResponse = self.call(
            "TerminateInstances",
            terminate_body(instance_ids, &self.region),
        )?;
        Ok(response.state_changes)
    }

    fn tag(&self, instance_id: &str, tags: &[Tag]) -> Result<(), ProviderError> {
        let _: Value = self.call("CreateTags", tag_body(instance_id, tags, &self.region))?;
        Ok(())
    }

    fn find_by_ref(
        &self,
        service_ref: &ServiceInstanceRef,
    ) -> Result<Vec<Reservation>, ProviderError> {
        let response: DescribeInstancesResponse = self.call(
            "DescribeInstances",
            describe_instances_body(service_ref, &self.region),
        )?;
        Ok(response.reservations)
    }

    fn find_image(&self, owner: &str, name: &str) -> Result<Image, ProviderError> {
        let response: DescribeImagesResponse = self.call(
            "DescribeImages",
            describe_images_body(owner, name, &self.region),
        )?;
        response
            .images
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::ImageNotFound {
                owner: owner.to_string(),
                name: name.to_string(),
            })
    }
}
