//! Application service — instance lifecycle orchestration.
//!
//! Owns the tagging scheme that makes instances discoverable by ref, the
//! launch→tag compensation saga, and the rolling-replacement update. All
//! provider access goes through the injected `ComputeClient` port; the set
//! of live tagged instances at the provider is the only source of truth for
//! "does this service instance exist" — there is no local index.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use tracing::warn;

use crate::application::ports::{BootScriptRenderer, ComputeClient};
use crate::domain::error::{LifecycleError, ProviderError};
use crate::domain::instance::{
    AcceptedOperation, CloudInstance, LaunchSpec, LifecycleRequest, Reservation,
    SERVICE_TYPE, ServiceInstanceRef, TAG_ORG_GUID, TAG_SERVICE_INSTANCE_REF, TAG_SERVICE_TYPE,
    TAG_SPACE_GUID, Tag,
};

// ── Settings ──────────────────────────────────────────────────────────────────

/// Fixed launch-time settings shared by every instance this broker creates.
#[derive(Debug, Clone)]
pub struct LaunchSettings {
    pub security_group_id: String,
    pub image_owner: String,
    pub image_name: String,
}

// ── Provisioner ───────────────────────────────────────────────────────────────

/// Lifecycle orchestrator over a compute client and a boot-script renderer.
pub struct Provisioner<C, B> {
    compute: C,
    boot_script: B,
    settings: LaunchSettings,
}

impl<C: ComputeClient, B: BootScriptRenderer> Provisioner<C, B> {
    pub fn new(compute: C, boot_script: B, settings: LaunchSettings) -> Self {
        Self {
            compute,
            boot_script,
            settings,
        }
    }

    /// Provision one instance for the request's service ref.
    ///
    /// The duplicate guard is read-then-act against the provider: the ref
    /// lookup and the launch/tag sequence are not atomic, so two concurrent
    /// provision calls for the same ref can both pass the guard. Callers
    /// needing exactly-once semantics per ref must serialize their calls.
    ///
    /// # Errors
    ///
    /// `Duplicate` when the ref already resolves to a live instance;
    /// `Provider` when the lookup or launch fails (a launch failure leaves
    /// nothing to clean up); `TaggingFailed` / `CompensationFailed` per the
    /// compensation outcome in [`run_instance`](Self::run_instance).
    pub fn provision(
        &self,
        request: &LifecycleRequest,
    ) -> Result<AcceptedOperation, LifecycleError> {
        let existing = self.compute.find_by_ref(&request.service_instance_ref)?;
        if existing.iter().any(|r| !r.instances.is_empty()) {
            return Err(LifecycleError::Duplicate(
                request.service_instance_ref.clone(),
            ));
        }

        let instance_id = self.run_instance(request)?;
        Ok(AcceptedOperation {
            operation: instance_id,
            is_async: true,
        })
    }

    /// Terminate every live instance tagged with `service_ref`.
    ///
    /// Deprovisioning a ref with no instances succeeds with an empty token:
    /// an instance that is already gone is not an error.
    ///
    /// # Errors
    ///
    /// Returns a `Provider` error when the lookup or terminate call fails.
    pub fn deprovision(
        &self,
        service_ref: &ServiceInstanceRef,
    ) -> Result<AcceptedOperation, LifecycleError> {
        let reservations = self.compute.find_by_ref(service_ref)?;
        let instance_ids: Vec<String> = instances(&reservations)
            .map(|i| i.instance_id.clone())
            .collect();
        self.compute.terminate(&instance_ids)?;
        Ok(AcceptedOperation {
            operation: instance_ids.join(","),
            is_async: true,
        })
    }

    /// Replace every instance of the ref whose type differs from the
    /// requested one. Rolling replacement, not in-place resize: each
    /// mismatched instance gets a freshly launched, identically tagged
    /// successor before the old one is terminated.
    ///
    /// Per-instance failures never abort the remaining instances. When a
    /// replacement cannot be created, the old instance is left running —
    /// terminating it would turn a partial failure into an outage.
    ///
    /// # Errors
    ///
    /// `Provider` when the initial lookup fails; `PartialUpdate`, carrying
    /// the created and terminated id lists, when any per-instance step
    /// failed.
    pub fn update(&self, request: &LifecycleRequest) -> Result<AcceptedOperation, LifecycleError> {
        let reservations = self.compute.find_by_ref(&request.service_instance_ref)?;

        let mut created: Vec<String> = Vec::new();
        let mut terminated: Vec<String> = Vec::new();
        let mut failures: Vec<String> = Vec::new();

        for instance in instances(&reservations) {
            if instance.instance_type == request.instance_type {
                continue;
            }

            let replacement_id = match self.run_instance(request) {
                Ok(id) => id,
                Err(err) => {
                    warn!(
                        instance_id = %instance.instance_id,
                        error = %err,
                        "replacement launch failed; leaving the old instance running"
                    );
                    failures.push(err.to_string());
                    continue;
                }
            };
            created.push(replacement_id);

            match self
                .compute
                .terminate(std::slice::from_ref(&instance.instance_id))
            {
                Ok(_) => terminated.push(instance.instance_id.clone()),
                Err(err) => {
                    warn!(
                        instance_id = %instance.instance_id,
                        error = %err,
                        "termination of replaced instance failed"
                    );
                    failures.push(err.to_string());
                }
            }
        }

        if failures.is_empty() {
            Ok(AcceptedOperation {
                operation: format!(
                    "terminated: [{}], created: [{}]",
                    terminated.join(","),
                    created.join(",")
                ),
                is_async: true,
            })
        } else {
            Err(LifecycleError::PartialUpdate {
                created,
                terminated,
                failures,
            })
        }
    }

    /// # Errors
    ///
    /// Always `NotSupported`: boot progress is reported through the
    /// platform's own polling, not through this broker.
    pub fn last_operation(&self) -> Result<AcceptedOperation, LifecycleError> {
        Err(LifecycleError::NotSupported("last_operation"))
    }

    /// # Errors
    ///
    /// Always `NotSupported`: agents register with their CI server via the
    /// boot script; there are no credentials to issue.
    pub fn bind(&self) -> Result<AcceptedOperation, LifecycleError> {
        Err(LifecycleError::NotSupported("bind"))
    }

    /// # Errors
    ///
    /// Always `NotSupported`.
    pub fn unbind(&self) -> Result<AcceptedOperation, LifecycleError> {
        Err(LifecycleError::NotSupported("unbind"))
    }

    /// Launch and tag one instance for `request`, compensating on failure.
    ///
    /// Launch and tag are two provider calls with no cross-call atomicity,
    /// so a tag failure triggers a compensating terminate of the orphan. If
    /// that terminate also fails the error escalates to
    /// `CompensationFailed`, the one state that needs manual cleanup.
    fn run_instance(&self, request: &LifecycleRequest) -> Result<String, LifecycleError> {
        let script = self.boot_script.render(&request.parameters)?;
        let user_data = BASE64.encode(script);

        let image = self
            .compute
            .find_image(&self.settings.image_owner, &self.settings.image_name)?;

        let reservation = self.compute.launch(&LaunchSpec {
            image_id: image.image_id,
            instance_type: request.instance_type.clone(),
            security_group_ids: vec![self.settings.security_group_id.clone()],
            user_data,
            count: 1,
        })?;
        let instance_id = reservation
            .instances
            .first()
            .map(|i| i.instance_id.clone())
            .ok_or_else(|| ProviderError::Malformed {
                action: "LaunchInstances",
                message: "reservation contains no instances".to_string(),
            })?;

        if let Err(tag_error) = self.compute.tag(&instance_id, &lifecycle_tags(request)) {
            return Err(
                match self.compute.terminate(std::slice::from_ref(&instance_id)) {
                    Ok(_) => LifecycleError::TaggingFailed {
                        instance_id,
                        tag_error,
                    },
                    Err(terminate_error) => LifecycleError::CompensationFailed {
                        instance_id,
                        tag_error,
                        terminate_error,
                    },
                },
            );
        }

        Ok(instance_id)
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Flatten reservations into their instances.
fn instances(reservations: &[Reservation]) -> impl Iterator<Item = &CloudInstance> {
    reservations.iter().flat_map(|r| r.instances.iter())
}

/// The tag set that makes an instance discoverable by ref lookups and
/// attributable to its org and space.
fn lifecycle_tags(request: &LifecycleRequest) -> Vec<Tag> {
    vec![
        Tag::new(
            TAG_SERVICE_INSTANCE_REF,
            request.service_instance_ref.as_str(),
        ),
        Tag::new(TAG_ORG_GUID, request.org_guid.clone()),
        Tag::new(TAG_SPACE_GUID, request.space_guid.clone()),
        Tag::new(TAG_SERVICE_TYPE, SERVICE_TYPE),
    ]
}
