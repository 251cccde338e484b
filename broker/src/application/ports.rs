//! Port trait definitions for the application layer.
//!
//! Ports are the contracts infrastructure must fulfill. This file imports
//! only from `crate::domain` — never from `crate::infra` or `crate::api`.

use anyhow::Result;

use crate::domain::error::ProviderError;
use crate::domain::instance::{
    Image, InstanceStateChange, LaunchSpec, Reservation, ServiceInstanceRef, Tag,
};

// ── Compute port ──────────────────────────────────────────────────────────────

/// Five-operation contract over the cloud compute API.
///
/// Every method is synchronous and maps 1:1 onto a single provider call
/// bounded by the adapter's configured timeout. The trait carries no retry
/// policy; callers see each rejection verbatim.
pub trait ComputeClient {
    /// Launch the instances described by `spec` and return the reservation
    /// grouping them.
    ///
    /// # Errors
    ///
    /// Returns a `ProviderError` on any API-level rejection (quota, invalid
    /// image, invalid type) or transport failure.
    fn launch(&self, spec: &LaunchSpec) -> Result<Reservation, ProviderError>;

    /// Terminate the given instances. An empty slice is a successful no-op
    /// and must not reach the provider.
    ///
    /// # Errors
    ///
    /// Returns a `ProviderError` if the provider rejects the call.
    fn terminate(&self, instance_ids: &[String]) -> Result<Vec<InstanceStateChange>, ProviderError>;

    /// Attach tags to one resource. Not transactional with `launch`: a crash
    /// between the two leaves an untagged, undiscoverable instance.
    ///
    /// # Errors
    ///
    /// Returns a `ProviderError` if the provider rejects the call.
    fn tag(&self, instance_id: &str, tags: &[Tag]) -> Result<(), ProviderError>;

    /// Find the reservations whose instances carry
    /// `service_instance_ref = service_ref` and are in a live state
    /// (`running` or `pending`). Terminated and stopped instances are
    /// invisible here, so a ref can be reused once its instances are gone.
    ///
    /// # Errors
    ///
    /// Returns a `ProviderError` if the lookup fails.
    fn find_by_ref(
        &self,
        service_ref: &ServiceInstanceRef,
    ) -> Result<Vec<Reservation>, ProviderError>;

    /// Find the first machine image owned by `owner` matching `name`.
    ///
    /// # Errors
    ///
    /// Returns `ProviderError::ImageNotFound` when nothing matches; no
    /// image available is fatal, not recoverable.
    fn find_image(&self, owner: &str, name: &str) -> Result<Image, ProviderError>;
}

// Shared references and Arcs forward to the underlying client, so a caller
// can keep hold of a test double while the provisioner drives it.

impl<T: ComputeClient + ?Sized> ComputeClient for &T {
    fn launch(&self, spec: &LaunchSpec) -> Result<Reservation, ProviderError> {
        (**self).launch(spec)
    }

    fn terminate(&self, instance_ids: &[String]) -> Result<Vec<InstanceStateChange>, ProviderError> {
        (**self).terminate(instance_ids)
    }

    fn tag(&self, instance_id: &str, tags: &[Tag]) -> Result<(), ProviderError> {
        (**self).tag(instance_id, tags)
    }

    fn find_by_ref(
        &self,
        service_ref: &ServiceInstanceRef,
    ) -> Result<Vec<Reservation>, ProviderError> {
        (**self).find_by_ref(service_ref)
    }

    fn find_image(&self, owner: &str, name: &str) -> Result<Image, ProviderError> {
        (**self).find_image(owner, name)
    }
}

impl<T: ComputeClient + ?Sized> ComputeClient for std::sync::Arc<T> {
    fn launch(&self, spec: &LaunchSpec) -> Result<Reservation, ProviderError> {
        (**self).launch(spec)
    }

    fn terminate(&self, instance_ids: &[String]) -> Result<Vec<InstanceStateChange>, ProviderError> {
        (**self).terminate(instance_ids)
    }

    fn tag(&self, instance_id: &str, tags: &[Tag]) -> Result<(), ProviderError> {
        (**self).tag(instance_id, tags)
    }

    fn find_by_ref(
        &self,
        service_ref: &ServiceInstanceRef,
    ) -> Result<Vec<Reservation>, ProviderError> {
        (**self).find_by_ref(service_ref)
    }

    fn find_image(&self, owner: &str, name: &str) -> Result<Image, ProviderError> {
        (**self).find_image(owner, name)
    }
}

// ── Boot script port ──────────────────────────────────────────────────────────

/// Renders the boot script handed to new instances from the request's
/// opaque parameters.
pub trait BootScriptRenderer {
    /// Render the script as plain text; the orchestrator base64-encodes it.
    ///
    /// # Errors
    ///
    /// Returns an error when the parameters do not satisfy the template.
    fn render(&self, params: &serde_json::Value) -> Result<String>;
}

impl<T: BootScriptRenderer + ?Sized> BootScriptRenderer for &T {
    fn render(&self, params: &serde_json::Value) -> Result<String> {
        (**self).render(params)
    }
}

impl<T: BootScriptRenderer + ?Sized> BootScriptRenderer for std::sync::Arc<T> {
    fn render(&self, params: &serde_json::Value) -> Result<String> {
        (**self).render(params)
    }
}
