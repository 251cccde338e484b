//! Typed domain error enums.
//!
//! All error types implement `thiserror::Error`. The lifecycle taxonomy is
//! part of the broker's contract: callers dispatch on the variant, so two
//! failure modes that need different operator responses must never collapse
//! into one variant.

use thiserror::Error;

use crate::domain::instance::ServiceInstanceRef;

// ── Provider errors ───────────────────────────────────────────────────────────

/// Failure of a single compute-provider call. Never retried internally;
/// retry policy, where one exists, belongs to the orchestrator's caller.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{action}: provider returned HTTP {status}: {message}")]
    Rejected {
        action: &'static str,
        status: u16,
        message: String,
    },

    #[error("{action}: transport failure: {message}")]
    Transport {
        action: &'static str,
        message: String,
    },

    #[error("{action}: malformed provider response: {message}")]
    Malformed {
        action: &'static str,
        message: String,
    },

    #[error("no image owned by {owner} matches \"{name}\"")]
    ImageNotFound { owner: String, name: String },
}

// ── Lifecycle errors ──────────────────────────────────────────────────────────

/// Failures of the lifecycle entry points.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// The compute API rejected a call; surfaced verbatim.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Provision was called for a ref that already resolves to a live
    /// instance. Non-retryable caller error.
    #[error("an instance for service ref {0} already exists")]
    Duplicate(ServiceInstanceRef),

    /// Rendering the boot script from the request parameters failed.
    #[error("boot script rendering failed: {0:#}")]
    BootScript(#[from] anyhow::Error),

    /// Launch succeeded but tagging failed; the orphan instance was
    /// terminated by the compensating action.
    #[error("tagging instance {instance_id} failed ({tag_error}); the instance was terminated")]
    TaggingFailed {
        instance_id: String,
        tag_error: ProviderError,
    },

    /// Tagging failed AND the compensating terminate failed, leaving an
    /// untagged, running instance invisible to ref lookups. Requires manual
    /// operator cleanup.
    #[error(
        "tagging instance {instance_id} failed ({tag_error}) and terminating it failed \
         ({terminate_error}); the instance is running untagged and needs manual cleanup"
    )]
    CompensationFailed {
        instance_id: String,
        tag_error: ProviderError,
        terminate_error: ProviderError,
    },

    /// A plan update finished with one or more per-instance failures. Both
    /// id lists are carried so the caller can reconcile partial progress.
    #[error(
        "plan update finished with failures; created: [{}], terminated: [{}]",
        join_ids(.created),
        join_ids(.terminated)
    )]
    PartialUpdate {
        created: Vec<String>,
        terminated: Vec<String>,
        failures: Vec<String>,
    },

    /// Operation this broker permanently does not implement.
    #[error("{0} is not supported by this broker")]
    NotSupported(&'static str),
}

fn join_ids(ids: &[String]) -> String {
    ids.join(",")
}

// ── Config errors ─────────────────────────────────────────────────────────────

/// Errors related to configuration validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("compute.endpoint must be set")]
    MissingEndpoint,

    #[error("compute.security_group_id must be set")]
    MissingSecurityGroup,

    #[error("compute.image_owner and compute.image_name must both be set")]
    MissingImage,

    #[error("catalog.plans must contain at least one plan")]
    NoPlans,

    #[error("catalog plan \"{0}\" has an empty instance_type")]
    EmptyInstanceType(String),
}
