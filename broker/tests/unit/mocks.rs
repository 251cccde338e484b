//! Shared mock infrastructure for unit tests.
//!
//! Provides a scripted, call-recording `ComputeClient` plus a behavioral
//! in-memory provider so each test file doesn't re-define the same
//! boilerplate.

#![allow(clippy::expect_used)]

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use agent_broker::application::ports::{BootScriptRenderer, ComputeClient};
use agent_broker::application::services::provisioning::LaunchSettings;
use agent_broker::domain::error::ProviderError;
use agent_broker::domain::instance::{
    CloudInstance, Image, InstanceState, InstanceStateChange, LaunchSpec, Reservation,
    ServiceInstanceRef, TAG_SERVICE_INSTANCE_REF, Tag,
};

// ── Builders ──────────────────────────────────────────────────────────────────

pub fn live_instance(id: &str, instance_type: &str) -> CloudInstance {
    CloudInstance {
        instance_id: id.to_string(),
        instance_type: instance_type.to_string(),
        state: InstanceState::Running,
        tags: Vec::new(),
    }
}

pub fn reservation(id: &str, instances: Vec<CloudInstance>) -> Reservation {
    Reservation {
        reservation_id: id.to_string(),
        instances,
    }
}

pub fn test_settings() -> LaunchSettings {
    LaunchSettings {
        security_group_id: "sg-0123".to_string(),
        image_owner: "self".to_string(),
        image_name: "ci-agent-*".to_string(),
    }
}

// ── Boot script doubles ───────────────────────────────────────────────────────

pub const BOOT_SCRIPT: &str = "#!/bin/bash\necho agent\n";

/// Renderer returning a fixed script.
pub struct StaticBootScript;

impl BootScriptRenderer for StaticBootScript {
    fn render(&self, _params: &serde_json::Value) -> anyhow::Result<String> {
        Ok(BOOT_SCRIPT.to_string())
    }
}

/// Renderer that always fails.
pub struct FailingBootScript;

impl BootScriptRenderer for FailingBootScript {
    fn render(&self, _params: &serde_json::Value) -> anyhow::Result<String> {
        anyhow::bail!("missing parameter")
    }
}

// ── Scripted fake ─────────────────────────────────────────────────────────────

/// One recorded `ComputeClient` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComputeCall {
    Launch {
        image_id: String,
        instance_type: String,
        security_group_ids: Vec<String>,
        user_data: String,
    },
    Terminate {
        instance_ids: Vec<String>,
    },
    Tag {
        instance_id: String,
        tags: Vec<Tag>,
    },
    FindByRef {
        service_ref: String,
    },
    FindImage {
        owner: String,
        name: String,
    },
}

/// A `ComputeClient` that records every call and returns scripted results.
///
/// Launches hand out sequential ids `i-new-1`, `i-new-2`, …
#[derive(Default)]
pub struct FakeCompute {
    pub calls: Mutex<Vec<ComputeCall>>,
    /// Results for successive `find_by_ref` calls, front first; an exhausted
    /// queue yields no reservations.
    pub find_queue: Mutex<VecDeque<Vec<Reservation>>>,
    pub fail_launch: bool,
    pub fail_tag: bool,
    pub fail_terminate_all: bool,
    /// Instance ids whose terminate call fails.
    pub fail_terminate_for: Vec<String>,
    pub launched: AtomicUsize,
}

impl FakeCompute {
    pub fn with_find_results(results: Vec<Vec<Reservation>>) -> Self {
        Self {
            find_queue: Mutex::new(results.into()),
            ..Self::default()
        }
    }

    pub fn recorded_calls(&self) -> Vec<ComputeCall> {
        self.calls.lock().expect("mutex poisoned").clone()
    }

    pub fn launch_count(&self) -> usize {
        self.recorded_calls()
            .iter()
            .filter(|c| matches!(c, ComputeCall::Launch { .. }))
            .count()
    }

    /// The id lists of every terminate call, in call order.
    pub fn terminations(&self) -> Vec<Vec<String>> {
        self.recorded_calls()
            .into_iter()
            .filter_map(|c| match c {
                ComputeCall::Terminate { instance_ids } => Some(instance_ids),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: ComputeCall) {
        self.calls.lock().expect("mutex poisoned").push(call);
    }
}

fn rejected(action: &'static str) -> ProviderError {
    ProviderError::Rejected {
        action,
        status: 400,
        message: "injected provider failure".to_string(),
    }
}

impl ComputeClient for FakeCompute {
    fn launch(&self, spec: &LaunchSpec) -> Result<Reservation, ProviderError> {
        self.record(ComputeCall::Launch {
            image_id: spec.image_id.clone(),
            instance_type: spec.instance_type.clone(),
            security_group_ids: spec.security_group_ids.clone(),
            user_data: spec.user_data.clone(),
        });
        if self.fail_launch {
            return Err(rejected("LaunchInstances"));
        }
        let n = self.launched.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Reservation {
            reservation_id: format!("r-{n:04}"),
            instances: vec![CloudInstance {
                instance_id: format!("i-new-{n}"),
                instance_type: spec.instance_type.clone(),
                state: InstanceState::Pending,
                tags: Vec::new(),
            }],
        })
    }

    fn terminate(&self, instance_ids: &[String]) -> Result<Vec<InstanceStateChange>, ProviderError> {
        self.record(ComputeCall::Terminate {
            instance_ids: instance_ids.to_vec(),
        });
        if self.fail_terminate_all
            || instance_ids
                .iter()
                .any(|id| self.fail_terminate_for.contains(id))
        {
            return Err(rejected("TerminateInstances"));
        }
        Ok(instance_ids
            .iter()
            .map(|id| InstanceStateChange {
                instance_id: id.clone(),
                previous_state: InstanceState::Running,
                current_state: InstanceState::ShuttingDown,
            })
            .collect())
    }

    fn tag(&self, instance_id: &str, tags: &[Tag]) -> Result<(), ProviderError> {
        self.record(ComputeCall::Tag {
            instance_id: instance_id.to_string(),
            tags: tags.to_vec(),
        });
        if self.fail_tag {
            return Err(rejected("CreateTags"));
        }
        Ok(())
    }

    fn find_by_ref(
        &self,
        service_ref: &ServiceInstanceRef,
    ) -> Result<Vec<Reservation>, ProviderError> {
        self.record(ComputeCall::FindByRef {
            service_ref: service_ref.as_str().to_string(),
        });
        Ok(self
            .find_queue
            .lock()
            .expect("mutex poisoned")
            .pop_front()
            .unwrap_or_default())
    }

    fn find_image(&self, owner: &str, name: &str) -> Result<Image, ProviderError> {
        self.record(ComputeCall::FindImage {
            owner: owner.to_string(),
            name: name.to_string(),
        });
        Ok(Image {
            image_id: "img-agent-1".to_string(),
            name: name.to_string(),
        })
    }
}

// ── In-memory provider ────────────────────────────────────────────────────────

/// Behavioral double that models the provider's tag store and the
/// `running`/`pending` lookup filter, for round-trip properties.
#[derive(Default)]
pub struct InMemoryCompute {
    instances: Mutex<Vec<CloudInstance>>,
    counter: AtomicUsize,
}

impl InMemoryCompute {
    pub fn seed(&self, instance: CloudInstance) {
        self.instances.lock().expect("mutex poisoned").push(instance);
    }

    pub fn state_of(&self, instance_id: &str) -> Option<InstanceState> {
        self.instances
            .lock()
            .expect("mutex poisoned")
            .iter()
            .find(|i| i.instance_id == instance_id)
            .map(|i| i.state)
    }
}

impl ComputeClient for InMemoryCompute {
    fn launch(&self, spec: &LaunchSpec) -> Result<Reservation, ProviderError> {
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        let instance = CloudInstance {
            instance_id: format!("i-mem-{n}"),
            instance_type: spec.instance_type.clone(),
            state: InstanceState::Pending,
            tags: Vec::new(),
        };
        self.instances
            .lock()
            .expect("mutex poisoned")
            .push(instance.clone());
        Ok(Reservation {
            reservation_id: format!("r-mem-{n}"),
            instances: vec![instance],
        })
    }

    fn terminate(&self, instance_ids: &[String]) -> Result<Vec<InstanceStateChange>, ProviderError> {
        let mut instances = self.instances.lock().expect("mutex poisoned");
        let mut changes = Vec::new();
        for id in instance_ids {
            let instance = instances
                .iter_mut()
                .find(|i| &i.instance_id == id)
                .ok_or_else(|| rejected("TerminateInstances"))?;
            changes.push(InstanceStateChange {
                instance_id: id.clone(),
                previous_state: instance.state,
                current_state: InstanceState::Terminated,
            });
            instance.state = InstanceState::Terminated;
        }
        Ok(changes)
    }

    fn tag(&self, instance_id: &str, tags: &[Tag]) -> Result<(), ProviderError> {
        let mut instances = self.instances.lock().expect("mutex poisoned");
        let instance = instances
            .iter_mut()
            .find(|i| i.instance_id == instance_id)
            .ok_or_else(|| rejected("CreateTags"))?;
        instance.tags.extend(tags.iter().cloned());
        Ok(())
    }

    fn find_by_ref(
        &self,
        service_ref: &ServiceInstanceRef,
    ) -> Result<Vec<Reservation>, ProviderError> {
        let instances = self.instances.lock().expect("mutex poisoned");
        let matching: Vec<Reservation> = instances
            .iter()
            .filter(|i| {
                i.state.is_live()
                    && i.tags.iter().any(|t| {
                        t.key == TAG_SERVICE_INSTANCE_REF && t.value == service_ref.as_str()
                    })
            })
            .map(|i| Reservation {
                reservation_id: format!("r-of-{}", i.instance_id),
                instances: vec![i.clone()],
            })
            .collect();
        Ok(matching)
    }

    fn find_image(&self, _owner: &str, name: &str) -> Result<Image, ProviderError> {
        Ok(Image {
            image_id: "img-mem-1".to_string(),
            name: name.to_string(),
        })
    }
}
