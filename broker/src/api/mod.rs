//! Service-broker HTTP surface.
//!
//! Thin plumbing over the provisioning service: request decoding, plan
//! resolution, and error-to-status mapping. The orchestrator is synchronous,
//! so handlers bridge to it through `spawn_blocking`.

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, put};
use axum::{Json, Router, extract::Path, extract::State};
use serde::{Deserialize, Serialize};
use tokio::task::JoinError;
use tower_http::trace::TraceLayer;

use crate::application::ports::{BootScriptRenderer, ComputeClient};
use crate::application::services::provisioning::Provisioner;
use crate::domain::config::Catalog;
use crate::domain::error::LifecycleError;
use crate::domain::instance::{AcceptedOperation, LifecycleRequest, ServiceInstanceRef};

// ── State ─────────────────────────────────────────────────────────────────────

/// Shared state behind every handler.
pub struct AppState<C, B> {
    pub provisioner: Provisioner<C, B>,
    pub catalog: Catalog,
}

// ── Wire types ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ProvisionBody {
    pub service_id: String,
    pub plan_id: String,
    pub organization_guid: String,
    pub space_guid: String,
    #[serde(default)]
    pub parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct UpdateBody {
    pub service_id: String,
    pub plan_id: String,
    #[serde(default)]
    pub parameters: serde_json::Value,
    #[serde(default)]
    pub previous_values: PreviousValues,
}

/// Org and space of the instance being updated; replacements are tagged
/// with these so the tag set survives a plan change.
#[derive(Debug, Default, Deserialize)]
pub struct PreviousValues {
    #[serde(default)]
    pub organization_id: String,
    #[serde(default)]
    pub space_id: String,
}

#[derive(Debug, Serialize)]
struct OperationResponse {
    operation: String,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    description: String,
}

#[derive(Debug, Serialize)]
struct CatalogResponse {
    services: Vec<ServiceOffering>,
}

#[derive(Debug, Serialize)]
struct ServiceOffering {
    id: String,
    name: String,
    description: String,
    bindable: bool,
    plan_updateable: bool,
    plans: Vec<PlanOffering>,
}

#[derive(Debug, Serialize)]
struct PlanOffering {
    id: String,
    name: String,
    description: String,
}

// ── Router ────────────────────────────────────────────────────────────────────

/// Build the broker router.
pub fn build_router<C, B>(state: Arc<AppState<C, B>>) -> Router
where
    C: ComputeClient + Send + Sync + 'static,
    B: BootScriptRenderer + Send + Sync + 'static,
{
    Router::new()
        .route("/healthz", get(health))
        .route("/v2/catalog", get(catalog::<C, B>))
        .route(
            "/v2/service_instances/{instance_id}",
            put(provision::<C, B>)
                .patch(update::<C, B>)
                .delete(deprovision::<C, B>),
        )
        .route(
            "/v2/service_instances/{instance_id}/last_operation",
            get(last_operation::<C, B>),
        )
        .route(
            "/v2/service_instances/{instance_id}/service_bindings/{binding_id}",
            put(bind::<C, B>).delete(unbind::<C, B>),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ── Handlers ──────────────────────────────────────────────────────────────────

async fn health() -> StatusCode {
    StatusCode::OK
}

async fn catalog<C, B>(State(state): State<Arc<AppState<C, B>>>) -> Response
where
    C: ComputeClient + Send + Sync + 'static,
    B: BootScriptRenderer + Send + Sync + 'static,
{
    let catalog = &state.catalog;
    let response = CatalogResponse {
        services: vec![ServiceOffering {
            id: catalog.service_id.clone(),
            name: catalog.service_name.clone(),
            description: catalog.description.clone(),
            bindable: false,
            plan_updateable: true,
            plans: catalog
                .plans
                .iter()
                .map(|p| PlanOffering {
                    id: p.id.clone(),
                    name: p.name.clone(),
                    description: p.description.clone(),
                })
                .collect(),
        }],
    };
    Json(response).into_response()
}

async fn provision<C, B>(
    State(state): State<Arc<AppState<C, B>>>,
    Path(instance_id): Path<String>,
    Json(body): Json<ProvisionBody>,
) -> Response
where
    C: ComputeClient + Send + Sync + 'static,
    B: BootScriptRenderer + Send + Sync + 'static,
{
    let Some(plan) = state.catalog.plan(&body.plan_id) else {
        return unknown_plan(&body.plan_id);
    };
    let request = LifecycleRequest {
        service_instance_ref: ServiceInstanceRef::new(instance_id),
        org_guid: body.organization_guid,
        space_guid: body.space_guid,
        instance_type: plan.instance_type.clone(),
        parameters: body.parameters,
    };

    let state = Arc::clone(&state);
    lifecycle_response(
        tokio::task::spawn_blocking(move || state.provisioner.provision(&request)).await,
    )
}

async fn update<C, B>(
    State(state): State<Arc<AppState<C, B>>>,
    Path(instance_id): Path<String>,
    Json(body): Json<UpdateBody>,
) -> Response
where
    C: ComputeClient + Send + Sync + 'static,
    B: BootScriptRenderer + Send + Sync + 'static,
{
    let Some(plan) = state.catalog.plan(&body.plan_id) else {
        return unknown_plan(&body.plan_id);
    };
    let request = LifecycleRequest {
        service_instance_ref: ServiceInstanceRef::new(instance_id),
        org_guid: body.previous_values.organization_id,
        space_guid: body.previous_values.space_id,
        instance_type: plan.instance_type.clone(),
        parameters: body.parameters,
    };

    let state = Arc::clone(&state);
    lifecycle_response(tokio::task::spawn_blocking(move || state.provisioner.update(&request)).await)
}

async fn deprovision<C, B>(
    State(state): State<Arc<AppState<C, B>>>,
    Path(instance_id): Path<String>,
) -> Response
where
    C: ComputeClient + Send + Sync + 'static,
    B: BootScriptRenderer + Send + Sync + 'static,
{
    let service_ref = ServiceInstanceRef::new(instance_id);
    let state = Arc::clone(&state);
    lifecycle_response(
        tokio::task::spawn_blocking(move || state.provisioner.deprovision(&service_ref)).await,
    )
}

async fn last_operation<C, B>(State(state): State<Arc<AppState<C, B>>>) -> Response
where
    C: ComputeClient + Send + Sync + 'static,
    B: BootScriptRenderer + Send + Sync + 'static,
{
    lifecycle_response(Ok(state.provisioner.last_operation()))
}

async fn bind<C, B>(State(state): State<Arc<AppState<C, B>>>) -> Response
where
    C: ComputeClient + Send + Sync + 'static,
    B: BootScriptRenderer + Send + Sync + 'static,
{
    lifecycle_response(Ok(state.provisioner.bind()))
}

async fn unbind<C, B>(State(state): State<Arc<AppState<C, B>>>) -> Response
where
    C: ComputeClient + Send + Sync + 'static,
    B: BootScriptRenderer + Send + Sync + 'static,
{
    lifecycle_response(Ok(state.provisioner.unbind()))
}

// ── Response mapping ──────────────────────────────────────────────────────────

fn unknown_plan(plan_id: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            description: format!("unknown plan id: {plan_id}"),
        }),
    )
        .into_response()
}

/// Map an orchestrator outcome (or a blocking-task panic) onto the wire.
fn lifecycle_response(
    outcome: Result<Result<AcceptedOperation, LifecycleError>, JoinError>,
) -> Response {
    match outcome {
        Ok(Ok(accepted)) => (
            StatusCode::ACCEPTED,
            Json(OperationResponse {
                operation: accepted.operation,
            }),
        )
            .into_response(),
        Ok(Err(err)) => {
            let status = match &err {
                LifecycleError::Duplicate(_) => StatusCode::CONFLICT,
                LifecycleError::NotSupported(_) => StatusCode::NOT_IMPLEMENTED,
                _ => StatusCode::BAD_GATEWAY,
            };
            (
                status,
                Json(ErrorResponse {
                    description: err.to_string(),
                }),
            )
                .into_response()
        }
        Err(join_error) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                description: join_error.to_string(),
            }),
        )
            .into_response(),
    }
}
