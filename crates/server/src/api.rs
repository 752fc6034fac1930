//! Management API.
//!
//! - `POST   /api/v1/monitor/run`                  — trigger a monitoring pass
//! - `POST   /api/v1/tenants/{tenant_id}/policies` — create an SLA policy
//! - `DELETE /api/v1/policies/{policy_id}`         — delete an SLA policy
//!
//! Policy mutations require the caller (from the `x-user-id` header) to hold
//! an admin-or-higher role in the owning tenant.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{info, warn};
use uuid::Uuid;

use inboxly_core::domain::policy::{FieldError, PolicyDraft, PolicyId};
use inboxly_core::domain::tenant::{TenantId, UserId};
use inboxly_core::errors::{ApplicationError, InterfaceError};
use inboxly_db::repositories::{MembershipRepository, PolicyRepository};
use inboxly_monitor::SlaMonitor;

#[derive(Clone)]
pub struct ApiState {
    pub policies: Arc<dyn PolicyRepository>,
    pub memberships: Arc<dyn MembershipRepository>,
    pub monitor: Arc<SlaMonitor>,
    /// Bumped on every policy mutation so cached settings views can refresh.
    pub settings_generation: watch::Sender<u64>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/v1/monitor/run", post(run_monitor))
        .route("/api/v1/tenants/{tenant_id}/policies", post(create_policy))
        .route("/api/v1/policies/{policy_id}", delete(delete_policy))
        .with_state(state)
}

#[derive(Debug, Default, Deserialize)]
pub struct RunRequest {
    #[serde(rename = "tenantId")]
    pub tenant_id: Option<String>,
}

/// Empty-object acknowledgement.
#[derive(Debug, Serialize)]
pub struct Ack {}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(rename = "correlationId")]
    pub correlation_id: String,
}

#[derive(Debug, Serialize)]
pub struct ValidationBody {
    pub errors: Vec<FieldError>,
}

fn interface_response(error: InterfaceError) -> Response {
    let (status, correlation_id) = match &error {
        InterfaceError::BadRequest { correlation_id, .. } => {
            (StatusCode::BAD_REQUEST, correlation_id.clone())
        }
        InterfaceError::NotFound { correlation_id, .. } => {
            (StatusCode::NOT_FOUND, correlation_id.clone())
        }
        InterfaceError::Forbidden { correlation_id, .. } => {
            (StatusCode::FORBIDDEN, correlation_id.clone())
        }
        InterfaceError::ServiceUnavailable { correlation_id, .. } => {
            (StatusCode::SERVICE_UNAVAILABLE, correlation_id.clone())
        }
        InterfaceError::Internal { correlation_id, .. } => {
            (StatusCode::INTERNAL_SERVER_ERROR, correlation_id.clone())
        }
    };

    let body = ErrorBody { error: error.user_message().to_string(), correlation_id };
    (status, Json(body)).into_response()
}

fn unauthorized(correlation_id: &str) -> Response {
    let body = ErrorBody {
        error: "Caller identity is required. Set the x-user-id header.".to_string(),
        correlation_id: correlation_id.to_string(),
    };
    (StatusCode::UNAUTHORIZED, Json(body)).into_response()
}

fn caller_identity(headers: &HeaderMap) -> Option<UserId> {
    headers
        .get("x-user-id")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(|value| UserId(value.to_string()))
}

pub async fn run_monitor(
    State(state): State<ApiState>,
    body: Option<Json<RunRequest>>,
) -> Response {
    let correlation_id = Uuid::new_v4().to_string();
    let Json(request) = body.unwrap_or_else(|| Json(RunRequest::default()));

    let outcome = match &request.tenant_id {
        Some(tenant_id) => state.monitor.monitor_tenant(&TenantId(tenant_id.clone())).await,
        None => state.monitor.monitor_all().await,
    };

    match outcome {
        Ok(summary) => {
            info!(
                event_name = "api.monitor.run",
                correlation_id = %correlation_id,
                scope = request.tenant_id.as_deref().unwrap_or("all"),
                evaluated = summary.evaluated,
                escalated = summary.escalated,
                failed = summary.failed,
                "monitoring pass triggered over http"
            );
            (StatusCode::OK, Json(Ack {})).into_response()
        }
        Err(error) => {
            warn!(
                event_name = "api.monitor.run_failed",
                correlation_id = %correlation_id,
                error = %error,
                "monitoring pass could not start"
            );
            let body = ErrorBody {
                error: "The monitoring run could not start.".to_string(),
                correlation_id,
            };
            (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
        }
    }
}

pub async fn create_policy(
    State(state): State<ApiState>,
    Path(tenant_id): Path<String>,
    headers: HeaderMap,
    Json(draft): Json<PolicyDraft>,
) -> Response {
    let correlation_id = Uuid::new_v4().to_string();
    let tenant_id = TenantId(tenant_id);

    let Some(user_id) = caller_identity(&headers) else {
        return unauthorized(&correlation_id);
    };

    match require_policy_admin(&state, &tenant_id, &user_id).await {
        Ok(()) => {}
        Err(error) => return interface_response(error.into_interface(correlation_id)),
    }

    let policy = match draft.validate(tenant_id.clone(), Utc::now()) {
        Ok(policy) => policy,
        Err(errors) => {
            return (StatusCode::UNPROCESSABLE_ENTITY, Json(ValidationBody { errors }))
                .into_response();
        }
    };

    if let Err(error) = state.policies.insert(policy.clone()).await {
        let application = ApplicationError::Persistence(error.to_string());
        return interface_response(application.into_interface(correlation_id));
    }

    state.settings_generation.send_modify(|generation| *generation += 1);

    info!(
        event_name = "api.policy.created",
        correlation_id = %correlation_id,
        tenant_id = %tenant_id.0,
        policy_id = %policy.id.0,
        first_response_minutes = policy.first_response_minutes,
        "sla policy created"
    );

    (StatusCode::OK, Json(policy)).into_response()
}

pub async fn delete_policy(
    State(state): State<ApiState>,
    Path(policy_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let correlation_id = Uuid::new_v4().to_string();
    let policy_id = PolicyId(policy_id);

    let Some(user_id) = caller_identity(&headers) else {
        return unauthorized(&correlation_id);
    };

    let policy = match state.policies.find_by_id(&policy_id).await {
        Ok(Some(policy)) => policy,
        Ok(None) => {
            let application =
                ApplicationError::NotFound { resource: "policy", id: policy_id.0.clone() };
            return interface_response(application.into_interface(correlation_id));
        }
        Err(error) => {
            let application = ApplicationError::Persistence(error.to_string());
            return interface_response(application.into_interface(correlation_id));
        }
    };

    match require_policy_admin(&state, &policy.tenant_id, &user_id).await {
        Ok(()) => {}
        Err(error) => return interface_response(error.into_interface(correlation_id)),
    }

    match state.policies.delete(&policy_id).await {
        Ok(true) => {}
        Ok(false) => {
            let application =
                ApplicationError::NotFound { resource: "policy", id: policy_id.0.clone() };
            return interface_response(application.into_interface(correlation_id));
        }
        Err(error) => {
            let application = ApplicationError::Persistence(error.to_string());
            return interface_response(application.into_interface(correlation_id));
        }
    }

    state.settings_generation.send_modify(|generation| *generation += 1);

    info!(
        event_name = "api.policy.deleted",
        correlation_id = %correlation_id,
        tenant_id = %policy.tenant_id.0,
        policy_id = %policy_id.0,
        "sla policy deleted"
    );

    (StatusCode::OK, Json(Ack {})).into_response()
}

async fn require_policy_admin(
    state: &ApiState,
    tenant_id: &TenantId,
    user_id: &UserId,
) -> Result<(), ApplicationError> {
    let role = state
        .memberships
        .role(tenant_id, user_id)
        .await
        .map_err(|error| ApplicationError::Persistence(error.to_string()))?;

    match role {
        Some(role) if role.can_manage_policies() => Ok(()),
        _ => Err(ApplicationError::Forbidden(format!(
            "user {} lacks policy management rights in tenant {}",
            user_id.0, tenant_id.0
        ))),
    }
}
