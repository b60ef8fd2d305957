// src/handlers/quota.rs

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::auth::{ActAsSubscriber, AuthenticatedUser},
    services::quota::ResourceClass,
    services::tenant_resolver::resolve_scope,
};

/// Exposição somente-leitura da quota para o dashboard renderizar o uso.
pub async fn quota_status(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    ActAsSubscriber(act_as): ActAsSubscriber,
    Path(resource): Path<String>,
) -> Result<Response, AppError> {
    let Some(resource) = ResourceClass::parse(&resource) else {
        return Ok((
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Classe de recurso desconhecida. Use products, orders ou users." })),
        )
            .into_response());
    };

    let scope = resolve_scope(&user, act_as.as_deref());
    let check = state
        .entity_service
        .quota()
        .validate(resource, scope.subscriber_email(), user.is_master)
        .await?;

    Ok(Json(check).into_response())
}
