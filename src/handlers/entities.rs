// src/handlers/entities.rs

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};
use std::collections::HashMap;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::auth::{ActAsSubscriber, AuthenticatedUser},
    models::entity::{DEFAULT_PAGE_LIMIT, ListQuery, OrderBy, parse_filters},
    services::entity_service::{BulkOutcome, CreateOutcome, UpdateOutcome},
};

// Chaves da query string que NÃO são filtros de payload.
const RESERVED_PARAMS: &[&str] = &["page", "limit", "sort"];

fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "Registro não encontrado." })),
    )
        .into_response()
}

pub async fn list_entities(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    ActAsSubscriber(act_as): ActAsSubscriber,
    Path(entity_type): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, AppError> {
    let page = params.get("page").and_then(|v| v.parse().ok()).unwrap_or(1);
    let limit = params
        .get("limit")
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_PAGE_LIMIT);
    let order_by = OrderBy::parse(params.get("sort").map(String::as_str));

    // Todo o resto da query string vira filtro de igualdade sobre o payload.
    let raw_filters: HashMap<String, String> = params
        .iter()
        .filter(|(key, _)| !RESERVED_PARAMS.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    let query = ListQuery {
        filters: parse_filters(&raw_filters),
        order_by,
        page,
        limit,
    }
    .clamped();

    let result = state
        .entity_service
        .list(&user, act_as.as_deref(), &entity_type, &query)
        .await?;

    Ok(Json(result).into_response())
}

pub async fn get_entity(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    ActAsSubscriber(act_as): ActAsSubscriber,
    Path((entity_type, id)): Path<(String, i64)>,
) -> Result<Response, AppError> {
    let entity = state
        .entity_service
        .get(&user, act_as.as_deref(), &entity_type, id)
        .await?;

    Ok(match entity {
        Some(entity) => Json(entity).into_response(),
        None => not_found(),
    })
}

pub async fn create_entity(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    ActAsSubscriber(act_as): ActAsSubscriber,
    Path(entity_type): Path<String>,
    Json(payload): Json<Value>,
) -> Result<Response, AppError> {
    let outcome = state
        .entity_service
        .create(&user, act_as.as_deref(), &entity_type, payload)
        .await?;

    Ok(match outcome {
        CreateOutcome::Created(entity) => (StatusCode::CREATED, Json(entity)).into_response(),
        // Quota estourada é resultado esperado: 4xx com os números para o
        // frontend montar o aviso de upgrade.
        CreateOutcome::QuotaExceeded(check) => {
            (StatusCode::FORBIDDEN, Json(check)).into_response()
        }
    })
}

pub async fn create_bulk(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    ActAsSubscriber(act_as): ActAsSubscriber,
    Path(entity_type): Path<String>,
    Json(payloads): Json<Vec<Value>>,
) -> Result<Response, AppError> {
    let outcome = state
        .entity_service
        .create_bulk(&user, act_as.as_deref(), &entity_type, payloads)
        .await?;

    Ok(match outcome {
        BulkOutcome::Created(entities) => (StatusCode::CREATED, Json(entities)).into_response(),
        BulkOutcome::QuotaExceeded(check) => (StatusCode::FORBIDDEN, Json(check)).into_response(),
    })
}

pub async fn update_entity(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    ActAsSubscriber(act_as): ActAsSubscriber,
    Path((entity_type, id)): Path<(String, i64)>,
    Json(partial): Json<Value>,
) -> Result<Response, AppError> {
    let outcome = state
        .entity_service
        .update(&user, act_as.as_deref(), &entity_type, id, partial)
        .await?;

    Ok(match outcome {
        UpdateOutcome::Updated { entity, transition } => {
            let message = transition.and_then(|t| t.message);
            (StatusCode::OK, Json(json!({ "item": entity, "message": message }))).into_response()
        }
        UpdateOutcome::NotFound => not_found(),
        UpdateOutcome::InvalidTransition(check) => (
            StatusCode::CONFLICT,
            Json(json!({ "error": check.message })),
        )
            .into_response(),
    })
}

pub async fn delete_entity(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    ActAsSubscriber(act_as): ActAsSubscriber,
    Path((entity_type, id)): Path<(String, i64)>,
) -> Result<Response, AppError> {
    let deleted = state
        .entity_service
        .delete(&user, act_as.as_deref(), &entity_type, id)
        .await?;

    // Nada removido não é erro; o corpo diz o que aconteceu.
    Ok(Json(json!({ "deleted": deleted })).into_response())
}
