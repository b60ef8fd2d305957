// src/handlers/orders.rs

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::auth::{ActAsSubscriber, AuthenticatedUser},
    services::entity_service::UpdateOutcome,
    services::quota::ORDER_ENTITY_TYPE,
};

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateOrderStatusPayload {
    #[validate(length(min = 1, message = "O status é obrigatório."))]
    pub status: String,
}

/// Troca de status do pedido. A validação da transição acontece no serviço,
/// antes de qualquer escrita; recusa volta como 409 com a mensagem da FSM.
pub async fn update_order_status(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    ActAsSubscriber(act_as): ActAsSubscriber,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateOrderStatusPayload>,
) -> Result<Response, AppError> {
    payload.validate()?;

    let outcome = state
        .entity_service
        .update(
            &user,
            act_as.as_deref(),
            ORDER_ENTITY_TYPE,
            id,
            json!({ "status": payload.status }),
        )
        .await?;

    Ok(match outcome {
        UpdateOutcome::Updated { entity, transition } => {
            let message = transition.and_then(|t| t.message);
            (StatusCode::OK, Json(json!({ "item": entity, "message": message }))).into_response()
        }
        UpdateOutcome::NotFound => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Pedido não encontrado." })),
        )
            .into_response(),
        UpdateOutcome::InvalidTransition(check) => (
            StatusCode::CONFLICT,
            Json(json!({ "error": check.message })),
        )
            .into_response(),
    })
}
