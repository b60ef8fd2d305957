// src/handlers/subscribers.rs

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
    middleware::auth::AuthenticatedUser,
    models::auth::User,
    models::tenancy::{Plan, SubscriberStatus},
};

// Gestão de assinantes e planos: superfície exclusiva do master.
fn require_master(user: &User) -> Result<(), AppError> {
    if user.is_master {
        Ok(())
    } else {
        Err(AppError::MasterOnly)
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateSubscriberPayload {
    #[validate(email(message = "O e-mail fornecido é inválido."))]
    pub email: String,
    pub plan: Option<Plan>,
}

#[derive(Debug, Deserialize)]
pub struct ChangePlanPayload {
    pub plan: Plan,
}

#[derive(Debug, Deserialize)]
pub struct ChangeStatusPayload {
    pub status: SubscriberStatus,
}

pub async fn create_subscriber(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(payload): Json<CreateSubscriberPayload>,
) -> Result<Response, AppError> {
    require_master(&user)?;
    payload.validate()?;

    let subscriber = state
        .subscribers
        .create(
            &state.db_pool,
            &payload.email,
            payload.plan.unwrap_or(Plan::Free),
        )
        .await?;

    Ok((StatusCode::CREATED, Json(subscriber)).into_response())
}

pub async fn change_plan(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(email): Path<String>,
    Json(payload): Json<ChangePlanPayload>,
) -> Result<Response, AppError> {
    require_master(&user)?;

    let subscriber = state
        .subscribers
        .set_plan(&state.db_pool, &email, payload.plan)
        .await?;

    Ok(match subscriber {
        Some(subscriber) => Json(subscriber).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Assinante não encontrado." })),
        )
            .into_response(),
    })
}

pub async fn change_status(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(email): Path<String>,
    Json(payload): Json<ChangeStatusPayload>,
) -> Result<Response, AppError> {
    require_master(&user)?;

    let subscriber = state
        .subscribers
        .set_status(&state.db_pool, &email, payload.status)
        .await?;

    Ok(match subscriber {
        Some(subscriber) => Json(subscriber).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Assinante não encontrado." })),
        )
            .into_response(),
    })
}
