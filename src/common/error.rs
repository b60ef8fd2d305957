// src/common/error.rs

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

// Nosso tipo de erro, com `thiserror` para melhor ergonomia.
//
// Importante: resultados esperados do domínio (quota estourada, transição de
// status negada, registro não encontrado) NÃO passam por aqui. Eles voltam
// como valores (`QuotaCheck`, `TransitionCheck`, `Option`) e os handlers
// montam a resposta 4xx. `AppError` cobre apenas falhas reais de
// infraestrutura e da camada de cola (token, validação de payload).
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Erro de validação")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("Token inválido")]
    InvalidToken,

    #[error("Payload inválido: {0}")]
    InvalidPayload(String),

    #[error("Acesso restrito ao administrador")]
    MasterOnly,

    // Variante para erros de banco de dados (sqlx)
    #[error("Erro de banco de dados")]
    DatabaseError(#[from] sqlx::Error),

    // Transação segurou a conexão além do tempo limite e foi descartada
    // (rollback via drop). O incidente já foi logado no ponto da falha.
    #[error("Transação excedeu o tempo limite")]
    TransactionTimeout,

    // Variante genérica para qualquer outro erro inesperado.
    #[error("Erro interno do servidor")]
    InternalServerError(#[from] anyhow::Error),

    #[error("Erro de JWT: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            // Retorna todos os detalhes da validação.
            AppError::ValidationError(errors) => {
                let mut details = std::collections::HashMap::new();
                for (field, field_errors) in errors.field_errors() {
                    let messages: Vec<String> = field_errors
                        .iter()
                        .filter_map(|e| e.message.as_ref().map(|m| m.to_string()))
                        .collect();
                    details.insert(field.to_string(), messages);
                }
                let body = Json(json!({
                    "error": "Um ou mais campos são inválidos.",
                    "details": details,
                }));
                return (StatusCode::BAD_REQUEST, body).into_response();
            }
            AppError::InvalidToken | AppError::JwtError(_) => (
                StatusCode::UNAUTHORIZED,
                "Token de autenticação inválido ou ausente.".to_string(),
            ),
            AppError::InvalidPayload(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::MasterOnly => (
                StatusCode::FORBIDDEN,
                "Apenas o administrador master pode executar esta operação.".to_string(),
            ),

            // Todos os outros erros (DatabaseError, TransactionTimeout,
            // InternalServerError) viram 500. O `tracing` loga a causa
            // detalhada; o cliente recebe só a mensagem genérica.
            ref e => {
                tracing::error!("Erro interno do servidor: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Ocorreu um erro inesperado.".to_string(),
                )
            }
        };

        // Resposta padrão para erros simples que só têm uma mensagem.
        let body = Json(json!({ "error": error_message }));
        (status, body).into_response()
    }
}
