// src/db/token_repo.rs

use async_trait::async_trait;
use chrono::{Duration, Utc};
use sqlx::SqlitePool;

use crate::common::error::AppError;

// Armazenamento de tokens efêmeros (reset de senha, sessão) com TTL.
//
// Antes isso era um mapa global em memória, que não sobrevive a múltiplas
// instâncias. O contrato agora é uma dependência injetada: get/put/
// delete-by-value, com expiração explícita.
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn put(
        &self,
        purpose: &str,
        token: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<(), AppError>;

    /// `None` quando o token não existe ou já expirou.
    async fn get(&self, purpose: &str, token: &str) -> Result<Option<String>, AppError>;

    /// Invalida todos os tokens de um propósito apontando para um valor
    /// (ex.: derrubar todas as sessões de um usuário). Retorna quantos caíram.
    async fn delete_by_value(&self, purpose: &str, value: &str) -> Result<u64, AppError>;
}

#[derive(Clone)]
pub struct SqlTokenStore {
    pool: SqlitePool,
}

impl SqlTokenStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Gera um token opaco novo.
    pub fn new_token() -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

#[async_trait]
impl TokenStore for SqlTokenStore {
    async fn put(
        &self,
        purpose: &str,
        token: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<(), AppError> {
        let now = Utc::now();

        // Faxina oportunista: cada gravação varre os expirados.
        sqlx::query("DELETE FROM auth_tokens WHERE expires_at <= ?")
            .bind(now)
            .execute(&self.pool)
            .await?;

        sqlx::query(
            "INSERT OR REPLACE INTO auth_tokens (token, purpose, value, expires_at, created_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(token)
        .bind(purpose)
        .bind(value)
        .bind(now + ttl)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, purpose: &str, token: &str) -> Result<Option<String>, AppError> {
        let value: Option<String> = sqlx::query_scalar(
            "SELECT value FROM auth_tokens \
             WHERE token = ? AND purpose = ? AND expires_at > ?",
        )
        .bind(token)
        .bind(purpose)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        Ok(value)
    }

    async fn delete_by_value(&self, purpose: &str, value: &str) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM auth_tokens WHERE purpose = ? AND value = ?")
            .bind(purpose)
            .bind(value)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
