// src/db/subscriber_repo.rs

use chrono::{DateTime, Utc};
use sqlx::{Executor, Sqlite, SqlitePool};

use crate::{
    common::error::AppError,
    models::auth::ProfileRole,
    models::tenancy::{Plan, Subscriber, SubscriberStatus},
};

const SUBSCRIBER_COLUMNS: &str = "email, plan, status, expires_at, permissions, created_at, updated_at";

#[derive(Clone)]
pub struct SubscriberRepository {
    pool: SqlitePool,
}

impl SubscriberRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Busca o assinante pela chave natural. O e-mail armazenado é minúsculo,
    /// mas a comparação normaliza os dois lados para aceitar registros
    /// antigos gravados com caixa mista.
    pub async fn find_by_email<'e, E>(
        &self,
        executor: E,
        email: &str,
    ) -> Result<Option<Subscriber>, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let normalized = email.trim().to_lowercase();
        let subscriber = sqlx::query_as::<_, Subscriber>(&format!(
            "SELECT {SUBSCRIBER_COLUMNS} FROM subscribers WHERE LOWER(TRIM(email)) = ?"
        ))
        .bind(normalized)
        .fetch_optional(executor)
        .await?;

        Ok(subscriber)
    }

    pub async fn create<'e, E>(
        &self,
        executor: E,
        email: &str,
        plan: Plan,
    ) -> Result<Subscriber, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let now = Utc::now();
        let subscriber = sqlx::query_as::<_, Subscriber>(&format!(
            "INSERT INTO subscribers (email, plan, status, created_at, updated_at) \
             VALUES (?, ?, 'active', ?, ?) \
             RETURNING {SUBSCRIBER_COLUMNS}"
        ))
        .bind(email.trim().to_lowercase())
        .bind(plan)
        .bind(now)
        .bind(now)
        .fetch_one(executor)
        .await?;

        Ok(subscriber)
    }

    pub async fn set_plan<'e, E>(
        &self,
        executor: E,
        email: &str,
        plan: Plan,
    ) -> Result<Option<Subscriber>, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let subscriber = sqlx::query_as::<_, Subscriber>(&format!(
            "UPDATE subscribers SET plan = ?, updated_at = ? \
             WHERE LOWER(TRIM(email)) = ? \
             RETURNING {SUBSCRIBER_COLUMNS}"
        ))
        .bind(plan)
        .bind(Utc::now())
        .bind(email.trim().to_lowercase())
        .fetch_optional(executor)
        .await?;

        Ok(subscriber)
    }

    pub async fn set_status<'e, E>(
        &self,
        executor: E,
        email: &str,
        status: SubscriberStatus,
    ) -> Result<Option<Subscriber>, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let subscriber = sqlx::query_as::<_, Subscriber>(&format!(
            "UPDATE subscribers SET status = ?, updated_at = ? \
             WHERE LOWER(TRIM(email)) = ? \
             RETURNING {SUBSCRIBER_COLUMNS}"
        ))
        .bind(status)
        .bind(Utc::now())
        .bind(email.trim().to_lowercase())
        .fetch_optional(executor)
        .await?;

        Ok(subscriber)
    }

    pub async fn set_expiration<'e, E>(
        &self,
        executor: E,
        email: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<Option<Subscriber>, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let subscriber = sqlx::query_as::<_, Subscriber>(&format!(
            "UPDATE subscribers SET expires_at = ?, updated_at = ? \
             WHERE LOWER(TRIM(email)) = ? \
             RETURNING {SUBSCRIBER_COLUMNS}"
        ))
        .bind(expires_at)
        .bind(Utc::now())
        .bind(email.trim().to_lowercase())
        .fetch_optional(executor)
        .await?;

        Ok(subscriber)
    }

    /// Grava o mapa de permissões de um plano custom.
    pub async fn set_permissions<'e, E>(
        &self,
        executor: E,
        email: &str,
        permissions: Option<serde_json::Value>,
    ) -> Result<Option<Subscriber>, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let subscriber = sqlx::query_as::<_, Subscriber>(&format!(
            "UPDATE subscribers SET permissions = ?, updated_at = ? \
             WHERE LOWER(TRIM(email)) = ? \
             RETURNING {SUBSCRIBER_COLUMNS}"
        ))
        .bind(permissions)
        .bind(Utc::now())
        .bind(email.trim().to_lowercase())
        .fetch_optional(executor)
        .await?;

        Ok(subscriber)
    }

    // =========================================================================
    //  COLABORADORES
    // =========================================================================

    /// Cadastra um colaborador vinculado ao assinante. Contas de dono não
    /// passam por aqui (não carregam papel e não contam na quota).
    pub async fn add_collaborator<'e, E>(
        &self,
        executor: E,
        subscriber_email: &str,
        email: &str,
        role: ProfileRole,
    ) -> Result<i64, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let now = Utc::now();
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO users (email, is_master, subscriber_email, profile_role, created_at, updated_at) \
             VALUES (?, 0, ?, ?, ?, ?) \
             RETURNING id",
        )
        .bind(email.trim().to_lowercase())
        .bind(subscriber_email.trim().to_lowercase())
        .bind(role)
        .bind(now)
        .bind(now)
        .fetch_one(executor)
        .await?;

        Ok(id)
    }

    /// Conta somente usuários com papel de colaborador preenchido; contas de
    /// dono ficam fora da quota de usuários.
    pub async fn count_collaborators<'e, E>(
        &self,
        executor: E,
        subscriber_email: &str,
    ) -> Result<i64, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM users \
             WHERE LOWER(TRIM(COALESCE(subscriber_email, ''))) = ? \
             AND profile_role IS NOT NULL AND TRIM(profile_role) <> ''",
        )
        .bind(subscriber_email.trim().to_lowercase())
        .fetch_one(executor)
        .await?;

        Ok(count)
    }
}
