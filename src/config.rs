// src/config.rs

use anyhow::Context;
use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};
use std::{env, sync::Arc, time::Duration};

use crate::{
    db::{SqlTokenStore, SubscriberRepository, TokenStore},
    services::{EntityService, notifier::LogNotifier},
};

#[derive(Clone)]
pub struct AppState {
    pub db_pool: SqlitePool,
    pub jwt_secret: String,
    pub entity_service: EntityService,
    pub subscribers: SubscriberRepository,
    pub token_store: Arc<dyn TokenStore>,
}

impl AppState {
    pub async fn new() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://pedemais.db?mode=rwc".to_string());
        let jwt_secret = env::var("JWT_SECRET").context("JWT_SECRET deve ser definido")?;

        // Conecta ao banco de dados, usando '?' para propagar erros
        let db_pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&database_url)
            .await?;

        tracing::info!("✅ Conexão com o banco de dados estabelecida com sucesso!");

        Ok(Self::from_pool(db_pool, jwt_secret))
    }

    /// Monta o grafo de dependências sobre uma pool já existente. Os testes
    /// de integração entram por aqui com o banco efêmero do sqlx::test.
    pub fn from_pool(db_pool: SqlitePool, jwt_secret: String) -> Self {
        let entity_service = EntityService::new(db_pool.clone(), Arc::new(LogNotifier));
        let subscribers = SubscriberRepository::new(db_pool.clone());
        let token_store: Arc<dyn TokenStore> = Arc::new(SqlTokenStore::new(db_pool.clone()));

        Self {
            db_pool,
            jwt_secret,
            entity_service,
            subscribers,
            token_store,
        }
    }
}
