//src/main.rs

use axum::{
    Router,
    middleware as axum_middleware,
    routing::{get, post, put},
};
use std::env;
use tokio::net::TcpListener;

use pedemais_backend::{config::AppState, handlers, middleware::auth::auth_guard};

#[tokio::main]
async fn main() {
    // Inicializa o logger.
    tracing_subscriber::fmt().with_target(false).compact().init();

    // .expect() é bom aqui: se a configuração falhar, a aplicação não deve iniciar.
    let app_state = AppState::new()
        .await
        .expect("Falha ao inicializar o estado da aplicação.");

    // Roda as migrações do SQLx na inicialização
    sqlx::migrate!()
        .run(&app_state.db_pool)
        .await
        .expect("Falha ao rodar as migrações do banco de dados.");

    tracing::info!("✅ Migrações do banco de dados executadas com sucesso!");

    // CRUD genérico de entidades, tudo atrás do guard de autenticação
    let entity_routes = Router::new()
        .route(
            "/{entity_type}",
            get(handlers::entities::list_entities).post(handlers::entities::create_entity),
        )
        .route("/{entity_type}/bulk", post(handlers::entities::create_bulk))
        .route(
            "/{entity_type}/{id}",
            get(handlers::entities::get_entity)
                .put(handlers::entities::update_entity)
                .delete(handlers::entities::delete_entity),
        )
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            auth_guard,
        ));

    let order_routes = Router::new()
        .route("/{id}/status", put(handlers::orders::update_order_status))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            auth_guard,
        ));

    // Gestão de assinantes e planos (somente master)
    let subscriber_routes = Router::new()
        .route("/", post(handlers::subscribers::create_subscriber))
        .route("/{email}/plan", put(handlers::subscribers::change_plan))
        .route("/{email}/status", put(handlers::subscribers::change_status))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            auth_guard,
        ));

    let quota_routes = Router::new()
        .route("/{resource}", get(handlers::quota::quota_status))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            auth_guard,
        ));

    // Combina tudo no router principal
    let app = Router::new()
        .route("/api/health", get(|| async { "OK" }))
        .nest("/api/entities", entity_routes)
        .nest("/api/orders", order_routes)
        .nest("/api/subscribers", subscriber_routes)
        .nest("/api/quota", quota_routes)
        .with_state(app_state);

    // Inicia o servidor
    let addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = TcpListener::bind(&addr)
        .await
        .expect("Falha ao iniciar o listener TCP");
    tracing::info!("🚀 Servidor escutando em {}", listener.local_addr().unwrap());
    axum::serve(listener, app).await.expect("Erro no servidor Axum");
}
