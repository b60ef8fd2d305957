// tests/quota.rs
//
// Quota por plano: fronteira exata, ilimitado, janelas de pedidos,
// elegibilidade da assinatura e a corrida de criação concorrente.

mod common;

use std::sync::Arc;

use common::{master, owner};
use pedemais_backend::db::SubscriberRepository;
use pedemais_backend::models::auth::ProfileRole;
use pedemais_backend::models::tenancy::{Plan, SubscriberStatus};
use pedemais_backend::services::EntityService;
use pedemais_backend::services::entity_service::CreateOutcome;
use pedemais_backend::services::notifier::LogNotifier;
use pedemais_backend::services::quota::ResourceClass;
use serde_json::json;
use sqlx::SqlitePool;

const TENANT: &str = "sub@test.com";

fn service(pool: &SqlitePool) -> EntityService {
    EntityService::new(pool.clone(), Arc::new(LogNotifier))
}

async fn seed_subscriber(pool: &SqlitePool, plan: Plan) -> SubscriberRepository {
    let repo = SubscriberRepository::new(pool.clone());
    repo.create(pool, TENANT, plan).await.unwrap();
    repo
}

#[sqlx::test]
async fn fronteira_de_produtos_do_plano_free(pool: SqlitePool) {
    // free: products_limit = 30.
    let subs = seed_subscriber(&pool, Plan::Free).await;
    let svc = service(&pool);
    let dono = owner(TENANT);

    for i in 0..30 {
        let outcome = svc
            .create(&dono, None, "Dish", json!({"name": format!("prato-{i}")}))
            .await
            .unwrap();
        assert!(
            matches!(outcome, CreateOutcome::Created(_)),
            "o prato {i} ainda cabe no limite"
        );
    }

    // O 31º bate no teto com os números exatos.
    let outcome = svc
        .create(&dono, None, "Dish", json!({"name": "prato-31"}))
        .await
        .unwrap();
    let CreateOutcome::QuotaExceeded(check) = outcome else {
        panic!("o 31º prato deveria estourar a quota");
    };
    assert_eq!(check.limit, 30);
    assert_eq!(check.current, 30);
    assert_eq!(check.remaining, 0);
    assert!(check.error.as_deref().unwrap().contains("30/30"));

    // Upgrade para pro (produtos ilimitados) libera a mesma criação.
    subs.set_plan(&pool, TENANT, Plan::Pro).await.unwrap().unwrap();
    let outcome = svc
        .create(&dono, None, "Dish", json!({"name": "prato-31"}))
        .await
        .unwrap();
    assert!(matches!(outcome, CreateOutcome::Created(_)));
}

#[sqlx::test]
async fn limite_ilimitado_nunca_bloqueia(pool: SqlitePool) {
    seed_subscriber(&pool, Plan::Pro).await;
    let svc = service(&pool);
    let dono = owner(TENANT);

    for i in 0..300 {
        let outcome = svc
            .create(&dono, None, "Dish", json!({"name": format!("prato-{i}")}))
            .await
            .unwrap();
        assert!(matches!(outcome, CreateOutcome::Created(_)), "falhou no {i}");
    }
}

#[sqlx::test]
async fn janela_diaria_de_pedidos_do_free(pool: SqlitePool) {
    // free: orders_per_day = 10.
    seed_subscriber(&pool, Plan::Free).await;
    let svc = service(&pool);
    let dono = owner(TENANT);

    for _ in 0..10 {
        let outcome = svc
            .create(&dono, None, "Order", json!({"total": 25.0}))
            .await
            .unwrap();
        assert!(matches!(outcome, CreateOutcome::Created(_)));
    }

    let outcome = svc
        .create(&dono, None, "Order", json!({"total": 25.0}))
        .await
        .unwrap();
    let CreateOutcome::QuotaExceeded(check) = outcome else {
        panic!("o 11º pedido do dia deveria ser barrado");
    };
    assert_eq!(check.limit, 10);
    assert_eq!(check.current, 10);
    assert!(check.error.as_deref().unwrap().contains("pedidos hoje"));
}

#[sqlx::test]
async fn plano_custom_usa_a_janela_mensal_como_fallback(pool: SqlitePool) {
    let subs = seed_subscriber(&pool, Plan::Custom).await;
    // Sem limite diário: o mensal é o tier efetivo.
    subs.set_permissions(
        &pool,
        TENANT,
        Some(json!({"productsLimit": -1, "ordersPerDay": null, "ordersPerMonth": 3})),
    )
    .await
    .unwrap()
    .unwrap();

    let svc = service(&pool);
    let dono = owner(TENANT);

    for _ in 0..3 {
        let outcome = svc
            .create(&dono, None, "Order", json!({"total": 10.0}))
            .await
            .unwrap();
        assert!(matches!(outcome, CreateOutcome::Created(_)));
    }

    let outcome = svc
        .create(&dono, None, "Order", json!({"total": 10.0}))
        .await
        .unwrap();
    let CreateOutcome::QuotaExceeded(check) = outcome else {
        panic!("o 4º pedido do mês deveria ser barrado");
    };
    assert_eq!(check.limit, 3);
    assert!(check.error.as_deref().unwrap().contains("pedidos no mês"));
}

#[sqlx::test]
async fn quota_de_usuarios_conta_so_colaboradores(pool: SqlitePool) {
    // free: users_limit = 2.
    let subs = seed_subscriber(&pool, Plan::Free).await;
    let svc = service(&pool);

    subs.add_collaborator(&pool, TENANT, "garcom@test.com", ProfileRole::Garcom)
        .await
        .unwrap();

    // Conta de dono (sem papel) não entra na contagem.
    sqlx::query(
        "INSERT INTO users (email, is_master, subscriber_email, profile_role, created_at, updated_at) \
         VALUES ('dono@test.com', 0, ?, NULL, ?, ?)",
    )
    .bind(TENANT)
    .bind(chrono::Utc::now())
    .bind(chrono::Utc::now())
    .execute(&pool)
    .await
    .unwrap();

    let check = svc
        .quota()
        .validate(ResourceClass::Users, Some(TENANT), false)
        .await
        .unwrap();
    assert!(check.valid);
    assert_eq!(check.current, 1);
    assert_eq!(check.remaining, 1);

    subs.add_collaborator(&pool, TENANT, "cozinha@test.com", ProfileRole::Cozinha)
        .await
        .unwrap();

    // Encostou no teto: a PRÓXIMA criação está bloqueada.
    let check = svc
        .quota()
        .validate(ResourceClass::Users, Some(TENANT), false)
        .await
        .unwrap();
    assert!(!check.valid);
    assert_eq!(check.current, 2);
    assert_eq!(check.limit, 2);
}

#[sqlx::test]
async fn assinatura_inativa_ou_expirada_e_recusada(pool: SqlitePool) {
    let subs = seed_subscriber(&pool, Plan::Free).await;
    let svc = service(&pool);
    let dono = owner(TENANT);

    subs.set_status(&pool, TENANT, SubscriberStatus::Suspended)
        .await
        .unwrap()
        .unwrap();
    let outcome = svc
        .create(&dono, None, "Dish", json!({"name": "Pizza"}))
        .await
        .unwrap();
    let CreateOutcome::QuotaExceeded(check) = outcome else {
        panic!("assinatura suspensa não pode criar");
    };
    assert!(check.error.as_deref().unwrap().contains("inativa"));

    // Reativa, mas com validade no passado: continua recusada.
    subs.set_status(&pool, TENANT, SubscriberStatus::Active)
        .await
        .unwrap()
        .unwrap();
    subs.set_expiration(&pool, TENANT, Some(chrono::Utc::now() - chrono::Duration::days(1)))
        .await
        .unwrap()
        .unwrap();
    let check = svc
        .quota()
        .validate(ResourceClass::Products, Some(TENANT), false)
        .await
        .unwrap();
    assert!(!check.valid);
    assert!(check.error.is_some());
}

#[sqlx::test]
async fn sem_tenant_tem_mensagem_propria(pool: SqlitePool) {
    let svc = service(&pool);

    let check = svc
        .quota()
        .validate(ResourceClass::Products, None, false)
        .await
        .unwrap();
    assert!(!check.valid);
    // Mensagem distinta da de assinatura inativa: a correção aqui é de
    // vínculo de conta, não de plano.
    assert!(check.error.as_deref().unwrap().contains("sem assinante"));
}

#[sqlx::test]
async fn master_bypassa_qualquer_quota(pool: SqlitePool) {
    let svc = service(&pool);
    let chefe = master();

    let check = svc
        .quota()
        .validate(ResourceClass::Orders, None, true)
        .await
        .unwrap();
    assert!(check.valid);
    assert_eq!(check.limit, -1);

    // Master cria em nome de um assinante inexistente sem ser barrado.
    let outcome = svc
        .create(&chefe, Some("fantasma@test.com"), "Dish", json!({"name": "X"}))
        .await
        .unwrap();
    assert!(matches!(outcome, CreateOutcome::Created(_)));
}

#[sqlx::test]
async fn corrida_pela_ultima_vaga_admite_um_so_vencedor(pool: SqlitePool) {
    // free: orders_per_day = 10. Deixa exatamente 1 vaga na janela.
    seed_subscriber(&pool, Plan::Free).await;
    let svc = service(&pool);
    let dono = owner(TENANT);

    for _ in 0..9 {
        let outcome = svc
            .create(&dono, None, "Order", json!({"total": 5.0}))
            .await
            .unwrap();
        assert!(matches!(outcome, CreateOutcome::Created(_)));
    }

    // 8 criações concorrentes disputando a última vaga.
    let mut handles = Vec::new();
    for i in 0..8 {
        let svc = svc.clone();
        let dono = dono.clone();
        handles.push(tokio::spawn(async move {
            svc.create(&dono, None, "Order", json!({"total": 5.0, "seq": i}))
                .await
        }));
    }

    let mut created = 0;
    let mut blocked = 0;
    for handle in handles {
        match handle.await.unwrap().unwrap() {
            CreateOutcome::Created(_) => created += 1,
            CreateOutcome::QuotaExceeded(check) => {
                assert_eq!(check.limit, 10);
                blocked += 1;
            }
        }
    }

    // O COUNT e o INSERT andam presos na mesma transação: nunca dois
    // vencedores.
    assert_eq!(created, 1, "exatamente uma criação deveria vencer a corrida");
    assert_eq!(blocked, 7);

    let check = svc
        .quota()
        .validate(ResourceClass::Orders, Some(TENANT), false)
        .await
        .unwrap();
    assert_eq!(check.current, 10);
    assert!(!check.valid);
}
