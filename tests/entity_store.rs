// tests/entity_store.rs
//
// O armazenamento genérico: isolamento entre tenants, filtros, paginação e
// merge de atualização.

mod common;

use std::collections::HashMap;
use std::sync::Arc;

use common::{master, owner, scope};
use pedemais_backend::db::EntityRepository;
use pedemais_backend::models::entity::{FilterValue, ListQuery, OrderBy};
use pedemais_backend::models::tenancy::TenantScope;
use pedemais_backend::services::EntityService;
use pedemais_backend::services::entity_service::{BulkOutcome, CreateOutcome, UpdateOutcome};
use pedemais_backend::services::notifier::LogNotifier;
use serde_json::json;
use sqlx::SqlitePool;

fn service(pool: &SqlitePool) -> EntityService {
    EntityService::new(pool.clone(), Arc::new(LogNotifier))
}

#[sqlx::test]
async fn isolamento_entre_tenants(pool: SqlitePool) {
    let repo = EntityRepository::new(pool.clone());
    let scope_a = scope("a@teste.com");
    let scope_b = scope("b@teste.com");

    let dish_a = repo
        .create(&pool, &scope_a, "Dish", &json!({"name": "Feijoada"}))
        .await
        .unwrap();
    let dish_b = repo
        .create(&pool, &scope_b, "Dish", &json!({"name": "Moqueca"}))
        .await
        .unwrap();

    // Cada lista só enxerga o próprio tenant, mesmo com o mesmo tipo.
    let page_a = repo
        .list(&scope_a, "Dish", &ListQuery::default())
        .await
        .unwrap();
    assert_eq!(page_a.total, 1);
    assert_eq!(page_a.items[0].id, dish_a.id);

    let page_b = repo
        .list(&scope_b, "Dish", &ListQuery::default())
        .await
        .unwrap();
    assert_eq!(page_b.total, 1);
    assert_eq!(page_b.items[0].id, dish_b.id);

    // Busca por id atravessando o escopo: resultado vazio, não erro.
    let cross = repo.get_by_id(&pool, &scope_a, "Dish", dish_b.id).await.unwrap();
    assert!(cross.is_none());

    // O escopo global também não enxerga os tenants.
    let global = repo
        .list(&TenantScope::Global, "Dish", &ListQuery::default())
        .await
        .unwrap();
    assert_eq!(global.total, 0);
}

#[sqlx::test]
async fn criacao_seguida_de_busca_devolve_o_payload(pool: SqlitePool) {
    let repo = EntityRepository::new(pool.clone());
    let tenant = scope("loja@teste.com");
    let payload = json!({"name": "Pastel", "price": 12.5, "tags": ["frito", "salgado"]});

    let created = repo.create(&pool, &tenant, "Dish", &payload).await.unwrap();
    assert!(created.id > 0);
    assert_eq!(created.subscriber_email.as_deref(), Some("loja@teste.com"));

    let fetched = repo
        .get_by_id(&pool, &tenant, "Dish", created.id)
        .await
        .unwrap()
        .expect("a entidade recém-criada deveria existir no escopo");
    assert_eq!(fetched.data, payload);
    assert_eq!(fetched.created_at, created.created_at);
}

#[sqlx::test]
async fn atualizacao_mescla_e_preserva_campos(pool: SqlitePool) {
    let svc = service(&pool);
    let dono = owner("loja@teste.com");

    let CreateOutcome::Created(entity) = svc
        .create(&dono, None, "Category", json!({"name": "old", "price": 10}))
        .await
        .unwrap()
    else {
        panic!("categoria não é gatilhada por quota");
    };

    let outcome = svc
        .update(&dono, None, "Category", entity.id, json!({"name": "X"}))
        .await
        .unwrap();

    let UpdateOutcome::Updated { entity, .. } = outcome else {
        panic!("esperava atualização, veio {outcome:?}");
    };
    // Chave não citada sobrevive ao merge.
    assert_eq!(entity.data, json!({"name": "X", "price": 10}));
}

#[sqlx::test]
async fn atualizacao_fora_do_escopo_e_not_found(pool: SqlitePool) {
    let svc = service(&pool);
    let dono = owner("loja@teste.com");
    let intruso = owner("intruso@teste.com");

    let CreateOutcome::Created(entity) = svc
        .create(&dono, None, "Category", json!({"name": "Bebidas"}))
        .await
        .unwrap()
    else {
        panic!("criação deveria passar");
    };

    let outcome = svc
        .update(&intruso, None, "Category", entity.id, json!({"name": "Hack"}))
        .await
        .unwrap();
    assert!(matches!(outcome, UpdateOutcome::NotFound));

    // E o registro original ficou intacto.
    let intacto = svc
        .get(&dono, None, "Category", entity.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(intacto.data["name"], "Bebidas");
}

#[sqlx::test]
async fn delete_devolve_true_e_depois_false(pool: SqlitePool) {
    let svc = service(&pool);
    let dono = owner("loja@teste.com");

    let CreateOutcome::Created(entity) = svc
        .create(&dono, None, "Category", json!({"name": "Sobremesas"}))
        .await
        .unwrap()
    else {
        panic!("criação deveria passar");
    };

    assert!(svc.delete(&dono, None, "Category", entity.id).await.unwrap());
    // Segunda remoção: nada casou, e isso não é erro.
    assert!(!svc.delete(&dono, None, "Category", entity.id).await.unwrap());
}

#[sqlx::test]
async fn paginacao_conta_e_pagina_com_o_mesmo_predicado(pool: SqlitePool) {
    let repo = EntityRepository::new(pool.clone());
    let tenant = scope("loja@teste.com");

    for i in 0..25 {
        repo.create(&pool, &tenant, "Dish", &json!({"name": format!("prato-{i}"), "pos": i}))
            .await
            .unwrap();
    }

    let query = ListQuery {
        page: 3,
        limit: 10,
        ..ListQuery::default()
    };
    let page = repo.list(&tenant, "Dish", &query).await.unwrap();
    assert_eq!(page.total, 25);
    assert_eq!(page.total_pages, 3);
    assert_eq!(page.page, 3);
    assert_eq!(page.items.len(), 5);
}

#[sqlx::test]
async fn filtros_equals_e_is_null(pool: SqlitePool) {
    let repo = EntityRepository::new(pool.clone());
    let tenant = scope("loja@teste.com");

    repo.create(&pool, &tenant, "Dish", &json!({"name": "Suco", "categoria": "bebidas"}))
        .await
        .unwrap();
    repo.create(&pool, &tenant, "Dish", &json!({"name": "Água", "categoria": null}))
        .await
        .unwrap();
    repo.create(&pool, &tenant, "Dish", &json!({"name": "Bolo"}))
        .await
        .unwrap();

    let mut filters = HashMap::new();
    filters.insert(
        "categoria".to_string(),
        FilterValue::Equals("bebidas".to_string()),
    );
    let page = repo
        .list(&tenant, "Dish", &ListQuery { filters, ..ListQuery::default() })
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].data["name"], "Suco");

    // IsNull casa chave ausente E null literal.
    let mut filters = HashMap::new();
    filters.insert("categoria".to_string(), FilterValue::IsNull);
    let page = repo
        .list(&tenant, "Dish", &ListQuery { filters, ..ListQuery::default() })
        .await
        .unwrap();
    assert_eq!(page.total, 2);
}

#[sqlx::test]
async fn filtro_compara_a_forma_textual_do_valor(pool: SqlitePool) {
    let repo = EntityRepository::new(pool.clone());
    let tenant = scope("loja@teste.com");

    repo.create(&pool, &tenant, "Dish", &json!({"name": "Caldo", "price": 10}))
        .await
        .unwrap();

    let mut filters = HashMap::new();
    filters.insert("price".to_string(), FilterValue::Equals("10".to_string()));
    let page = repo
        .list(&tenant, "Dish", &ListQuery { filters, ..ListQuery::default() })
        .await
        .unwrap();
    assert_eq!(page.total, 1);
}

#[sqlx::test]
async fn ordenacao_por_campo_do_payload(pool: SqlitePool) {
    let repo = EntityRepository::new(pool.clone());
    let tenant = scope("loja@teste.com");

    for (name, price) in [("a", 30), ("b", 10), ("c", 20)] {
        repo.create(&pool, &tenant, "Dish", &json!({"name": name, "price": price}))
            .await
            .unwrap();
    }

    let query = ListQuery {
        order_by: OrderBy::parse(Some("-price")),
        ..ListQuery::default()
    };
    let page = repo.list(&tenant, "Dish", &query).await.unwrap();
    let names: Vec<_> = page
        .items
        .iter()
        .map(|e| e.data["name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(names, ["a", "c", "b"]);
}

#[sqlx::test]
async fn fallback_legado_casa_pelo_payload_quando_a_coluna_e_nula(pool: SqlitePool) {
    let repo = EntityRepository::new(pool.clone());
    let tenant = scope("legado@teste.com");

    // Linha antiga: coluna de tenant nula, e-mail só dentro do payload.
    sqlx::query(
        "INSERT INTO entities (entity_type, data, subscriber_email, created_at, updated_at) \
         VALUES ('Dish', ?, NULL, ?, ?)",
    )
    .bind(json!({"name": "Antigo", "subscriber_email": "Legado@Teste.com"}))
    .bind(chrono::Utc::now())
    .bind(chrono::Utc::now())
    .execute(&pool)
    .await
    .unwrap();

    // Linha nova: coluna preenchida com caixa mista e espaços.
    sqlx::query(
        "INSERT INTO entities (entity_type, data, subscriber_email, created_at, updated_at) \
         VALUES ('Dish', ?, ' LEGADO@teste.com ', ?, ?)",
    )
    .bind(json!({"name": "Novo"}))
    .bind(chrono::Utc::now())
    .bind(chrono::Utc::now())
    .execute(&pool)
    .await
    .unwrap();

    let page = repo
        .list(&tenant, "Dish", &ListQuery::default())
        .await
        .unwrap();
    assert_eq!(page.total, 2);
}

#[sqlx::test]
async fn bulk_compartilha_o_carimbo_de_tenant(pool: SqlitePool) {
    let svc = service(&pool);
    let chefe = master();

    // Master importando o cardápio de um assinante via "agir como".
    let outcome = svc
        .create_bulk(
            &chefe,
            Some("loja@teste.com"),
            "Category",
            vec![json!({"name": "Massas"}), json!({"name": "Carnes"})],
        )
        .await
        .unwrap();

    let BulkOutcome::Created(entities) = outcome else {
        panic!("master não é barrado por quota");
    };
    assert_eq!(entities.len(), 2);
    for entity in &entities {
        assert_eq!(entity.subscriber_email.as_deref(), Some("loja@teste.com"));
    }

    // Lote vazio: inserção nenhuma, resultado vazio.
    let outcome = svc
        .create_bulk(&chefe, Some("loja@teste.com"), "Category", vec![])
        .await
        .unwrap();
    let BulkOutcome::Created(entities) = outcome else {
        panic!("lote vazio não deveria falhar");
    };
    assert!(entities.is_empty());
}

#[sqlx::test]
async fn escopo_global_e_do_master_sem_override(pool: SqlitePool) {
    let svc = service(&pool);
    let chefe = master();

    let CreateOutcome::Created(entity) = svc
        .create(&chefe, None, "Announcement", json!({"title": "Manutenção"}))
        .await
        .unwrap()
    else {
        panic!("criação global deveria passar");
    };
    assert_eq!(entity.subscriber_email, None);

    // O tenant comum não enxerga o registro global.
    let dono = owner("loja@teste.com");
    let invisivel = svc
        .get(&dono, None, "Announcement", entity.id)
        .await
        .unwrap();
    assert!(invisivel.is_none());
}
