// src/db/entity_repo.rs

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{Executor, QueryBuilder, Sqlite, SqlitePool};

use crate::{
    common::error::AppError,
    models::entity::{Entity, EntityPage, FilterValue, ListQuery, OrderBy, is_safe_key},
    models::tenancy::TenantScope,
};

const ENTITY_COLUMNS: &str = "id, entity_type, data, subscriber_email, created_at, updated_at";

#[derive(Clone)]
pub struct EntityRepository {
    pool: SqlitePool,
}

impl EntityRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // =========================================================================
    //  PREDICADO DE ESCOPO
    // =========================================================================

    // Todo SELECT/UPDATE/DELETE desta tabela passa por aqui. Comparação de
    // e-mail sempre com TRIM + LOWER. O fallback legado casa linhas antigas
    // (coluna de tenant nula) pelo campo `subscriber_email` do payload, e
    // SOMENTE quando a coluna é nula.
    fn push_scope_predicate(qb: &mut QueryBuilder<'_, Sqlite>, scope: &TenantScope) {
        match scope {
            TenantScope::Global => {
                qb.push(" AND subscriber_email IS NULL");
            }
            TenantScope::Subscriber(email) => {
                let email = email.trim().to_lowercase();
                qb.push(" AND (LOWER(TRIM(subscriber_email)) = ")
                    .push_bind(email.clone())
                    .push(" OR (subscriber_email IS NULL AND LOWER(TRIM(CAST(json_extract(data, '$.subscriber_email') AS TEXT))) = ")
                    .push_bind(email)
                    .push("))");
            }
        }
    }

    fn push_filter_predicate(
        qb: &mut QueryBuilder<'_, Sqlite>,
        filters: &std::collections::HashMap<String, FilterValue>,
    ) {
        for (key, filter) in filters {
            // As chaves já foram saneadas no parse; a checagem aqui é a
            // última barreira antes de interpolar o caminho JSON.
            if !is_safe_key(key) {
                continue;
            }
            match filter {
                FilterValue::Equals(value) => {
                    qb.push(format!(
                        " AND CAST(json_extract(data, '$.{key}') AS TEXT) = "
                    ))
                    .push_bind(value.clone());
                }
                FilterValue::IsNull => {
                    // json_extract devolve NULL tanto para chave ausente
                    // quanto para null literal, que é o contrato do filtro.
                    qb.push(format!(" AND json_extract(data, '$.{key}') IS NULL"));
                }
            }
        }
    }

    fn push_count_window(qb: &mut QueryBuilder<'_, Sqlite>, since: Option<DateTime<Utc>>) {
        if let Some(since) = since {
            qb.push(" AND created_at >= ").push_bind(since);
        }
    }

    // =========================================================================
    //  LEITURAS
    // =========================================================================

    pub async fn get_by_id<'e, E>(
        &self,
        executor: E,
        scope: &TenantScope,
        entity_type: &str,
        id: i64,
    ) -> Result<Option<Entity>, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let mut qb = QueryBuilder::new(format!(
            "SELECT {ENTITY_COLUMNS} FROM entities WHERE id = "
        ));
        qb.push_bind(id)
            .push(" AND entity_type = ")
            .push_bind(entity_type.to_string());
        Self::push_scope_predicate(&mut qb, scope);

        let entity = qb
            .build_query_as::<Entity>()
            .fetch_optional(executor)
            .await?;

        Ok(entity)
    }

    /// Lista paginada. A contagem e a busca da página compartilham o mesmo
    /// predicado, então `total` reflete exatamente o filtro aplicado.
    pub async fn list(
        &self,
        scope: &TenantScope,
        entity_type: &str,
        query: &ListQuery,
    ) -> Result<EntityPage, AppError> {
        let query = query.clone().clamped();

        let mut count_qb = QueryBuilder::new("SELECT COUNT(*) FROM entities WHERE entity_type = ");
        count_qb.push_bind(entity_type.to_string());
        Self::push_scope_predicate(&mut count_qb, scope);
        Self::push_filter_predicate(&mut count_qb, &query.filters);
        let total: i64 = count_qb
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;

        let mut qb = QueryBuilder::new(format!(
            "SELECT {ENTITY_COLUMNS} FROM entities WHERE entity_type = "
        ));
        qb.push_bind(entity_type.to_string());
        Self::push_scope_predicate(&mut qb, scope);
        Self::push_filter_predicate(&mut qb, &query.filters);

        // Última barreira antes de interpolar o campo de ordenação.
        let order_by = if is_safe_key(&query.order_by.field)
            || OrderBy::is_envelope_column(&query.order_by.field)
        {
            query.order_by.clone()
        } else {
            OrderBy::default()
        };
        let direction = if order_by.descending { "DESC" } else { "ASC" };
        if OrderBy::is_envelope_column(&order_by.field) {
            qb.push(format!(" ORDER BY {} {direction}", order_by.field));
        } else {
            // Campo do payload: ordena pelo valor extraído do JSON.
            qb.push(format!(
                " ORDER BY json_extract(data, '$.{}') {direction}",
                order_by.field
            ));
        }
        // Desempate estável para a paginação.
        qb.push(format!(", id {direction}"));

        qb.push(" LIMIT ")
            .push_bind(query.limit)
            .push(" OFFSET ")
            .push_bind((query.page - 1) * query.limit);

        let items = qb.build_query_as::<Entity>().fetch_all(&self.pool).await?;

        let total_pages = if total == 0 {
            0
        } else {
            (total + query.limit - 1) / query.limit
        };

        Ok(EntityPage {
            items,
            page: query.page,
            limit: query.limit,
            total,
            total_pages,
        })
    }

    /// Contagem de uso para a quota. `since` delimita a janela (dia/mês).
    pub async fn count_in_window<'e, E>(
        &self,
        executor: E,
        scope: &TenantScope,
        entity_type: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<i64, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM entities WHERE entity_type = ");
        qb.push_bind(entity_type.to_string());
        Self::push_scope_predicate(&mut qb, scope);
        Self::push_count_window(&mut qb, since);

        let count: i64 = qb.build_query_scalar().fetch_one(executor).await?;
        Ok(count)
    }

    // =========================================================================
    //  ESCRITAS
    // =========================================================================

    pub async fn create<'e, E>(
        &self,
        executor: E,
        scope: &TenantScope,
        entity_type: &str,
        payload: &Value,
    ) -> Result<Entity, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let now = Utc::now();
        let entity = sqlx::query_as::<_, Entity>(&format!(
            "INSERT INTO entities (entity_type, data, subscriber_email, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?) \
             RETURNING {ENTITY_COLUMNS}"
        ))
        .bind(entity_type.to_string())
        .bind(payload.clone())
        .bind(scope.subscriber_email().map(str::to_string))
        .bind(now)
        .bind(now)
        .fetch_one(executor)
        .await?;

        Ok(entity)
    }

    /// Inserção condicionada à quota: o COUNT e o INSERT são UMA única
    /// instrução, executada dentro da transação do chamador. Se a janela já
    /// está cheia, nenhuma linha é escrita e o retorno é `None`.
    pub async fn create_if_below<'e, E>(
        &self,
        executor: E,
        scope: &TenantScope,
        entity_type: &str,
        payload: &Value,
        limit: i64,
        since: Option<DateTime<Utc>>,
    ) -> Result<Option<Entity>, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let now = Utc::now();

        let mut qb = QueryBuilder::new(
            "INSERT INTO entities (entity_type, data, subscriber_email, created_at, updated_at) SELECT ",
        );
        qb.push_bind(entity_type.to_string())
            .push(", ")
            .push_bind(payload.clone())
            .push(", ")
            .push_bind(scope.subscriber_email().map(str::to_string))
            .push(", ")
            .push_bind(now)
            .push(", ")
            .push_bind(now);

        qb.push(" WHERE (SELECT COUNT(*) FROM entities WHERE entity_type = ")
            .push_bind(entity_type.to_string());
        Self::push_scope_predicate(&mut qb, scope);
        Self::push_count_window(&mut qb, since);
        qb.push(") < ").push_bind(limit);

        qb.push(format!(" RETURNING {ENTITY_COLUMNS}"));

        let entity = qb
            .build_query_as::<Entity>()
            .fetch_optional(executor)
            .await?;

        Ok(entity)
    }

    /// Inserção em lote: uma única instrução multi-linha, todas com o mesmo
    /// carimbo de tenant. Sem semântica de sucesso parcial.
    pub async fn create_bulk<'e, E>(
        &self,
        executor: E,
        scope: &TenantScope,
        entity_type: &str,
        payloads: &[Value],
    ) -> Result<Vec<Entity>, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        if payloads.is_empty() {
            return Ok(Vec::new());
        }

        let now = Utc::now();
        let stamp = scope.subscriber_email().map(str::to_string);

        let mut qb = QueryBuilder::new(
            "INSERT INTO entities (entity_type, data, subscriber_email, created_at, updated_at) ",
        );
        qb.push_values(payloads.iter(), |mut row, payload| {
            row.push_bind(entity_type.to_string())
                .push_bind(payload.clone())
                .push_bind(stamp.clone())
                .push_bind(now)
                .push_bind(now);
        });
        qb.push(format!(" RETURNING {ENTITY_COLUMNS}"));

        let entities = qb.build_query_as::<Entity>().fetch_all(executor).await?;
        Ok(entities)
    }

    /// Primitiva de atualização: grava o payload já mesclado pelo serviço.
    /// `id` e carimbo de tenant nunca mudam aqui; `None` = nada casou com
    /// (tipo, id, escopo).
    pub async fn set_data<'e, E>(
        &self,
        executor: E,
        scope: &TenantScope,
        entity_type: &str,
        id: i64,
        data: &Value,
    ) -> Result<Option<Entity>, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let mut qb = QueryBuilder::new("UPDATE entities SET data = ");
        qb.push_bind(data.clone())
            .push(", updated_at = ")
            .push_bind(Utc::now())
            .push(" WHERE id = ")
            .push_bind(id)
            .push(" AND entity_type = ")
            .push_bind(entity_type.to_string());
        Self::push_scope_predicate(&mut qb, scope);
        qb.push(format!(" RETURNING {ENTITY_COLUMNS}"));

        let entity = qb
            .build_query_as::<Entity>()
            .fetch_optional(executor)
            .await?;

        Ok(entity)
    }

    /// Remoção física no escopo. `false` quando nada casou (não é erro).
    pub async fn delete<'e, E>(
        &self,
        executor: E,
        scope: &TenantScope,
        entity_type: &str,
        id: i64,
    ) -> Result<bool, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let mut qb = QueryBuilder::new("DELETE FROM entities WHERE id = ");
        qb.push_bind(id)
            .push(" AND entity_type = ")
            .push_bind(entity_type.to_string());
        Self::push_scope_predicate(&mut qb, scope);

        let result = qb.build().execute(executor).await?;
        Ok(result.rows_affected() > 0)
    }
}
