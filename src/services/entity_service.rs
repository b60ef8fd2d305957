// src/services/entity_service.rs

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::SqlitePool;

use crate::{
    common::error::AppError,
    db::{EntityRepository, SubscriberRepository},
    models::entity::{Entity, EntityPage, ListQuery},
    models::{auth::User, tenancy::TenantScope},
    services::{
        notifier::NotificationSink,
        order_status::{TransitionCheck, validate_transition},
        quota::{
            ORDER_ENTITY_TYPE, QuotaCheck, QuotaValidator, ResourceClass, SubscriptionGate,
            order_window,
        },
        tenant_resolver::resolve_scope,
    },
};

// Rede de segurança: uma transação de quota presa além disso é descartada
// (rollback via drop) e o incidente vai para o log.
const GATED_CREATE_TIMEOUT: Duration = Duration::from_secs(10);

// ---
// Resultados esperados como valores, nunca como exceção
// ---
#[derive(Debug)]
pub enum CreateOutcome {
    Created(Entity),
    QuotaExceeded(QuotaCheck),
}

#[derive(Debug)]
pub enum BulkOutcome {
    Created(Vec<Entity>),
    QuotaExceeded(QuotaCheck),
}

#[derive(Debug)]
pub enum UpdateOutcome {
    Updated {
        entity: Entity,
        // Presente quando a mutação passou pela máquina de estados.
        transition: Option<TransitionCheck>,
    },
    NotFound,
    InvalidTransition(TransitionCheck),
}

// ---
// O serviço
// ---
// Toda mutação segue o mesmo fio: resolver escopo -> validar quota
// (transacional para os tipos gatilhados) -> escrever no escopo -> (pedidos)
// validar a transição -> emitir evento pós-commit.
#[derive(Clone)]
pub struct EntityService {
    pool: SqlitePool,
    entities: EntityRepository,
    quota: QuotaValidator,
    notifier: Arc<dyn NotificationSink>,
}

impl EntityService {
    pub fn new(pool: SqlitePool, notifier: Arc<dyn NotificationSink>) -> Self {
        let entities = EntityRepository::new(pool.clone());
        let subscribers = SubscriberRepository::new(pool.clone());
        let quota = QuotaValidator::new(pool.clone(), entities.clone(), subscribers);
        Self {
            pool,
            entities,
            quota,
            notifier,
        }
    }

    pub fn quota(&self) -> &QuotaValidator {
        &self.quota
    }

    // =========================================================================
    //  LEITURAS
    // =========================================================================

    pub async fn list(
        &self,
        principal: &User,
        act_as: Option<&str>,
        entity_type: &str,
        query: &ListQuery,
    ) -> Result<EntityPage, AppError> {
        let scope = resolve_scope(principal, act_as);
        self.entities.list(&scope, entity_type, query).await
    }

    /// Não encontrado é um resultado normal (None), não um erro.
    pub async fn get(
        &self,
        principal: &User,
        act_as: Option<&str>,
        entity_type: &str,
        id: i64,
    ) -> Result<Option<Entity>, AppError> {
        let scope = resolve_scope(principal, act_as);
        self.entities
            .get_by_id(&self.pool, &scope, entity_type, id)
            .await
    }

    // =========================================================================
    //  CRIAÇÃO
    // =========================================================================

    pub async fn create(
        &self,
        principal: &User,
        act_as: Option<&str>,
        entity_type: &str,
        payload: Value,
    ) -> Result<CreateOutcome, AppError> {
        let payload = normalize_payload(entity_type, payload)?;
        let scope = resolve_scope(principal, act_as);

        // Master e tipos sem quota não passam pelo caminho transacional.
        let resource = ResourceClass::for_entity_type(entity_type);
        let gate = match resource {
            Some(_) if !principal.is_master => {
                match self.quota.gate(scope.subscriber_email()).await? {
                    SubscriptionGate::Eligible { permissions, .. } => Some(permissions),
                    SubscriptionGate::Blocked(check) => {
                        return Ok(CreateOutcome::QuotaExceeded(check));
                    }
                }
            }
            _ => None,
        };

        let (limit, since, label) = match (resource, gate) {
            (Some(ResourceClass::Products), Some(perms)) => {
                (perms.products_limit, None, "produtos")
            }
            (Some(ResourceClass::Orders), Some(perms)) => match order_window(&perms) {
                Some(window) => (window.limit, window.since, window.label),
                None => (-1, None, "pedidos"),
            },
            _ => (-1, None, ""),
        };

        if limit == -1 {
            let entity = self
                .entities
                .create(&self.pool, &scope, entity_type, &payload)
                .await?;
            self.notify(created_event(entity_type), &entity).await;
            return Ok(CreateOutcome::Created(entity));
        }

        // Caminho de alta contenção: COUNT e INSERT presos na mesma
        // transação. Duas criações concorrentes contra a última vaga nunca
        // passam as duas.
        let gated = self.gated_create(&scope, entity_type, &payload, limit, since, label);
        let outcome = match tokio::time::timeout(GATED_CREATE_TIMEOUT, gated).await {
            Ok(outcome) => outcome?,
            Err(_) => {
                tracing::error!(
                    tipo = entity_type,
                    tenant = scope.subscriber_email().unwrap_or("global"),
                    "Transação de quota segurou a conexão além do tempo limite; \
                     descartada com rollback."
                );
                return Err(AppError::TransactionTimeout);
            }
        };

        if let CreateOutcome::Created(entity) = &outcome {
            self.notify(created_event(entity_type), entity).await;
        }
        Ok(outcome)
    }

    async fn gated_create(
        &self,
        scope: &TenantScope,
        entity_type: &str,
        payload: &Value,
        limit: i64,
        since: Option<DateTime<Utc>>,
        label: &str,
    ) -> Result<CreateOutcome, AppError> {
        let mut tx = self.pool.begin().await?;

        // Primeira instrução da transação: o INSERT condicionado, que lê a
        // contagem e grava na mesma instrução.
        let created = self
            .entities
            .create_if_below(&mut *tx, scope, entity_type, payload, limit, since)
            .await?;

        match created {
            Some(entity) => {
                tx.commit().await?;
                Ok(CreateOutcome::Created(entity))
            }
            None => {
                // Janela cheia: nenhuma linha foi escrita. Recontamos dentro
                // da transação para devolver os números exatos.
                let current = self
                    .entities
                    .count_in_window(&mut *tx, scope, entity_type, since)
                    .await?;
                tx.rollback().await?;
                Ok(CreateOutcome::QuotaExceeded(QuotaCheck::evaluate(
                    limit, current, label,
                )))
            }
        }
    }

    /// Lote: uma única inserção multi-linha, mesmo carimbo de tenant. A
    /// quota vale para o lote inteiro (sem sucesso parcial).
    pub async fn create_bulk(
        &self,
        principal: &User,
        act_as: Option<&str>,
        entity_type: &str,
        payloads: Vec<Value>,
    ) -> Result<BulkOutcome, AppError> {
        let payloads = payloads
            .into_iter()
            .map(|p| normalize_payload(entity_type, p))
            .collect::<Result<Vec<_>, _>>()?;
        let scope = resolve_scope(principal, act_as);

        let resource = ResourceClass::for_entity_type(entity_type);
        let (limit, since, label) = match resource {
            Some(class) if !principal.is_master => {
                match self.quota.gate(scope.subscriber_email()).await? {
                    SubscriptionGate::Blocked(check) => {
                        return Ok(BulkOutcome::QuotaExceeded(check));
                    }
                    SubscriptionGate::Eligible { permissions, .. } => match class {
                        ResourceClass::Products => (permissions.products_limit, None, "produtos"),
                        ResourceClass::Orders => match order_window(&permissions) {
                            Some(w) => (w.limit, w.since, w.label),
                            None => (-1, None, "pedidos"),
                        },
                        ResourceClass::Users => (-1, None, ""),
                    },
                }
            }
            _ => (-1, None, ""),
        };

        let mut tx = self.pool.begin().await?;

        if limit != -1 {
            let current = self
                .entities
                .count_in_window(&mut *tx, &scope, entity_type, since)
                .await?;
            if current + payloads.len() as i64 > limit {
                tx.rollback().await?;
                return Ok(BulkOutcome::QuotaExceeded(QuotaCheck::evaluate(
                    limit, current, label,
                )));
            }
        }

        let entities = self
            .entities
            .create_bulk(&mut *tx, &scope, entity_type, &payloads)
            .await?;
        tx.commit().await?;

        for entity in &entities {
            self.notify(created_event(entity_type), entity).await;
        }
        Ok(BulkOutcome::Created(entities))
    }

    // =========================================================================
    //  ATUALIZAÇÃO
    // =========================================================================

    /// Read-modify-write com merge raso: chaves não citadas sobrevivem.
    /// Para pedidos, a troca de `data.status` passa pela máquina de estados
    /// ANTES de qualquer escrita; recusa não toca linha nenhuma.
    pub async fn update(
        &self,
        principal: &User,
        act_as: Option<&str>,
        entity_type: &str,
        id: i64,
        partial: Value,
    ) -> Result<UpdateOutcome, AppError> {
        if !partial.is_object() {
            return Err(AppError::InvalidPayload(
                "O corpo da atualização precisa ser um objeto JSON.".to_string(),
            ));
        }
        let scope = resolve_scope(principal, act_as);

        let mut tx = self.pool.begin().await?;

        let Some(current) = self
            .entities
            .get_by_id(&mut *tx, &scope, entity_type, id)
            .await?
        else {
            return Ok(UpdateOutcome::NotFound);
        };

        let mut transition = None;
        if entity_type == ORDER_ENTITY_TYPE {
            if let Some(next_raw) = partial.get("status") {
                let next = next_raw.as_str().unwrap_or_default();
                let from = current
                    .data
                    .get("status")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                let check = validate_transition(from, next, principal.is_master);
                if !check.valid {
                    // Drop da transação = rollback; o pedido fica como está.
                    return Ok(UpdateOutcome::InvalidTransition(check));
                }
                transition = Some(check);
            }
        }

        let merged = merge_payload(&current.data, &partial);
        let Some(entity) = self
            .entities
            .set_data(&mut *tx, &scope, entity_type, id, &merged)
            .await?
        else {
            return Ok(UpdateOutcome::NotFound);
        };
        tx.commit().await?;

        let event = match &transition {
            Some(check) if check.changed => "order.status_changed",
            _ => "entity.updated",
        };
        self.notify(event, &entity).await;

        Ok(UpdateOutcome::Updated { entity, transition })
    }

    // =========================================================================
    //  REMOÇÃO
    // =========================================================================

    /// `false` quando nada casou no escopo (não é erro).
    pub async fn delete(
        &self,
        principal: &User,
        act_as: Option<&str>,
        entity_type: &str,
        id: i64,
    ) -> Result<bool, AppError> {
        let scope = resolve_scope(principal, act_as);

        let mut tx = self.pool.begin().await?;
        let existing = self
            .entities
            .get_by_id(&mut *tx, &scope, entity_type, id)
            .await?;
        let deleted = self
            .entities
            .delete(&mut *tx, &scope, entity_type, id)
            .await?;
        tx.commit().await?;

        if deleted {
            if let Some(entity) = existing {
                self.notify("entity.deleted", &entity).await;
            }
        }
        Ok(deleted)
    }

    // Pós-commit, melhor esforço: o sink não tem como desfazer a mutação.
    async fn notify(&self, event: &str, entity: &Entity) {
        self.notifier.emit(event, entity).await;
    }
}

fn created_event(entity_type: &str) -> &'static str {
    if entity_type == ORDER_ENTITY_TYPE {
        "order.created"
    } else {
        "entity.created"
    }
}

/// Criações exigem objeto JSON; pedidos sem status entram como "new".
fn normalize_payload(entity_type: &str, payload: Value) -> Result<Value, AppError> {
    let Value::Object(mut obj) = payload else {
        return Err(AppError::InvalidPayload(
            "O payload da entidade precisa ser um objeto JSON.".to_string(),
        ));
    };
    if entity_type == ORDER_ENTITY_TYPE && !obj.contains_key("status") {
        obj.insert("status".to_string(), Value::String("new".to_string()));
    }
    Ok(Value::Object(obj))
}

/// Merge raso: as chaves do parcial sobrescrevem, o resto sobrevive.
/// Envelope (id, tenant, carimbos) não passa por aqui e é imutável.
fn merge_payload(stored: &Value, partial: &Value) -> Value {
    let mut merged = stored.as_object().cloned().unwrap_or_default();
    if let Some(obj) = partial.as_object() {
        for (key, value) in obj {
            merged.insert(key.clone(), value.clone());
        }
    }
    Value::Object(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn merge_raso_preserva_chaves_nao_citadas() {
        let stored = json!({"name": "old", "price": 10});
        let partial = json!({"name": "X"});
        assert_eq!(
            merge_payload(&stored, &partial),
            json!({"name": "X", "price": 10})
        );
    }

    #[test]
    fn pedido_sem_status_entra_como_new() {
        let payload = normalize_payload(ORDER_ENTITY_TYPE, json!({"total": 42})).unwrap();
        assert_eq!(payload["status"], "new");
    }

    #[test]
    fn payload_nao_objeto_e_recusado() {
        assert!(normalize_payload("Dish", json!([1, 2, 3])).is_err());
    }
}
