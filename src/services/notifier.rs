// src/services/notifier.rs

use async_trait::async_trait;

use crate::models::entity::Entity;

// Fan-out de eventos pós-commit (painel da cozinha, tracking do entregador).
//
// Contrato: melhor esforço. O emit roda DEPOIS do commit e fora da
// transação; qualquer falha fica do lado de cá do trait, jamais desfaz ou
// mascara a mutação que já foi persistida.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn emit(&self, event: &str, entity: &Entity);
}

/// Sink padrão: registra o evento no log estruturado.
pub struct LogNotifier;

#[async_trait]
impl NotificationSink for LogNotifier {
    async fn emit(&self, event: &str, entity: &Entity) {
        tracing::info!(
            evento = event,
            entidade = entity.id,
            tipo = %entity.entity_type,
            tenant = entity.subscriber_email.as_deref().unwrap_or("global"),
            "Evento emitido"
        );
    }
}
