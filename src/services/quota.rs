// src/services/quota.rs

use chrono::{DateTime, Datelike, Local, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::Serialize;
use sqlx::SqlitePool;

use crate::{
    common::error::AppError,
    db::{EntityRepository, SubscriberRepository},
    models::tenancy::{PlanPermissions, Subscriber, TenantScope},
    services::{plan_registry, tenant_resolver::normalize_email},
};

// Tipos de entidade gatilhados por quota.
pub const PRODUCT_ENTITY_TYPE: &str = "Dish";
pub const ORDER_ENTITY_TYPE: &str = "Order";

pub const MSG_NO_TENANT: &str =
    "Operação sem assinante vinculado. Associe o usuário a uma conta de assinante.";

// ---
// Classes de recurso contáveis
// ---
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceClass {
    Products,
    Orders,
    Users,
}

impl ResourceClass {
    /// Classe gatilhada pela criação de um tipo de entidade, se houver.
    pub fn for_entity_type(entity_type: &str) -> Option<Self> {
        match entity_type {
            PRODUCT_ENTITY_TYPE => Some(ResourceClass::Products),
            ORDER_ENTITY_TYPE => Some(ResourceClass::Orders),
            _ => None,
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "products" => Some(ResourceClass::Products),
            "orders" => Some(ResourceClass::Orders),
            "users" => Some(ResourceClass::Users),
            _ => None,
        }
    }
}

// ---
// Veredito da quota
// ---
// Sempre um valor, nunca uma exceção: o chamador decide como apresentar.
// Convenção: limit/remaining -1 = ilimitado.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaCheck {
    pub valid: bool,
    pub limit: i64,
    pub current: i64,
    pub remaining: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl QuotaCheck {
    /// Master ou limite -1: passa sem contar.
    pub fn bypass() -> Self {
        QuotaCheck {
            valid: true,
            limit: -1,
            current: 0,
            remaining: -1,
            error: None,
        }
    }

    /// Recusa de elegibilidade (sem tenant, assinatura inativa). Distinta da
    /// quota estourada: aqui não há contagem envolvida.
    pub fn ineligible(message: String) -> Self {
        QuotaCheck {
            valid: false,
            limit: 0,
            current: 0,
            remaining: 0,
            error: Some(message),
        }
    }

    /// Compara contagem e limite. `valid` é estritamente `current < limit`:
    /// quem já encostou no teto tem a PRÓXIMA criação bloqueada.
    pub fn evaluate(limit: i64, current: i64, label: &str) -> Self {
        let valid = current < limit;
        let remaining = (limit - current).max(0);
        let error = if valid {
            None
        } else {
            Some(format!(
                "Limite do plano atingido: {current}/{limit} {label}. \
                 Faça upgrade do plano para liberar mais."
            ))
        };
        QuotaCheck {
            valid,
            limit,
            current,
            remaining,
            error,
        }
    }
}

// ---
// Janela efetiva de pedidos
// ---
// O limite diário, quando definido, é o tier que vale; o mensal é o
// fallback quando o diário é None. Não é uma escolha do chamador.
#[derive(Debug, Clone)]
pub struct OrderQuotaWindow {
    pub limit: i64,
    pub since: Option<DateTime<Utc>>,
    pub label: &'static str,
}

pub fn order_window(permissions: &PlanPermissions) -> Option<OrderQuotaWindow> {
    if let Some(daily) = permissions.orders_per_day {
        return Some(OrderQuotaWindow {
            limit: daily,
            since: Some(start_of_today_local()),
            label: "pedidos hoje",
        });
    }
    if let Some(monthly) = permissions.orders_per_month {
        return Some(OrderQuotaWindow {
            limit: monthly,
            since: Some(start_of_month_local()),
            label: "pedidos no mês",
        });
    }
    // Nenhum período definido: sem teto de pedidos.
    None
}

// Dia/mês correntes no fuso do servidor, convertidos para UTC para comparar
// com os carimbos gravados.
fn local_midnight(day: NaiveDate) -> DateTime<Utc> {
    let naive = day.and_time(NaiveTime::MIN);
    match Local.from_local_datetime(&naive).earliest() {
        Some(dt) => dt.with_timezone(&Utc),
        None => naive.and_utc(),
    }
}

fn start_of_today_local() -> DateTime<Utc> {
    local_midnight(Local::now().date_naive())
}

fn start_of_month_local() -> DateTime<Utc> {
    let today = Local::now().date_naive();
    local_midnight(today.with_day(1).unwrap_or(today))
}

// ---
// Elegibilidade de assinatura
// ---
pub enum SubscriptionGate {
    Eligible {
        subscriber: Subscriber,
        permissions: PlanPermissions,
    },
    Blocked(QuotaCheck),
}

// ---
// O validador
// ---
#[derive(Clone)]
pub struct QuotaValidator {
    pool: SqlitePool,
    entities: EntityRepository,
    subscribers: SubscriberRepository,
}

impl QuotaValidator {
    pub fn new(
        pool: SqlitePool,
        entities: EntityRepository,
        subscribers: SubscriberRepository,
    ) -> Self {
        Self {
            pool,
            entities,
            subscribers,
        }
    }

    /// Resolve o assinante elegível de um e-mail de tenant, ou o motivo da
    /// recusa. As duas recusas têm mensagens distintas de propósito: a
    /// correção de "sem tenant" é vincular a conta; a de "assinatura
    /// inativa" é regularizar o plano.
    pub async fn gate(&self, tenant_email: Option<&str>) -> Result<SubscriptionGate, AppError> {
        let email = match tenant_email
            .map(normalize_email)
            .filter(|e| !e.is_empty())
        {
            Some(email) => email,
            None => {
                return Ok(SubscriptionGate::Blocked(QuotaCheck::ineligible(
                    MSG_NO_TENANT.to_string(),
                )));
            }
        };

        let subscriber = self.subscribers.find_by_email(&self.pool, &email).await?;
        match subscriber {
            Some(sub) if sub.is_usable(Utc::now()) => {
                let permissions = plan_registry::permissions_for_subscriber(&sub);
                Ok(SubscriptionGate::Eligible {
                    subscriber: sub,
                    permissions,
                })
            }
            _ => Ok(SubscriptionGate::Blocked(QuotaCheck::ineligible(format!(
                "Assinatura de '{email}' inativa, expirada ou inexistente."
            )))),
        }
    }

    /// Verificação de quota para leitura/exibição e para os recursos de
    /// baixa contenção. O caminho de criação de entidades gatilhadas usa a
    /// variante transacional no serviço de entidades.
    pub async fn validate(
        &self,
        resource: ResourceClass,
        tenant_email: Option<&str>,
        is_master: bool,
    ) -> Result<QuotaCheck, AppError> {
        if is_master {
            return Ok(QuotaCheck::bypass());
        }

        let (subscriber, permissions) = match self.gate(tenant_email).await? {
            SubscriptionGate::Eligible {
                subscriber,
                permissions,
            } => (subscriber, permissions),
            SubscriptionGate::Blocked(check) => return Ok(check),
        };

        let scope = TenantScope::Subscriber(subscriber.email.clone());
        let (limit, since, label) = match resource {
            ResourceClass::Products => (permissions.products_limit, None, "produtos"),
            ResourceClass::Users => (permissions.users_limit, None, "usuários"),
            ResourceClass::Orders => match order_window(&permissions) {
                Some(window) => (window.limit, window.since, window.label),
                None => (-1, None, "pedidos"),
            },
        };

        if limit == -1 {
            return Ok(QuotaCheck::bypass());
        }

        let current = match resource {
            ResourceClass::Users => {
                self.subscribers
                    .count_collaborators(&self.pool, &subscriber.email)
                    .await?
            }
            ResourceClass::Products => {
                self.entities
                    .count_in_window(&self.pool, &scope, PRODUCT_ENTITY_TYPE, None)
                    .await?
            }
            ResourceClass::Orders => {
                self.entities
                    .count_in_window(&self.pool, &scope, ORDER_ENTITY_TYPE, since)
                    .await?
            }
        };

        Ok(QuotaCheck::evaluate(limit, current, label))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn janela_diaria_tem_precedencia() {
        let perms = PlanPermissions {
            orders_per_day: Some(10),
            orders_per_month: Some(500),
            ..PlanPermissions::default()
        };
        let window = order_window(&perms).unwrap();
        assert_eq!(window.limit, 10);
        assert_eq!(window.label, "pedidos hoje");
    }

    #[test]
    fn mensal_e_o_fallback() {
        let perms = PlanPermissions {
            orders_per_day: None,
            orders_per_month: Some(500),
            ..PlanPermissions::default()
        };
        let window = order_window(&perms).unwrap();
        assert_eq!(window.limit, 500);
        assert_eq!(window.label, "pedidos no mês");
    }

    #[test]
    fn sem_periodo_definido_nao_ha_teto() {
        let perms = PlanPermissions {
            orders_per_day: None,
            orders_per_month: None,
            ..PlanPermissions::default()
        };
        assert!(order_window(&perms).is_none());
    }

    #[test]
    fn atingir_o_limite_bloqueia_a_proxima_criacao() {
        let check = QuotaCheck::evaluate(30, 29, "produtos");
        assert!(check.valid);
        assert_eq!(check.remaining, 1);

        let check = QuotaCheck::evaluate(30, 30, "produtos");
        assert!(!check.valid);
        assert_eq!(check.remaining, 0);
        let msg = check.error.unwrap();
        assert!(msg.contains("30/30"), "mensagem: {msg}");
    }
}
