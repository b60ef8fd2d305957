// src/models/tenancy.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;

// ---
// 1. TenantScope (o escopo resolvido de uma requisição)
// ---
// Todo acesso à tabela `entities` filtra leituras e carimba escritas com o
// MESMO escopo. `Global` é o tenant do master (subscriber_email IS NULL).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TenantScope {
    Global,
    Subscriber(String),
}

impl TenantScope {
    /// E-mail que carimba as escritas deste escopo (None = global).
    pub fn subscriber_email(&self) -> Option<&str> {
        match self {
            TenantScope::Global => None,
            TenantScope::Subscriber(email) => Some(email),
        }
    }
}

// ---
// 2. Plan (o tier de assinatura)
// ---
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    Free,
    Basic,
    Pro,
    Ultra,
    Admin,
    Custom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SubscriberStatus {
    Active,
    Inactive,
    Suspended,
    Expired,
}

// ---
// 3. Subscriber (a conta pagante, unidade de isolamento)
// ---
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Subscriber {
    // Chave natural, armazenada em minúsculas.
    pub email: String,
    pub plan: Plan,
    pub status: SubscriberStatus,
    pub expires_at: Option<DateTime<Utc>>,
    // Mapa de permissões usado apenas quando plan == custom.
    pub permissions: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Subscriber {
    /// Assinante elegível para operar: ativo e não expirado.
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.status == SubscriberStatus::Active
            && self.expires_at.map(|exp| exp > now).unwrap_or(true)
    }
}

// ---
// 4. PlanPermissions (limites numéricos + flags do plano)
// ---
// Convenção dos limites: -1 = ilimitado. Para pedidos, `None` em um período
// significa "use o outro período": o limite mensal só vale quando o diário
// não está definido.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlanPermissions {
    pub products_limit: i64,
    pub orders_per_day: Option<i64>,
    pub orders_per_month: Option<i64>,
    pub users_limit: i64,
    pub reports: bool,
    pub kitchen_panel: bool,
    pub delivery_module: bool,
    pub api_access: bool,
}

impl Default for PlanPermissions {
    // Padrão conservador: o tier gratuito.
    fn default() -> Self {
        PlanPermissions {
            products_limit: 30,
            orders_per_day: Some(10),
            orders_per_month: None,
            users_limit: 2,
            reports: false,
            kitchen_panel: false,
            delivery_module: false,
            api_access: false,
        }
    }
}
