// src/models/entity.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use std::collections::HashMap;

// Limites de paginação. Página é 1-based, como o frontend espera.
pub const DEFAULT_PAGE_LIMIT: i64 = 20;
pub const MAX_PAGE_LIMIT: i64 = 100;

// ---
// 1. Entity (o documento genérico por tenant)
// ---
// Uma linha da tabela `entities`: envelope tipado + payload JSON livre.
// O `subscriber_email` é a chave de isolamento; NULL = tenant global/master.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    pub id: i64,
    pub entity_type: String,
    pub data: Value,
    pub subscriber_email: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---
// 2. FilterValue (filtro tipado sobre chaves do payload)
// ---
// O recurso é schema-less de propósito, então o filtro é um mapa
// chave -> variante. `IsNull` casa tanto chave ausente quanto null literal.
// A string "null" vinda da query é promovida para `IsNull` aqui, em vez de
// circular como sentinela pelo resto do código.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterValue {
    Equals(String),
    IsNull,
}

impl FilterValue {
    pub fn from_raw(raw: &str) -> Self {
        if raw == "null" {
            FilterValue::IsNull
        } else {
            FilterValue::Equals(raw.to_string())
        }
    }
}

/// Converte os pares soltos da query string em filtros tipados.
/// Chaves que não são identificadores seguros são descartadas.
pub fn parse_filters(raw: &HashMap<String, String>) -> HashMap<String, FilterValue> {
    raw.iter()
        .filter(|(key, _)| is_safe_key(key))
        .map(|(key, value)| (key.clone(), FilterValue::from_raw(value)))
        .collect()
}

/// Só aceitamos chaves que podem virar caminho JSON sem escape.
pub fn is_safe_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
}

// ---
// 3. Ordenação
// ---
// Campo simples, prefixo '-' para descendente. Padrão: created_at DESC.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub field: String,
    pub descending: bool,
}

impl OrderBy {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim).filter(|s| !s.is_empty()) {
            Some(raw) => {
                let (field, descending) = match raw.strip_prefix('-') {
                    Some(rest) => (rest, true),
                    None => (raw, false),
                };
                if is_safe_key(field) || Self::is_envelope_column(field) {
                    return OrderBy {
                        field: field.to_string(),
                        descending,
                    };
                }
                Self::default()
            }
            None => Self::default(),
        }
    }

    pub fn is_envelope_column(field: &str) -> bool {
        matches!(field, "id" | "entity_type" | "created_at" | "updated_at")
    }
}

impl Default for OrderBy {
    fn default() -> Self {
        OrderBy {
            field: "created_at".to_string(),
            descending: true,
        }
    }
}

// ---
// 4. ListQuery / EntityPage
// ---
#[derive(Debug, Clone)]
pub struct ListQuery {
    pub filters: HashMap<String, FilterValue>,
    pub order_by: OrderBy,
    pub page: i64,
    pub limit: i64,
}

impl Default for ListQuery {
    fn default() -> Self {
        ListQuery {
            filters: HashMap::new(),
            order_by: OrderBy::default(),
            page: 1,
            limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

impl ListQuery {
    /// Normaliza página e limite para dentro das faixas válidas.
    pub fn clamped(mut self) -> Self {
        if self.page < 1 {
            self.page = 1;
        }
        if self.limit < 1 {
            self.limit = DEFAULT_PAGE_LIMIT;
        }
        if self.limit > MAX_PAGE_LIMIT {
            self.limit = MAX_PAGE_LIMIT;
        }
        self
    }
}

// A contagem e a página usam o MESMO predicado; `total` nunca diverge do
// filtro aplicado aos itens.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityPage {
    pub items: Vec<Entity>,
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub total_pages: i64,
}
