// src/services/tenant_resolver.rs

use crate::models::{auth::User, tenancy::TenantScope};

/// Normalização canônica de e-mail de tenant: sem espaços, minúsculo.
pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Resolve o escopo de tenant de uma requisição.
///
/// `act_as` é o "agir como assinante" do master: um parâmetro explícito e
/// imutável, nunca uma mutação do principal compartilhado. Para quem não é
/// master ele é ignorado.
///
/// O escopo resolvido aqui é usado identicamente para filtrar leituras e
/// carimbar escritas; não existe caminho que leia com um escopo e grave com
/// outro.
pub fn resolve_scope(principal: &User, act_as: Option<&str>) -> TenantScope {
    if principal.is_master {
        return match act_as.map(normalize_email).filter(|e| !e.is_empty()) {
            Some(email) => TenantScope::Subscriber(email),
            None => TenantScope::Global,
        };
    }

    // Assinante comum: o vínculo explícito vence; sem vínculo, o próprio
    // e-mail do usuário é o tenant (dono agindo como ele mesmo).
    let email = principal
        .subscriber_email
        .as_deref()
        .map(normalize_email)
        .filter(|e| !e.is_empty())
        .unwrap_or_else(|| normalize_email(&principal.email));

    TenantScope::Subscriber(email)
}
