// tests/common/mod.rs
#![allow(dead_code)]

use pedemais_backend::models::auth::{ProfileRole, User};
use pedemais_backend::models::tenancy::TenantScope;

/// Dono agindo como ele mesmo: o escopo é o próprio e-mail.
pub fn owner(email: &str) -> User {
    User {
        email: email.to_string(),
        is_master: false,
        subscriber_email: None,
        profile_role: None,
    }
}

pub fn collaborator(email: &str, subscriber: &str, role: ProfileRole) -> User {
    User {
        email: email.to_string(),
        is_master: false,
        subscriber_email: Some(subscriber.to_string()),
        profile_role: Some(role),
    }
}

pub fn master() -> User {
    User {
        email: "admin@pedemais.com".to_string(),
        is_master: true,
        subscriber_email: None,
        profile_role: None,
    }
}

pub fn scope(email: &str) -> TenantScope {
    TenantScope::Subscriber(email.to_string())
}
