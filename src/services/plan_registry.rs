// src/services/plan_registry.rs

use crate::models::tenancy::{Plan, PlanPermissions, Subscriber};

/// Tabela estática plano -> limites/flags. -1 = ilimitado; `None` em um
/// período de pedidos = "use o outro período".
pub fn permissions_for(plan: Plan) -> PlanPermissions {
    match plan {
        Plan::Free => PlanPermissions::default(),
        Plan::Basic => PlanPermissions {
            products_limit: 100,
            orders_per_day: None,
            orders_per_month: Some(500),
            users_limit: 5,
            reports: true,
            kitchen_panel: false,
            delivery_module: false,
            api_access: false,
        },
        Plan::Pro => PlanPermissions {
            products_limit: -1,
            orders_per_day: None,
            orders_per_month: Some(2000),
            users_limit: 10,
            reports: true,
            kitchen_panel: true,
            delivery_module: true,
            api_access: false,
        },
        Plan::Ultra | Plan::Admin => PlanPermissions {
            products_limit: -1,
            orders_per_day: None,
            orders_per_month: Some(-1),
            users_limit: -1,
            reports: true,
            kitchen_panel: true,
            delivery_module: true,
            api_access: true,
        },
        // O plano custom não tem entrada estática: os limites vêm do próprio
        // cadastro do assinante. Sem override gravado, cai no padrão free.
        Plan::Custom => PlanPermissions::default(),
    }
}

/// Limites efetivos de um assinante. `custom` lê o mapa `permissions` da
/// própria linha; os demais usam a tabela estática.
pub fn permissions_for_subscriber(subscriber: &Subscriber) -> PlanPermissions {
    if subscriber.plan == Plan::Custom {
        if let Some(raw) = &subscriber.permissions {
            // Campos ausentes no override caem nos padrões do derive.
            if let Ok(perms) = serde_json::from_value::<PlanPermissions>(raw.clone()) {
                return perms;
            }
            tracing::warn!(
                assinante = %subscriber.email,
                "Mapa de permissões custom ilegível; aplicando padrão free."
            );
        }
    }
    permissions_for(subscriber.plan)
}
