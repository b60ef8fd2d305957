// src/services/order_status.rs

use serde::Serialize;

use crate::models::orders::OrderStatus;

// Veredito da máquina de estados. Puro e sem I/O: o chamador busca o status
// atual antes e aplica o novo depois; aqui só se decide se a troca é legal.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionCheck {
    pub valid: bool,
    // false quando o status pedido é o mesmo já gravado (no-op).
    pub changed: bool,
    pub message: Option<String>,
}

impl TransitionCheck {
    fn ok() -> Self {
        TransitionCheck {
            valid: true,
            changed: true,
            message: None,
        }
    }

    fn unchanged(status: &str) -> Self {
        TransitionCheck {
            valid: true,
            changed: false,
            message: Some(format!("O pedido já está com o status '{status}'.")),
        }
    }

    fn rejected(message: String) -> Self {
        TransitionCheck {
            valid: false,
            changed: false,
            message: Some(message),
        }
    }
}

fn allowed_list(status: OrderStatus) -> String {
    status
        .allowed_next()
        .iter()
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Valida a troca de status `current` -> `next`.
///
/// Master ignora a tabela. Status desconhecido e transição proibida são
/// falhas distintas, com mensagens distintas, para o chamador conseguir
/// diferenciá-las.
pub fn validate_transition(current: &str, next: &str, is_master: bool) -> TransitionCheck {
    if is_master {
        return TransitionCheck::ok();
    }

    let Some(next_status) = OrderStatus::parse(next) else {
        return TransitionCheck::rejected(format!(
            "Status '{}' não é reconhecido.",
            next.trim()
        ));
    };

    let Some(current_status) = OrderStatus::parse(current) else {
        return TransitionCheck::rejected(format!(
            "Status atual '{}' não é reconhecido.",
            current.trim()
        ));
    };

    if current_status.is_final() {
        return TransitionCheck::rejected(format!(
            "O pedido já foi encerrado: o status '{current_status}' é final e não admite alterações."
        ));
    }

    if current_status == next_status {
        return TransitionCheck::unchanged(current_status.as_str());
    }

    if current_status.allowed_next().contains(&next_status) {
        return TransitionCheck::ok();
    }

    TransitionCheck::rejected(format!(
        "Transição inválida de '{current_status}' para '{next_status}'. \
         Próximos status permitidos: {}.",
        allowed_list(current_status)
    ))
}
