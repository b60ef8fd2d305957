// src/models/auth.rs

use serde::{Deserialize, Serialize};

// Papéis de colaborador dentro de um assinante. Contas de dono não carregam
// papel e não contam na quota de usuários.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ProfileRole {
    Entregador,
    Cozinha,
    Pdv,
    Garcom,
    Gerente,
}

// O principal autenticado, reconstruído das claims do JWT.
//
// Exatamente um de {is_master=true} ou {subscriber_email preenchido}
// determina o escopo. O "agir como assinante" do master NÃO mora aqui:
// ele chega como parâmetro explícito e imutável da requisição, nunca como
// mutação deste objeto.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub email: String,
    pub is_master: bool,
    pub subscriber_email: Option<String>,
    pub profile_role: Option<ProfileRole>,
}

// Estrutura de dados ("claims") dentro do JWT.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // e-mail do usuário
    #[serde(default)]
    pub is_master: bool,
    #[serde(default)]
    pub subscriber_email: Option<String>,
    #[serde(default)]
    pub profile_role: Option<ProfileRole>,
    pub exp: usize,
    pub iat: usize,
}

impl From<Claims> for User {
    fn from(claims: Claims) -> Self {
        User {
            email: claims.sub,
            is_master: claims.is_master,
            subscriber_email: claims.subscriber_email,
            profile_role: claims.profile_role,
        }
    }
}
