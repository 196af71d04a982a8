// src/api.rs

// Os colaboradores remotos do console. O backend é a autoridade;
// aqui só ficam os contratos e as duas implementações (HTTP e memória).

use async_trait::async_trait;

use crate::common::error::AppError;
use crate::models::auth::CurrentUserResponse;
use crate::models::permission::{Permission, PermissionRecord};

pub mod http;
pub use http::HttpBackend;
pub mod memory;
pub use memory::InMemoryBackend;

#[async_trait]
pub trait IdentityGateway: Send + Sync {
    /// Usuário autenticado e seus horários de aviso.
    async fn fetch_current_user(&self) -> Result<CurrentUserResponse, AppError>;

    /// Encerra a sessão no servidor. Chamar duas vezes não pode quebrar nada.
    async fn logout(&self) -> Result<(), AppError>;
}

#[async_trait]
pub trait PermissionStore: Send + Sync {
    /// Substituição completa do registro; o backend sobrescreve pela chave.
    async fn submit_permission(&self, record: &PermissionRecord) -> Result<(), AppError>;

    async fn fetch_permissions(&self, user_id: i64) -> Result<Vec<Permission>, AppError>;
}
