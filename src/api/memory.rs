// src/api/memory.rs

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;

use crate::api::{IdentityGateway, PermissionStore};
use crate::common::error::AppError;
use crate::models::auth::CurrentUserResponse;
use crate::models::permission::{Permission, PermissionRecord};

// Backend em memória: usado no modo demonstração e nos testes.
// Segue o mesmo contrato do servidor: gravar sobrescreve pela chave.
#[derive(Default)]
pub struct InMemoryBackend {
    permissions: Mutex<Vec<Permission>>,
    next_id: AtomicUsize,
    current_user: Mutex<Option<CurrentUserResponse>>,
    reject_next: Mutex<Option<String>>,
    fetch_user_calls: AtomicUsize,
    submit_calls: AtomicUsize,
    logout_calls: AtomicUsize,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(user: CurrentUserResponse) -> Self {
        let backend = Self::new();
        backend.set_current_user(Some(user));
        backend
    }

    /// `None` simula sessão inexistente (401).
    pub fn set_current_user(&self, user: Option<CurrentUserResponse>) {
        *self.current_user.lock().unwrap_or_else(|p| p.into_inner()) = user;
    }

    /// A próxima gravação é recusada com esta mensagem.
    pub fn reject_next_submit(&self, message: &str) {
        *self.reject_next.lock().unwrap_or_else(|p| p.into_inner()) = Some(message.to_string());
    }

    pub fn fetch_user_calls(&self) -> usize {
        self.fetch_user_calls.load(Ordering::SeqCst)
    }

    pub fn submit_calls(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
    }

    pub fn logout_calls(&self) -> usize {
        self.logout_calls.load(Ordering::SeqCst)
    }

    pub fn stored(&self) -> Vec<Permission> {
        self.permissions.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

#[async_trait]
impl IdentityGateway for InMemoryBackend {
    async fn fetch_current_user(&self) -> Result<CurrentUserResponse, AppError> {
        self.fetch_user_calls.fetch_add(1, Ordering::SeqCst);
        self.current_user
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
            .ok_or(AppError::Unauthorized)
    }

    async fn logout(&self) -> Result<(), AppError> {
        self.logout_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl PermissionStore for InMemoryBackend {
    async fn submit_permission(&self, record: &PermissionRecord) -> Result<(), AppError> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(message) = self.reject_next.lock().unwrap_or_else(|p| p.into_inner()).take() {
            return Err(AppError::Rejected { message });
        }

        let mut permissions = self.permissions.lock().unwrap_or_else(|p| p.into_inner());

        // Mesma chave (id, ou usuário + função + empresa) = sobrescreve
        let existing = permissions.iter().position(|p| match record.permission_id {
            Some(id) => p.permission_id == Some(id),
            None => {
                p.user_id == record.user_id
                    && p.function_id == record.function_id
                    && p.entity_code == record.entity_code
            }
        });

        match existing {
            Some(index) => {
                let id = permissions[index].permission_id.unwrap_or_default();
                let created_at = permissions[index].created_at.unwrap_or_else(Utc::now);
                permissions[index] = record.clone().into_permission(id, created_at);
            }
            None => {
                let id = self.next_id.fetch_add(1, Ordering::SeqCst) as i64 + 1;
                permissions.push(record.clone().into_permission(id, Utc::now()));
            }
        }
        Ok(())
    }

    async fn fetch_permissions(&self, user_id: i64) -> Result<Vec<Permission>, AppError> {
        let permissions = self.permissions.lock().unwrap_or_else(|p| p.into_inner());
        Ok(permissions
            .iter()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect())
    }
}
