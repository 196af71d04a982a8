// src/services/auth.rs

use std::sync::Arc;

use crate::{
    api::IdentityGateway,
    common::error::AppError,
    middleware::route_guard::RouteGuard,
    session::context::SessionContext,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogoutOutcome {
    LoggedOut,
    // Outro gatilho (relógio ou watchdog) já fez o logout
    AlreadyInProgress,
}

// O logout completo: servidor, identidade local e volta para o login.
#[derive(Clone)]
pub struct AuthService {
    gateway: Arc<dyn IdentityGateway>,
    guard: RouteGuard,
}

impl AuthService {
    pub fn new(gateway: Arc<dyn IdentityGateway>, guard: RouteGuard) -> Self {
        Self { gateway, guard }
    }

    /// Idempotente: só a primeira chamada por identidade chega ao servidor.
    pub async fn logout(&self, ctx: &SessionContext) -> Result<LogoutOutcome, AppError> {
        if !ctx.begin_logout() {
            tracing::debug!("Logout já em andamento; ignorando pedido repetido");
            return Ok(LogoutOutcome::AlreadyInProgress);
        }

        let username = ctx.identity().map(|u| u.username);

        // Mesmo que o servidor falhe, a sessão local acaba
        let result = self.gateway.logout().await;

        ctx.clear_identity();
        ctx.set_route(self.guard.login_path());

        match result {
            Ok(()) => {
                tracing::info!("👋 Sessão encerrada para {:?}", username);
                Ok(LogoutOutcome::LoggedOut)
            }
            Err(e) => {
                tracing::warn!("⚠️ Logout no servidor falhou ({}); sessão local encerrada", e);
                Err(e)
            }
        }
    }
}
