// src/services/snapshot_loader.rs

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::{
    api::IdentityGateway,
    middleware::route_guard::RouteGuard,
    models::auth::CurrentUser,
    session::context::SessionContext,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Rota pública: sem identidade, sem carregar, sem chamar o backend.
    Public,
    Loaded(CurrentUser),
    /// Já havia snapshot para esta rota protegida.
    Cached,
    /// Já existe uma busca pendente; não disparamos outra.
    AlreadyLoading,
    /// Falha de rede ou autenticação; a identidade fica vazia.
    Failed(String),
}

// Carrega o snapshot do usuário logado ao entrar em rotas protegidas.
// Não redireciona em caso de 401: isso é papel do transporte.
pub struct SnapshotLoader {
    gateway: Arc<dyn IdentityGateway>,
    guard: RouteGuard,
    loading: AtomicBool,
    last_error: Mutex<Option<String>>,
}

// Libera a trava de busca mesmo se o future for descartado no meio
struct LoadingGuard<'a>(&'a AtomicBool);

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl SnapshotLoader {
    pub fn new(gateway: Arc<dyn IdentityGateway>, guard: RouteGuard) -> Self {
        Self {
            gateway,
            guard,
            loading: AtomicBool::new(false),
            last_error: Mutex::new(None),
        }
    }

    pub fn guard(&self) -> &RouteGuard {
        &self.guard
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::Acquire)
    }

    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    fn record_error(&self, message: Option<String>) {
        *self.last_error.lock().unwrap_or_else(|p| p.into_inner()) = message;
    }

    /// Troca a rota do contexto e reage à mudança.
    pub async fn navigate(&self, ctx: &SessionContext, path: &str) -> LoadOutcome {
        let previous = ctx.set_route(path);
        self.on_route_change(ctx, Some(&previous), path).await
    }

    pub async fn on_route_change(
        &self,
        ctx: &SessionContext,
        previous: Option<&str>,
        next: &str,
    ) -> LoadOutcome {
        if self.guard.is_public(next) {
            ctx.clear_identity();
            return LoadOutcome::Public;
        }

        // Vindo de uma rota pública (ou do nada), o snapshot antigo não vale
        let coming_from_public = previous.is_none_or(|p| self.guard.is_public(p));
        if coming_from_public {
            ctx.clear_identity();
        }

        if ctx.has_identity() {
            return LoadOutcome::Cached;
        }

        self.fetch(ctx).await
    }

    /// Busca o snapshot, uma requisição por vez.
    pub async fn fetch(&self, ctx: &SessionContext) -> LoadOutcome {
        if self.loading.swap(true, Ordering::AcqRel) {
            return LoadOutcome::AlreadyLoading;
        }

        let result = {
            let _guard = LoadingGuard(&self.loading);
            self.gateway.fetch_current_user().await
        };

        match result {
            Ok(payload) => {
                let user = CurrentUser::from(payload);
                tracing::info!(
                    "✅ Usuário carregado: {} ({:?} / {:?})",
                    user.username,
                    user.function_code,
                    user.entity_code
                );
                self.record_error(None);
                ctx.set_identity(user.clone());
                LoadOutcome::Loaded(user)
            }
            Err(e) => {
                tracing::warn!("⚠️ Falha ao carregar o usuário atual: {}", e);
                let message = e.user_message();
                self.record_error(Some(message.clone()));
                ctx.clear_identity();
                LoadOutcome::Failed(message)
            }
        }
    }
}
