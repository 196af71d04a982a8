// src/session/supervisor.rs

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use crate::{
    common::error::AppError,
    middleware::route_guard::RouteGuard,
    models::auth::{CurrentUser, WarningMarkers},
    services::auth::{AuthService, LogoutOutcome},
    session::{
        clock::{Acknowledgement, Clock, SessionState},
        context::SessionContext,
        monitor::MonitorHandle,
    },
};

// Identidade atual do relógio rodando; mudou qualquer coisa, reinicia
#[derive(Debug, Clone, PartialEq, Eq)]
struct RunKey {
    user: CurrentUser,
    route: String,
    poll_interval: Duration,
}

/// Dono do ciclo de vida do relógio de sessão.
///
/// O relógio só roda com identidade (com marcadores), rota protegida e
/// `close_session_on_inactivity` ligado. Qualquer mudança nessas três coisas
/// derruba o relógio atual e, se ainda fizer sentido, sobe outro do zero.
pub struct SessionSupervisor {
    ctx: SessionContext,
    guard: RouteGuard,
    time_source: Arc<dyn Clock>,
    state_tx: Arc<watch::Sender<SessionState>>,
    monitor: Option<(RunKey, MonitorHandle)>,
}

impl SessionSupervisor {
    pub fn new(ctx: SessionContext, guard: RouteGuard, time_source: Arc<dyn Clock>) -> Self {
        let (state_tx, _) = watch::channel(SessionState::Normal);
        Self {
            ctx,
            guard,
            time_source,
            state_tx: Arc::new(state_tx),
            monitor: None,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }

    pub fn state(&self) -> SessionState {
        *self.state_tx.borrow()
    }

    pub fn is_running(&self) -> bool {
        self.monitor.is_some()
    }

    /// Marcadores do relógio em andamento (para os avisos).
    pub fn markers(&self) -> Option<WarningMarkers> {
        self.monitor.as_ref().map(|(key, _)| key.user.markers.clone())
    }

    fn desired(&self) -> Option<RunKey> {
        let settings = self.ctx.settings();
        if !settings.close_session_on_inactivity {
            return None;
        }

        let route = self.ctx.route();
        if !self.guard.is_protected(&route) {
            return None;
        }

        let user = self.ctx.identity().filter(|u| !u.markers.is_empty())?;
        Some(RunKey {
            user,
            route,
            poll_interval: settings.poll_interval,
        })
    }

    /// Confere as pré-condições e (re)inicia ou derruba o relógio.
    /// Devolve se há um relógio rodando.
    pub fn reconcile(&mut self) -> bool {
        let desired = self.desired();

        if let (Some((running, _)), Some(wanted)) = (&self.monitor, &desired) {
            if running == wanted {
                return true;
            }
        }

        self.teardown();

        let Some(key) = desired else {
            return false;
        };

        let handle = MonitorHandle::spawn(
            key.user.markers.clone(),
            self.time_source.clone(),
            key.poll_interval,
            self.state_tx.clone(),
        );
        tracing::info!(
            "⏱️ Monitorando sessão de {} em {} (avisos {:?})",
            key.user.username,
            key.route,
            key.user.markers
        );
        self.monitor = Some((key, handle));
        true
    }

    /// Derruba o relógio e limpa qualquer aviso da tela.
    pub fn teardown(&mut self) {
        if let Some((_, handle)) = self.monitor.take() {
            handle.teardown();
        }
        self.state_tx.send_if_modified(|current| {
            if *current == SessionState::Normal {
                return false;
            }
            *current = SessionState::Normal;
            true
        });
    }

    /// Confirma o aviso na tela. Na expirada faz o logout completo e o
    /// relógio é desmontado de vez.
    pub async fn acknowledge(&mut self, auth: &AuthService) -> Result<Acknowledgement, AppError> {
        let ack = match &self.monitor {
            Some((_, handle)) => handle.acknowledge(),
            None => Acknowledgement::Ignored,
        };

        if ack == Acknowledgement::Logout {
            self.teardown();
            match auth.logout(&self.ctx).await? {
                LogoutOutcome::LoggedOut => tracing::info!("🔒 Sessão expirada encerrada"),
                LogoutOutcome::AlreadyInProgress => {}
            }
        }
        Ok(ack)
    }

    /// Laço que reage às mudanças de identidade, rota e configuração até
    /// `shutdown` ser sinalizado.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let mut identity = self.ctx.subscribe_identity();
        let mut route = self.ctx.subscribe_route();
        let mut settings = self.ctx.subscribe_settings();

        self.reconcile();

        loop {
            tokio::select! {
                changed = identity.changed() => {
                    if changed.is_err() { break; }
                }
                changed = route.changed() => {
                    if changed.is_err() { break; }
                }
                changed = settings.changed() => {
                    if changed.is_err() { break; }
                }
                _ = shutdown.changed() => break,
            }
            self.reconcile();
        }

        self.teardown();
    }
}

impl Drop for SessionSupervisor {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::InMemoryBackend;
    use crate::session::clock::ManualClock;
    use crate::session::context::SessionSettings;
    use chrono::{NaiveDate, NaiveDateTime};

    fn at(hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 14)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    fn user() -> CurrentUser {
        CurrentUser {
            username: "maria".into(),
            function_code: Some("ADM".into()),
            entity_name: Some("Matriz".into()),
            entity_code: Some("EMP01".into()),
            markers: WarningMarkers::new("09:00", "09:05", "09:10"),
        }
    }

    fn setup(now: NaiveDateTime, enabled: bool) -> (SessionContext, ManualClock, SessionSupervisor) {
        let settings = SessionSettings {
            close_session_on_inactivity: enabled,
            ..SessionSettings::default()
        };
        let ctx = SessionContext::new("/permissions", settings);
        ctx.set_identity(user());
        let manual = ManualClock::new(now);
        let supervisor =
            SessionSupervisor::new(ctx.clone(), RouteGuard::default(), Arc::new(manual.clone()));
        (ctx, manual, supervisor)
    }

    async fn wait_for(rx: &mut watch::Receiver<SessionState>, target: SessionState) {
        loop {
            if *rx.borrow_and_update() == target {
                return;
            }
            rx.changed().await.unwrap();
        }
    }

    async fn quiet_for(rx: &mut watch::Receiver<SessionState>, secs: u64) -> bool {
        !matches!(
            tokio::time::timeout(Duration::from_secs(secs), rx.changed()).await,
            Ok(Ok(()))
        )
    }

    #[tokio::test(start_paused = true)]
    async fn disabled_gate_keeps_state_normal() {
        let (_ctx, manual, mut supervisor) = setup(at(8, 0), false);
        let mut rx = supervisor.subscribe();

        assert!(!supervisor.reconcile());
        manual.set(at(23, 59));
        assert!(quiet_for(&mut rx, 300).await);
        assert_eq!(supervisor.state(), SessionState::Normal);
    }

    #[tokio::test(start_paused = true)]
    async fn does_not_run_without_identity_or_on_public_route() {
        let (ctx, _manual, mut supervisor) = setup(at(9, 2), true);

        ctx.clear_identity();
        assert!(!supervisor.reconcile());

        ctx.set_identity(CurrentUser {
            markers: WarningMarkers::default(),
            ..user()
        });
        assert!(!supervisor.reconcile());

        ctx.set_identity(user());
        ctx.set_route("/login");
        assert!(!supervisor.reconcile());

        ctx.set_route("/permissions");
        assert!(supervisor.reconcile());
    }

    #[tokio::test(start_paused = true)]
    async fn failing_precondition_clears_visible_warning() {
        let (ctx, _manual, mut supervisor) = setup(at(9, 2), true);
        let mut rx = supervisor.subscribe();
        supervisor.reconcile();
        wait_for(&mut rx, SessionState::FirstWarningShown).await;

        ctx.reload_settings(SessionSettings {
            close_session_on_inactivity: false,
            ..SessionSettings::default()
        });
        assert!(!supervisor.reconcile());
        assert_eq!(supervisor.state(), SessionState::Normal);
    }

    #[tokio::test(start_paused = true)]
    async fn route_change_restarts_from_scratch() {
        let (ctx, manual, mut supervisor) = setup(at(9, 2), true);
        let mut rx = supervisor.subscribe();
        supervisor.reconcile();
        wait_for(&mut rx, SessionState::FirstWarningShown).await;

        // Confirmado o 1º aviso, a troca de rota cria um relógio novo,
        // que volta a mostrar o 1º aviso
        supervisor.acknowledge(&auth()).await.unwrap();
        ctx.set_route("/companies");
        manual.set(at(9, 3));
        assert!(supervisor.reconcile());
        wait_for(&mut rx, SessionState::FirstWarningShown).await;
        assert_eq!(supervisor.state(), SessionState::FirstWarningShown);
    }

    #[tokio::test(start_paused = true)]
    async fn identity_change_on_same_route_restarts_clock() {
        let (ctx, _manual, mut supervisor) = setup(at(9, 2), true);
        let mut rx = supervisor.subscribe();
        supervisor.reconcile();
        wait_for(&mut rx, SessionState::FirstWarningShown).await;
        let first_id = supervisor.monitor.as_ref().map(|(_, h)| h.id());

        // Novo snapshot com horários mais tarde: relógio novo, aviso some
        ctx.set_identity(CurrentUser {
            markers: WarningMarkers::new("09:30", "09:40", "09:50"),
            ..user()
        });
        assert!(supervisor.reconcile());
        let second_id = supervisor.monitor.as_ref().map(|(_, h)| h.id());
        assert_ne!(first_id, second_id);
        assert_eq!(supervisor.state(), SessionState::Normal);
        assert_eq!(
            supervisor.markers(),
            Some(WarningMarkers::new("09:30", "09:40", "09:50"))
        );
        wait_for(&mut rx, SessionState::Normal).await;
        assert!(quiet_for(&mut rx, 60).await);

        // Voltando aos horários originais, o 1º aviso aparece de novo
        ctx.set_identity(user());
        assert!(supervisor.reconcile());
        wait_for(&mut rx, SessionState::FirstWarningShown).await;
    }

    #[tokio::test(start_paused = true)]
    async fn unchanged_inputs_keep_the_same_clock() {
        let (_ctx, _manual, mut supervisor) = setup(at(8, 0), true);
        supervisor.reconcile();
        let first_id = supervisor.monitor.as_ref().map(|(_, h)| h.id());
        supervisor.reconcile();
        let second_id = supervisor.monitor.as_ref().map(|(_, h)| h.id());
        assert_eq!(first_id, second_id);
    }

    fn auth() -> AuthService {
        AuthService::new(Arc::new(InMemoryBackend::new()), RouteGuard::default())
    }

    #[tokio::test(start_paused = true)]
    async fn expired_acknowledgement_logs_out_and_tears_down() {
        let backend = Arc::new(InMemoryBackend::new());
        let auth = AuthService::new(backend.clone(), RouteGuard::default());
        let (ctx, manual, mut supervisor) = setup(at(9, 9), true);
        let mut rx = supervisor.subscribe();
        supervisor.reconcile();

        manual.set(at(9, 10));
        wait_for(&mut rx, SessionState::Expired).await;

        assert_eq!(
            supervisor.acknowledge(&auth).await.unwrap(),
            Acknowledgement::Logout
        );
        assert!(!supervisor.is_running());
        assert!(!ctx.has_identity());
        assert_eq!(ctx.route(), "/login");
        assert_eq!(backend.logout_calls(), 1);

        // Sem identidade, não volta a rodar
        assert!(!supervisor.reconcile());
    }

    #[tokio::test(start_paused = true)]
    async fn run_loop_reacts_to_context_changes() {
        let (ctx, _manual, supervisor) = setup(at(9, 2), true);
        let mut rx = supervisor.subscribe();
        let (stop_tx, stop_rx) = watch::channel(false);
        let task = tokio::spawn(supervisor.run(stop_rx));

        wait_for(&mut rx, SessionState::FirstWarningShown).await;

        ctx.set_route("/login");
        wait_for(&mut rx, SessionState::Normal).await;

        stop_tx.send(true).unwrap();
        task.await.unwrap();
    }
}
