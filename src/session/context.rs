// src/session/context.rs

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::watch;

use crate::models::auth::CurrentUser;
use crate::session::watchdog::WatchdogConfig;

/// A parte da configuração que o relógio de sessão e o watchdog leem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    pub close_session_on_inactivity: bool,
    pub poll_interval: Duration,
    // Duration::ZERO desliga o watchdog de inatividade
    pub inactivity_timeout: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            close_session_on_inactivity: true,
            poll_interval: crate::session::monitor::DEFAULT_POLL_INTERVAL,
            inactivity_timeout: Duration::from_secs(900),
        }
    }
}

impl SessionSettings {
    /// Contrato do watchdog derivado da configuração corrente.
    pub fn watchdog(&self) -> WatchdogConfig {
        WatchdogConfig::from_timeout(self.inactivity_timeout)
    }
}

struct ContextInner {
    identity: watch::Sender<Option<CurrentUser>>,
    route: watch::Sender<String>,
    settings: watch::Sender<SessionSettings>,
    logout_started: AtomicBool,
}

/// Estado da sessão do console: identidade, rota atual e configuração.
///
/// É criado explicitamente e passado para quem precisa (loader, relógio,
/// editor). Cada parte publica mudanças num canal `watch`.
#[derive(Clone)]
pub struct SessionContext {
    inner: Arc<ContextInner>,
}

impl SessionContext {
    pub fn new(initial_route: &str, settings: SessionSettings) -> Self {
        let (identity, _) = watch::channel(None);
        let (route, _) = watch::channel(initial_route.to_string());
        let (settings, _) = watch::channel(settings);

        Self {
            inner: Arc::new(ContextInner {
                identity,
                route,
                settings,
                logout_started: AtomicBool::new(false),
            }),
        }
    }

    // --- Identidade ---

    pub fn identity(&self) -> Option<CurrentUser> {
        self.inner.identity.borrow().clone()
    }

    pub fn has_identity(&self) -> bool {
        self.inner.identity.borrow().is_some()
    }

    pub fn set_identity(&self, user: CurrentUser) {
        // Nova identidade: o próximo logout volta a ser permitido
        self.inner.logout_started.store(false, Ordering::Release);
        self.inner.identity.send_replace(Some(user));
    }

    pub fn clear_identity(&self) {
        self.inner.identity.send_if_modified(|current| current.take().is_some());
    }

    pub fn subscribe_identity(&self) -> watch::Receiver<Option<CurrentUser>> {
        self.inner.identity.subscribe()
    }

    // --- Rota ---

    pub fn route(&self) -> String {
        self.inner.route.borrow().clone()
    }

    /// Troca a rota e devolve a anterior.
    pub fn set_route(&self, path: &str) -> String {
        self.inner.route.send_replace(path.to_string())
    }

    pub fn subscribe_route(&self) -> watch::Receiver<String> {
        self.inner.route.subscribe()
    }

    // --- Configuração ---

    pub fn settings(&self) -> SessionSettings {
        self.inner.settings.borrow().clone()
    }

    /// Publica uma configuração recarregada.
    pub fn reload_settings(&self, settings: SessionSettings) {
        self.inner.settings.send_if_modified(|current| {
            if *current == settings {
                return false;
            }
            *current = settings;
            true
        });
    }

    pub fn subscribe_settings(&self) -> watch::Receiver<SessionSettings> {
        self.inner.settings.subscribe()
    }

    // --- Logout ---

    /// `true` apenas para o primeiro pedido de logout da identidade atual.
    pub(crate) fn begin_logout(&self) -> bool {
        !self.inner.logout_started.swap(true, Ordering::AcqRel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::auth::WarningMarkers;

    fn user() -> CurrentUser {
        CurrentUser {
            username: "maria".into(),
            function_code: Some("ADM".into()),
            entity_name: None,
            entity_code: Some("EMP01".into()),
            markers: WarningMarkers::new("17:30", "17:45", "18:00"),
        }
    }

    #[test]
    fn route_changes_return_previous_path() {
        let ctx = SessionContext::new("/login", SessionSettings::default());
        assert_eq!(ctx.set_route("/permissions"), "/login");
        assert_eq!(ctx.route(), "/permissions");
    }

    #[test]
    fn logout_is_granted_once_per_identity() {
        let ctx = SessionContext::new("/", SessionSettings::default());
        ctx.set_identity(user());
        assert!(ctx.begin_logout());
        assert!(!ctx.begin_logout());

        ctx.set_identity(user());
        assert!(ctx.begin_logout());
    }

    #[tokio::test]
    async fn identical_settings_reload_is_not_a_change() {
        let ctx = SessionContext::new("/", SessionSettings::default());
        let mut rx = ctx.subscribe_settings();

        ctx.reload_settings(SessionSettings::default());
        assert!(!rx.has_changed().unwrap());

        ctx.reload_settings(SessionSettings {
            close_session_on_inactivity: false,
            ..SessionSettings::default()
        });
        assert!(rx.has_changed().unwrap());
        assert!(!rx.borrow_and_update().close_session_on_inactivity);
    }

    #[tokio::test]
    async fn reloaded_timeout_reaches_the_watchdog_contract() {
        let ctx = SessionContext::new("/", SessionSettings::default());
        assert_eq!(ctx.settings().watchdog().timeout, Duration::from_secs(900));

        ctx.reload_settings(SessionSettings {
            inactivity_timeout: Duration::ZERO,
            ..SessionSettings::default()
        });
        assert!(!ctx.settings().watchdog().enabled);
    }

    #[test]
    fn clearing_identity_is_observable() {
        let ctx = SessionContext::new("/", SessionSettings::default());
        let mut rx = ctx.subscribe_identity();
        ctx.set_identity(user());
        assert!(rx.has_changed().unwrap());
        rx.borrow_and_update();

        ctx.clear_identity();
        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow().is_none());
        assert!(!ctx.has_identity());
    }
}
