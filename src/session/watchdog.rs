// src/session/watchdog.rs

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;

/// Contrato de configuração do watchdog de inatividade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchdogConfig {
    pub enabled: bool,
    pub timeout: Duration,
}

impl WatchdogConfig {
    pub fn from_timeout(timeout: Duration) -> Self {
        Self {
            enabled: !timeout.is_zero(),
            timeout,
        }
    }
}

// Timer de ociosidade independente do relógio de sessão.
// Qualquer atividade registrada reinicia o prazo; estourando, pede logout uma vez.
pub struct InactivityWatchdog {
    activity: Arc<Notify>,
    task: JoinHandle<()>,
}

impl InactivityWatchdog {
    /// `None` quando desabilitado pela configuração.
    pub fn spawn<F, Fut>(config: WatchdogConfig, on_idle: F) -> Option<Self>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if !config.enabled {
            return None;
        }

        let activity = Arc::new(Notify::new());
        let signal = activity.clone();

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = signal.notified() => continue,
                    _ = tokio::time::sleep(config.timeout) => {
                        tracing::info!("💤 Inatividade de {:?}; pedindo logout", config.timeout);
                        on_idle().await;
                        break;
                    }
                }
            }
        });

        Some(Self { activity, task })
    }

    pub fn record_activity(&self) {
        self.activity.notify_one();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for InactivityWatchdog {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// No máximo um watchdog armado: só com usuário logado, sempre com a
/// configuração corrente. Mudou o timeout, o prazo recomeça com o novo valor.
#[derive(Default)]
pub struct WatchdogSlot {
    armed: Option<(WatchdogConfig, InactivityWatchdog)>,
}

impl WatchdogSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// `make_on_idle` só é chamado quando um watchdog novo precisa ser armado.
    pub fn sync<M, F, Fut>(&mut self, logged_in: bool, config: WatchdogConfig, make_on_idle: M)
    where
        M: FnOnce() -> F,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if !logged_in {
            if self.armed.take().is_some() {
                tracing::debug!("Watchdog de inatividade desarmado");
            }
            return;
        }

        if matches!(&self.armed, Some((current, _)) if *current == config) {
            return;
        }

        self.armed = InactivityWatchdog::spawn(config, make_on_idle()).map(|dog| {
            tracing::debug!("Watchdog de inatividade armado ({:?})", config.timeout);
            (config, dog)
        });
    }

    pub fn record_activity(&self) {
        if let Some((_, dog)) = &self.armed {
            dog.record_activity();
        }
    }

    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }
}
