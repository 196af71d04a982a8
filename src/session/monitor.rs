// src/session/monitor.rs

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use uuid::Uuid;

use crate::models::auth::WarningMarkers;
use crate::session::clock::{Acknowledgement, Clock, SessionClock, SessionState};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

// Estado dividido entre a tarefa de polling e o handle
struct Shared {
    clock: Mutex<SessionClock>,
    state_tx: Arc<watch::Sender<SessionState>>,
    torn_down: AtomicBool,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, SessionClock> {
        self.clock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // Checagem e envio sob a trava do relógio: o teardown marca a flag
    // com a mesma trava, então nada é publicado depois dele.
    fn publish(&self, state: SessionState) {
        let _clock = self.lock();
        if self.torn_down.load(Ordering::Acquire) {
            return;
        }
        self.state_tx.send_if_modified(|current| {
            if *current == state {
                return false;
            }
            *current = state;
            true
        });
    }

    fn mark_torn_down(&self) {
        let _clock = self.lock();
        self.torn_down.store(true, Ordering::Release);
    }
}

/// Um relógio de sessão rodando: a tarefa de polling mais o meio de confirmá-lo
/// e de derrubá-lo. Ao ser descartado, a tarefa é abortada.
pub struct MonitorHandle {
    id: Uuid,
    shared: Arc<Shared>,
    task: Option<JoinHandle<()>>,
}

impl MonitorHandle {
    /// Inicia o polling. O primeiro tick acontece imediatamente.
    pub fn spawn(
        markers: WarningMarkers,
        time_source: Arc<dyn Clock>,
        period: Duration,
        state_tx: Arc<watch::Sender<SessionState>>,
    ) -> Self {
        let id = Uuid::new_v4();

        if let Some(inversion) = markers.inversion() {
            tracing::warn!(
                "⚠️ Horários de aviso fora de ordem ({:?}): {:?}. Mantidos como configurados.",
                inversion,
                markers
            );
        }

        let shared = Arc::new(Shared {
            clock: Mutex::new(SessionClock::new(markers)),
            state_tx,
            torn_down: AtomicBool::new(false),
        });
        shared.publish(SessionState::Normal);

        let task = tokio::spawn(poll_loop(id, shared.clone(), time_source, period));
        tracing::debug!(%id, "⏱️ Relógio de sessão iniciado");

        Self {
            id,
            shared,
            task: Some(task),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.shared.lock().state()
    }

    /// Confirma o aviso exibido. Aviso informativo some; expirada pede logout.
    pub fn acknowledge(&self) -> Acknowledgement {
        let (ack, state) = {
            let mut clock = self.shared.lock();
            let ack = clock.acknowledge();
            (ack, clock.state())
        };
        if ack == Acknowledgement::Dismissed {
            self.shared.publish(state);
        }
        ack
    }

    /// Derruba o relógio. Nenhum tick roda depois desta chamada.
    pub fn teardown(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.shared.mark_torn_down();
        if let Some(task) = self.task.take() {
            task.abort();
            tracing::debug!(id = %self.id, "🛑 Relógio de sessão encerrado");
        }
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn poll_loop(id: Uuid, shared: Arc<Shared>, time_source: Arc<dyn Clock>, period: Duration) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        interval.tick().await;

        if shared.torn_down.load(Ordering::Acquire) {
            break;
        }

        let now = time_source.now();
        let transition = shared.lock().evaluate(now);

        if let Some(state) = transition {
            tracing::info!(%id, ?state, %now, "🔔 Estado da sessão mudou");
            shared.publish(state);

            if state == SessionState::Expired {
                // Estado terminal: para de comparar
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::clock::ManualClock;
    use chrono::{NaiveDate, NaiveDateTime};

    fn at(hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 14)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    fn start(manual: &ManualClock) -> (MonitorHandle, watch::Receiver<SessionState>) {
        let (tx, rx) = watch::channel(SessionState::Normal);
        let handle = MonitorHandle::spawn(
            WarningMarkers::new("09:00", "09:05", "09:10"),
            Arc::new(manual.clone()),
            DEFAULT_POLL_INTERVAL,
            Arc::new(tx),
        );
        (handle, rx)
    }

    // Nenhuma mudança publicada no período (canal fechado também conta)
    async fn quiet_for(rx: &mut watch::Receiver<SessionState>, secs: u64) -> bool {
        !matches!(
            tokio::time::timeout(Duration::from_secs(secs), rx.changed()).await,
            Ok(Ok(()))
        )
    }

    #[tokio::test(start_paused = true)]
    async fn first_tick_is_immediate() {
        let manual = ManualClock::new(at(9, 2));
        let (handle, mut rx) = start(&manual);

        tokio::time::timeout(Duration::from_secs(1), rx.changed())
            .await
            .expect("primeiro tick deveria ser imediato")
            .unwrap();
        assert_eq!(*rx.borrow(), SessionState::FirstWarningShown);
        assert_eq!(handle.state(), SessionState::FirstWarningShown);
    }

    #[tokio::test(start_paused = true)]
    async fn polling_follows_the_wall_clock() {
        let manual = ManualClock::new(at(8, 59));
        let (_handle, mut rx) = start(&manual);
        assert!(quiet_for(&mut rx, 30).await);

        manual.set(at(9, 7));
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), SessionState::SecondWarningShown);

        manual.set(at(9, 11));
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), SessionState::Expired);
    }

    #[tokio::test(start_paused = true)]
    async fn missed_ticks_resolve_to_expired() {
        let manual = ManualClock::new(at(8, 59));
        let (_handle, mut rx) = start(&manual);
        assert!(quiet_for(&mut rx, 15).await);

        manual.set(at(9, 12));
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), SessionState::Expired);
    }

    #[tokio::test(start_paused = true)]
    async fn dismissed_warning_stays_dismissed() {
        let manual = ManualClock::new(at(9, 2));
        let (handle, mut rx) = start(&manual);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), SessionState::FirstWarningShown);

        assert_eq!(handle.acknowledge(), Acknowledgement::Dismissed);
        assert_eq!(*rx.borrow_and_update(), SessionState::Normal);

        manual.set(at(9, 3));
        assert!(quiet_for(&mut rx, 60).await);
        assert_eq!(handle.state(), SessionState::Normal);

        manual.set(at(9, 5));
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), SessionState::SecondWarningShown);
    }

    #[tokio::test(start_paused = true)]
    async fn no_transition_after_teardown() {
        let manual = ManualClock::new(at(8, 0));
        let (handle, mut rx) = start(&manual);
        assert!(quiet_for(&mut rx, 15).await);

        handle.teardown();
        manual.set(at(23, 0));
        assert!(quiet_for(&mut rx, 120).await);
        assert_eq!(*rx.borrow(), SessionState::Normal);
    }

    #[tokio::test(start_paused = true)]
    async fn late_publish_after_teardown_is_discarded() {
        let manual = ManualClock::new(at(9, 2));
        let (handle, mut rx) = start(&manual);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), SessionState::FirstWarningShown);

        // Uma avaliação que termine depois do teardown não pode escrever nada
        let shared = handle.shared.clone();
        handle.teardown();
        shared.state_tx.send_replace(SessionState::Normal);
        rx.borrow_and_update();

        shared.publish(SessionState::Expired);
        assert!(!rx.has_changed().unwrap());
        assert_eq!(*rx.borrow(), SessionState::Normal);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_handle_stops_polling() {
        let manual = ManualClock::new(at(8, 0));
        let (handle, mut rx) = start(&manual);
        drop(handle);

        manual.set(at(23, 0));
        assert!(quiet_for(&mut rx, 120).await);
        assert_eq!(*rx.borrow(), SessionState::Normal);
    }
}
