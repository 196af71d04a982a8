// src/session/clock.rs

use std::sync::{Arc, Mutex};

use chrono::{NaiveDateTime, NaiveTime};

use crate::common::dates::anchor_to_day;
use crate::models::auth::WarningMarkers;

// ---
// Fonte de tempo
// ---

/// De onde o relógio de sessão lê o "agora" (hora local, sem fuso).
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// Relógio de parede da máquina.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalClock;

impl Clock for LocalClock {
    fn now(&self) -> NaiveDateTime {
        chrono::Local::now().naive_local()
    }
}

/// Relógio ajustado à mão (testes e modo demonstração).
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<NaiveDateTime>>,
}

impl ManualClock {
    pub fn new(start: NaiveDateTime) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    pub fn set(&self, value: NaiveDateTime) {
        let mut now = self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *now = value;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> NaiveDateTime {
        *self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

// ---
// Máquina de estados do relógio de sessão
// ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Normal,
    FirstWarningShown,
    SecondWarningShown,
    Expired,
}

/// Resultado de confirmar o aviso que está na tela.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acknowledgement {
    /// Aviso informativo fechado; o relógio volta a acompanhar.
    Dismissed,
    /// Sessão expirada confirmada: o chamador precisa fazer o logout completo.
    Logout,
    /// Nada estava sendo exibido.
    Ignored,
}

/// Escalonamento Normal -> 1º aviso -> 2º aviso -> Expirada.
///
/// As flags `*_shown` não voltam atrás ao fechar um aviso: um aviso já exibido
/// não reaparece, só o próximo limite pode disparar.
#[derive(Debug, Clone)]
pub struct SessionClock {
    markers: WarningMarkers,
    state: SessionState,
    first_shown: bool,
    second_shown: bool,
}

// Marcador ausente ou malformado conta como "não atingido".
fn reached(marker: Option<NaiveTime>, now: NaiveDateTime) -> bool {
    marker.is_some_and(|time| now >= anchor_to_day(now.date(), time))
}

impl SessionClock {
    pub fn new(markers: WarningMarkers) -> Self {
        Self {
            markers,
            state: SessionState::Normal,
            first_shown: false,
            second_shown: false,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn markers(&self) -> &WarningMarkers {
        &self.markers
    }

    pub fn is_expired(&self) -> bool {
        self.state == SessionState::Expired
    }

    /// Um tick: compara `now` com os três marcadores ancorados no dia de `now`.
    /// Devolve o novo estado quando houve transição.
    pub fn evaluate(&mut self, now: NaiveDateTime) -> Option<SessionState> {
        if self.is_expired() {
            return None;
        }

        // A expiração é checada antes dos avisos
        if reached(self.markers.expiration_time(), now) {
            self.state = SessionState::Expired;
            return Some(self.state);
        }

        if reached(self.markers.second_time(), now) && !self.second_shown {
            self.second_shown = true;
            self.state = SessionState::SecondWarningShown;
            return Some(self.state);
        }

        if reached(self.markers.first_time(), now) && !self.first_shown && !self.second_shown {
            self.first_shown = true;
            self.state = SessionState::FirstWarningShown;
            return Some(self.state);
        }

        None
    }

    pub fn acknowledge(&mut self) -> Acknowledgement {
        match self.state {
            SessionState::FirstWarningShown | SessionState::SecondWarningShown => {
                self.state = SessionState::Normal;
                Acknowledgement::Dismissed
            }
            SessionState::Expired => Acknowledgement::Logout,
            SessionState::Normal => Acknowledgement::Ignored,
        }
    }
}
