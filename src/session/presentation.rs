// src/session/presentation.rs

use crate::models::auth::WarningMarkers;
use crate::session::clock::SessionState;

/// As três telas de aviso, uma por estado diferente de `Normal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Surface {
    FirstWarning,
    SecondWarning,
    Expired,
}

impl Surface {
    pub fn for_state(state: SessionState) -> Option<Surface> {
        match state {
            SessionState::Normal => None,
            SessionState::FirstWarningShown => Some(Surface::FirstWarning),
            SessionState::SecondWarningShown => Some(Surface::SecondWarning),
            SessionState::Expired => Some(Surface::Expired),
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Surface::FirstWarning => "Aviso de encerramento de sessão",
            Surface::SecondWarning => "Sua sessão está prestes a encerrar",
            Surface::Expired => "Sessão encerrada",
        }
    }

    pub fn message(self, markers: &WarningMarkers) -> String {
        let closes_at = markers.expiration.as_deref().unwrap_or("--:--");
        match self {
            Surface::FirstWarning => format!(
                "Seu horário de acesso termina às {}. Salve o que estiver fazendo.",
                closes_at
            ),
            Surface::SecondWarning => format!(
                "Último aviso: a sessão será encerrada às {}.",
                closes_at
            ),
            Surface::Expired => {
                "Seu horário de acesso terminou. Você será desconectado.".to_string()
            }
        }
    }

    pub fn action_label(self) -> &'static str {
        match self {
            Surface::Expired => "Sair",
            _ => "Entendi",
        }
    }

    /// Só a confirmação da tela de expirada é irreversível (faz logout).
    pub fn is_irreversible(self) -> bool {
        self == Surface::Expired
    }
}

/// Quem desenha os avisos (terminal, testes...).
pub trait WarningSurface: Send {
    fn show(&mut self, surface: Surface, markers: &WarningMarkers);
    fn hide(&mut self, surface: Surface);
}

/// Mantém a tela sincronizada com o estado do relógio; não guarda lógica.
pub struct ModalPresenter<S: WarningSurface> {
    surface: S,
    visible: Option<Surface>,
}

impl<S: WarningSurface> ModalPresenter<S> {
    pub fn new(surface: S) -> Self {
        Self {
            surface,
            visible: None,
        }
    }

    pub fn visible(&self) -> Option<Surface> {
        self.visible
    }

    pub fn render(&mut self, state: SessionState, markers: &WarningMarkers) {
        let wanted = Surface::for_state(state);
        if wanted == self.visible {
            return;
        }

        if let Some(current) = self.visible.take() {
            self.surface.hide(current);
        }
        if let Some(next) = wanted {
            self.surface.show(next, markers);
            self.visible = Some(next);
        }
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }
}

/// Avisos impressos no terminal do console.
#[derive(Debug, Default)]
pub struct TerminalSurface;

impl WarningSurface for TerminalSurface {
    fn show(&mut self, surface: Surface, markers: &WarningMarkers) {
        println!();
        println!("==== {} ====", surface.title());
        println!("{}", surface.message(markers));
        println!("[ack] {}", surface.action_label());
    }

    fn hide(&mut self, surface: Surface) {
        tracing::debug!("Aviso fechado: {:?}", surface);
    }
}
