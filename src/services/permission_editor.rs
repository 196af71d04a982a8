// src/services/permission_editor.rs

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::{
    api::PermissionStore,
    common::error::AppError,
    models::auth::CurrentUser,
    models::permission::{Permission, PermissionDraft, PermissionRecord},
};

pub const DEFAULT_RESPONSIBLE_USER: &str = "sistema";
pub const DEFAULT_NOTICE_DELAY: Duration = Duration::from_secs(3);

/// Aviso transitório de sucesso; some sozinho depois de `dismiss_after`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub message: String,
    pub dismiss_after: Duration,
}

#[derive(Clone)]
pub struct PermissionEditor {
    store: Arc<dyn PermissionStore>,
    default_responsible: String,
    notice_delay: Duration,
    submitting: Arc<AtomicBool>,
}

// Libera a trava de envio mesmo se o future for descartado no meio
struct SubmitGuard<'a>(&'a AtomicBool);

impl Drop for SubmitGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl PermissionEditor {
    pub fn new(store: Arc<dyn PermissionStore>) -> Self {
        Self {
            store,
            default_responsible: DEFAULT_RESPONSIBLE_USER.to_string(),
            notice_delay: DEFAULT_NOTICE_DELAY,
            submitting: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_default_responsible(mut self, user: &str) -> Self {
        self.default_responsible = user.to_string();
        self
    }

    pub fn with_notice_delay(mut self, delay: Duration) -> Self {
        self.notice_delay = delay;
        self
    }

    /// LÓGICA DE NEGÓCIO: valida o rascunho na ordem das regras e, só se
    /// tudo passar, envia o registro completo com o responsável anexado.
    pub async fn submit(
        &self,
        draft: &PermissionDraft,
        acting: Option<&CurrentUser>,
    ) -> Result<Notification, AppError> {
        // 1. Validação local (nenhuma chamada de rede se falhar)
        let checked = draft.check()?;

        // 2. Responsável: o usuário da sessão ou o padrão
        let responsible = acting
            .map(|u| u.username.trim())
            .filter(|name| !name.is_empty())
            .unwrap_or(self.default_responsible.as_str())
            .to_string();

        let record = PermissionRecord::from_checked(checked, responsible);

        // 3. Uma gravação por vez
        if self.submitting.swap(true, Ordering::AcqRel) {
            return Err(AppError::RequestPending);
        }
        let _guard = SubmitGuard(&self.submitting);

        self.store.submit_permission(&record).await?;

        tracing::info!(
            "✅ Permissão gravada: usuário {} / função {} / empresa {} (por {})",
            record.user_id,
            record.function_id,
            record.entity_code,
            record.responsible_user
        );

        Ok(Notification {
            message: "Permissão salva com sucesso.".to_string(),
            dismiss_after: self.notice_delay,
        })
    }

    /// Releitura das permissões de um usuário.
    pub async fn permissions_for(&self, user_id: i64) -> Result<Vec<Permission>, AppError> {
        self.store.fetch_permissions(user_id).await
    }
}

// ---
// O formulário aberto na tela
// ---
#[derive(Debug, Clone)]
pub struct EditorForm {
    pub draft: PermissionDraft,
    pub inline_error: Option<String>,
    pub open: bool,
}

impl EditorForm {
    pub fn open(draft: PermissionDraft) -> Self {
        Self {
            draft,
            inline_error: None,
            open: true,
        }
    }

    /// Sucesso fecha o formulário; erro fica inline e o rascunho é mantido
    /// para corrigir e tentar de novo.
    pub async fn save(
        &mut self,
        editor: &PermissionEditor,
        acting: Option<&CurrentUser>,
    ) -> Option<Notification> {
        match editor.submit(&self.draft, acting).await {
            Ok(notification) => {
                self.inline_error = None;
                self.open = false;
                Some(notification)
            }
            Err(e) => {
                self.inline_error = Some(e.user_message());
                None
            }
        }
    }
}
