// src/common/error.rs

use thiserror::Error;

// As regras do editor de permissões, na ordem em que são avaliadas.
// A primeira que falhar aborta o envio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PermissionRule {
    #[error("Selecione o usuário da permissão.")]
    MissingUser,

    #[error("Selecione a função (perfil de acesso).")]
    MissingFunction,

    #[error("Selecione a empresa da permissão.")]
    MissingEntity,

    #[error("Informe a data inicial e a data final de vigência.")]
    MissingDateRange,

    #[error("A data inicial não pode ser posterior à data final.")]
    InvertedDateRange,
}

impl PermissionRule {
    /// Ordem de avaliação das regras.
    pub const ORDER: [PermissionRule; 5] = [
        PermissionRule::MissingUser,
        PermissionRule::MissingFunction,
        PermissionRule::MissingEntity,
        PermissionRule::MissingDateRange,
        PermissionRule::InvertedDateRange,
    ];

    /// Código usado nos `ValidationError` do `validator`.
    pub fn code(self) -> &'static str {
        match self {
            PermissionRule::MissingUser => "missing_user",
            PermissionRule::MissingFunction => "missing_function",
            PermissionRule::MissingEntity => "missing_entity",
            PermissionRule::MissingDateRange => "missing_date_range",
            PermissionRule::InvertedDateRange => "inverted_date_range",
        }
    }

    /// Converte o resultado do `validator` na primeira regra violada.
    pub fn first_violated(errors: &validator::ValidationErrors) -> Option<PermissionRule> {
        let field_errors = errors.field_errors();

        Self::ORDER.into_iter().find(|rule| {
            field_errors
                .values()
                .any(|list| list.iter().any(|e| e.code == rule.code()))
        })
    }
}

// Nosso tipo de erro, com `thiserror` para melhor ergonomia.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Erro de validação: {0}")]
    ValidationError(#[from] PermissionRule),

    // Falha de rede / transporte ao falar com a API remota
    #[error("Erro de comunicação com o servidor: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Sessão não autorizada")]
    Unauthorized,

    // O backend recusou a operação e mandou a mensagem dele
    #[error("Operação recusada pelo servidor: {message}")]
    Rejected { message: String },

    // Já existe uma requisição pendente para o mesmo recurso
    #[error("Requisição já em andamento")]
    RequestPending,

    // Variante genérica para qualquer outro erro inesperado
    #[error("Erro interno: {0}")]
    InternalServerError(#[from] anyhow::Error),
}

impl AppError {
    /// Texto exibido para o usuário (inline no formulário ou em um aviso).
    pub fn user_message(&self) -> String {
        match self {
            AppError::ValidationError(rule) => rule.to_string(),
            AppError::Rejected { message } => message.clone(),
            AppError::Unauthorized => "Sua sessão expirou. Faça login novamente.".to_string(),
            AppError::RequestPending => "Aguarde a conclusão da operação anterior.".to_string(),
            AppError::Transport(_) => {
                "Não foi possível comunicar com o servidor. Tente novamente.".to_string()
            }
            ref e => {
                tracing::error!("Erro inesperado: {}", e);
                "Ocorreu um erro inesperado.".to_string()
            }
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, AppError::ValidationError(_))
    }
}
