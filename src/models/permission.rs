// src/models/permission.rs

use std::cmp::Ordering;

use chrono::{DateTime, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::common::dates::{format_date, parse_form_date};
use crate::common::error::PermissionRule;

// ---
// 1. Permission (o que a API devolve)
// ---
// O direito de um usuário manter sessão com uma função, numa empresa,
// dentro de uma vigência.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Permission {
    pub permission_id: Option<i64>,
    pub user_id: i64,
    pub function_id: i64,
    pub entity_code: String,

    pub active: bool,
    pub allow_all_entities: bool,
    // Só refletimos a flag; quem recusa a segunda sessão é o backend
    pub allow_multiple_sessions: bool,
    pub auto_close_on_shift_end: bool,
    pub max_session_lock: bool,

    pub responsible_user: Option<String>,

    pub valid_from: Option<NaiveDate>,
    pub valid_to: Option<NaiveDate>,

    // Atribuído pelo servidor na emissão
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Permission {
    /// Ativa e dentro da vigência (inclusiva; `None` = sem limite daquele lado).
    pub fn is_effective_on(&self, day: NaiveDate) -> bool {
        if !self.active {
            return false;
        }
        let after_start = self.valid_from.is_none_or(|from| from <= day);
        let before_end = self.valid_to.is_none_or(|to| day <= to);
        after_start && before_end
    }

    pub fn covers_entity(&self, entity_code: &str) -> bool {
        self.allow_all_entities || self.entity_code == entity_code
    }
}

/// Escolhe a permissão que vale para (usuário, empresa) no dia.
///
/// Se houver mais de uma candidata, vence a emitida por último;
/// empate (ou sem data de emissão) decide pelo maior `permissionId`.
pub fn resolve_authoritative<'a>(
    permissions: &'a [Permission],
    user_id: i64,
    entity_code: &str,
    day: NaiveDate,
) -> Option<&'a Permission> {
    permissions
        .iter()
        .filter(|p| p.user_id == user_id)
        .filter(|p| p.covers_entity(entity_code))
        .filter(|p| p.is_effective_on(day))
        .max_by(|a, b| issue_order(a, b))
}

// Data de emissão só decide quando os dois registros a têm;
// caso contrário (ou empate) vale o maior id.
fn issue_order(a: &Permission, b: &Permission) -> Ordering {
    let by_id = a.permission_id.cmp(&b.permission_id);
    match (a.created_at, b.created_at) {
        (Some(x), Some(y)) => x.cmp(&y).then(by_id),
        _ => by_id,
    }
}

// ---
// 2. LooseBool (booleanos vindos do formulário)
// ---
// O formulário manda true/false, 0/1, "true", "S"/"N"... aqui tudo vira bool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LooseBool {
    // Campo enviado como null
    Null,
    Bool(bool),
    Number(i64),
    Text(String),
}

impl LooseBool {
    pub fn to_bool(&self) -> bool {
        match self {
            LooseBool::Null => false,
            LooseBool::Bool(b) => *b,
            LooseBool::Number(n) => *n != 0,
            LooseBool::Text(s) => matches!(
                s.trim().to_ascii_lowercase().as_str(),
                "true" | "1" | "s" | "sim" | "y" | "yes" | "on"
            ),
        }
    }
}

impl Default for LooseBool {
    fn default() -> Self {
        LooseBool::Bool(false)
    }
}

impl From<bool> for LooseBool {
    fn from(value: bool) -> Self {
        LooseBool::Bool(value)
    }
}

// ---
// 3. PermissionDraft (o formulário do editor)
// ---

fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new(PermissionRule::MissingEntity.code());
        err.message = Some(PermissionRule::MissingEntity.to_string().into());
        return Err(err);
    }
    Ok(())
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PermissionDraft {
    #[serde(default)]
    pub permission_id: Option<i64>,

    #[validate(
        required(code = "missing_user", message = "Selecione o usuário da permissão."),
        range(min = 1, code = "missing_user", message = "Selecione o usuário da permissão.")
    )]
    #[serde(default)]
    pub user_id: Option<i64>,

    #[validate(
        required(code = "missing_function", message = "Selecione a função (perfil de acesso)."),
        range(min = 1, code = "missing_function", message = "Selecione a função (perfil de acesso).")
    )]
    #[serde(default)]
    pub function_id: Option<i64>,

    #[validate(custom(function = "validate_not_blank"))]
    #[serde(default)]
    pub entity_code: String,

    #[serde(default)]
    pub active: LooseBool,
    #[serde(default)]
    pub allow_all_entities: LooseBool,
    #[serde(default)]
    pub allow_multiple_sessions: LooseBool,
    #[serde(default)]
    pub auto_close_on_shift_end: LooseBool,
    #[serde(default)]
    pub max_session_lock: LooseBool,

    // Datas como digitadas; a normalização acontece no envio
    #[serde(default)]
    pub valid_from: Option<String>,
    #[serde(default)]
    pub valid_to: Option<String>,
}

impl PermissionDraft {
    /// Rascunho inicial: ativa, vigência de um ano a partir de hoje.
    pub fn with_defaults(today: NaiveDate) -> Self {
        let one_year_later = today
            .checked_add_months(Months::new(12))
            .unwrap_or(NaiveDate::MAX);

        Self {
            active: LooseBool::Bool(true),
            valid_from: Some(format_date(today)),
            valid_to: Some(format_date(one_year_later)),
            ..Default::default()
        }
    }

    /// Rascunho para editar um registro existente (substituição completa no envio).
    pub fn from_permission(permission: &Permission) -> Self {
        Self {
            permission_id: permission.permission_id,
            user_id: Some(permission.user_id),
            function_id: Some(permission.function_id),
            entity_code: permission.entity_code.clone(),
            active: permission.active.into(),
            allow_all_entities: permission.allow_all_entities.into(),
            allow_multiple_sessions: permission.allow_multiple_sessions.into(),
            auto_close_on_shift_end: permission.auto_close_on_shift_end.into(),
            max_session_lock: permission.max_session_lock.into(),
            valid_from: permission.valid_from.map(format_date),
            valid_to: permission.valid_to.map(format_date),
        }
    }

    // Validação de consistência das datas, fora do derive
    fn validate_date_range(&self) -> Result<(NaiveDate, NaiveDate), PermissionRule> {
        let from = self.valid_from.as_deref().and_then(parse_form_date);
        let to = self.valid_to.as_deref().and_then(parse_form_date);

        match (from, to) {
            (Some(from), Some(to)) if from > to => Err(PermissionRule::InvertedDateRange),
            (Some(from), Some(to)) => Ok((from, to)),
            _ => Err(PermissionRule::MissingDateRange),
        }
    }

    /// Roda as regras na ordem e devolve o registro pronto para envio.
    pub fn check(&self) -> Result<CheckedDraft, PermissionRule> {
        // Validação padrão do Validator
        if let Err(errors) = self.validate() {
            if let Some(rule) = PermissionRule::first_violated(&errors) {
                return Err(rule);
            }
        }

        let (valid_from, valid_to) = self.validate_date_range()?;

        // Depois do validate(), os três campos obrigatórios existem
        let (Some(user_id), Some(function_id)) = (self.user_id, self.function_id) else {
            return Err(if self.user_id.is_none() {
                PermissionRule::MissingUser
            } else {
                PermissionRule::MissingFunction
            });
        };

        Ok(CheckedDraft {
            permission_id: self.permission_id,
            user_id,
            function_id,
            entity_code: self.entity_code.trim().to_string(),
            active: self.active.to_bool(),
            allow_all_entities: self.allow_all_entities.to_bool(),
            allow_multiple_sessions: self.allow_multiple_sessions.to_bool(),
            auto_close_on_shift_end: self.auto_close_on_shift_end.to_bool(),
            max_session_lock: self.max_session_lock.to_bool(),
            valid_from,
            valid_to,
        })
    }
}

/// Rascunho que passou por todas as regras, já com tipos estritos.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckedDraft {
    pub permission_id: Option<i64>,
    pub user_id: i64,
    pub function_id: i64,
    pub entity_code: String,
    pub active: bool,
    pub allow_all_entities: bool,
    pub allow_multiple_sessions: bool,
    pub auto_close_on_shift_end: bool,
    pub max_session_lock: bool,
    pub valid_from: NaiveDate,
    pub valid_to: NaiveDate,
}

// ---
// 4. PermissionRecord (o que vai para a API)
// ---
// Registro completo: o backend sobrescreve pela chave, sem patch parcial.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionRecord {
    pub permission_id: Option<i64>,
    pub user_id: i64,
    pub function_id: i64,
    pub entity_code: String,
    pub active: bool,
    pub allow_all_entities: bool,
    pub allow_multiple_sessions: bool,
    pub auto_close_on_shift_end: bool,
    pub max_session_lock: bool,
    pub responsible_user: String,
    // Serializa como "YYYY-MM-DD" ou null
    pub valid_from: Option<NaiveDate>,
    pub valid_to: Option<NaiveDate>,
}

impl PermissionRecord {
    pub fn from_checked(draft: CheckedDraft, responsible_user: String) -> Self {
        Self {
            permission_id: draft.permission_id,
            user_id: draft.user_id,
            function_id: draft.function_id,
            entity_code: draft.entity_code,
            active: draft.active,
            allow_all_entities: draft.allow_all_entities,
            allow_multiple_sessions: draft.allow_multiple_sessions,
            auto_close_on_shift_end: draft.auto_close_on_shift_end,
            max_session_lock: draft.max_session_lock,
            responsible_user,
            valid_from: Some(draft.valid_from),
            valid_to: Some(draft.valid_to),
        }
    }

    pub fn into_permission(self, permission_id: i64, created_at: DateTime<Utc>) -> Permission {
        Permission {
            permission_id: Some(permission_id),
            user_id: self.user_id,
            function_id: self.function_id,
            entity_code: self.entity_code,
            active: self.active,
            allow_all_entities: self.allow_all_entities,
            allow_multiple_sessions: self.allow_multiple_sessions,
            auto_close_on_shift_end: self.auto_close_on_shift_end,
            max_session_lock: self.max_session_lock,
            responsible_user: Some(self.responsible_user),
            valid_from: self.valid_from,
            valid_to: self.valid_to,
            created_at: Some(created_at),
        }
    }
}
