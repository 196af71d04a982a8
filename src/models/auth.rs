// src/models/auth.rs

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use crate::common::dates::{parse_time_of_day, truncate_time_of_day};

// ---
// Payload de GET /auth/me (como o backend manda)
// ---
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentUserResponse {
    pub username: String,
    pub function_code: Option<String>,
    pub entity_name: Option<String>,
    pub entity_code: Option<String>,
    #[serde(default)]
    pub warnings: WarningsPayload,
}

// "HH:MM" ou "HH:MM:SS", podendo vir null
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WarningsPayload {
    pub first: Option<String>,
    pub second: Option<String>,
    pub expiration: Option<String>,
}

// ---
// Snapshot normalizado do usuário logado
// ---
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub username: String,
    pub function_code: Option<String>,
    pub entity_name: Option<String>,
    pub entity_code: Option<String>,
    pub markers: WarningMarkers,
}

impl From<CurrentUserResponse> for CurrentUser {
    fn from(payload: CurrentUserResponse) -> Self {
        Self {
            username: payload.username,
            function_code: payload.function_code,
            entity_name: payload.entity_name,
            entity_code: payload.entity_code,
            markers: WarningMarkers::from_payload(&payload.warnings),
        }
    }
}

/// Horários do dia (`HH:MM`) em que o relógio de sessão escala.
/// Não são instantes absolutos: a cada avaliação são ancorados no dia corrente.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WarningMarkers {
    pub first: Option<String>,
    pub second: Option<String>,
    pub expiration: Option<String>,
}

/// Ordem invertida encontrada nos marcadores. Só é reportada, nunca corrigida.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerInversion {
    FirstAfterSecond,
    SecondAfterExpiration,
    FirstAfterExpiration,
}

impl WarningMarkers {
    pub fn new(first: &str, second: &str, expiration: &str) -> Self {
        Self {
            first: Some(truncate_time_of_day(first)),
            second: Some(truncate_time_of_day(second)),
            expiration: Some(truncate_time_of_day(expiration)),
        }
    }

    fn from_payload(payload: &WarningsPayload) -> Self {
        let normalize = |raw: &Option<String>| {
            raw.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(truncate_time_of_day)
        };

        Self {
            first: normalize(&payload.first),
            second: normalize(&payload.second),
            expiration: normalize(&payload.expiration),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.first.is_none() && self.second.is_none() && self.expiration.is_none()
    }

    pub fn first_time(&self) -> Option<NaiveTime> {
        self.first.as_deref().and_then(parse_time_of_day)
    }

    pub fn second_time(&self) -> Option<NaiveTime> {
        self.second.as_deref().and_then(parse_time_of_day)
    }

    pub fn expiration_time(&self) -> Option<NaiveTime> {
        self.expiration.as_deref().and_then(parse_time_of_day)
    }

    pub fn inversion(&self) -> Option<MarkerInversion> {
        let (first, second, expiration) =
            (self.first_time(), self.second_time(), self.expiration_time());

        match (first, second, expiration) {
            (Some(f), Some(s), _) if f > s => Some(MarkerInversion::FirstAfterSecond),
            (_, Some(s), Some(e)) if s > e => Some(MarkerInversion::SecondAfterExpiration),
            (Some(f), _, Some(e)) if f > e => Some(MarkerInversion::FirstAfterExpiration),
            _ => None,
        }
    }
}
