// src/common/dates.rs

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

const DATE_FORMAT: &str = "%Y-%m-%d";

// ---
// Datas de calendário (vigência da permissão)
// ---

/// Lê uma data digitada no formulário.
///
/// Aceita `YYYY-MM-DD`, `DD/MM/YYYY` e data/hora com ou sem fuso.
/// Quando vem com fuso, usamos os campos de calendário como estão escritos
/// (sem converter para UTC), senão `2025-01-01T00:00:00-03:00` viraria dia 31.
pub fn parse_form_date(input: &str) -> Option<NaiveDate> {
    let value = input.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(date) = NaiveDate::parse_from_str(value, DATE_FORMAT) {
        return Some(date);
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%d/%m/%Y") {
        return Some(date);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.date_naive());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Some(dt.date());
        }
    }
    None
}

/// Formato de envio para a API: `YYYY-MM-DD`.
pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

// ---
// Horários dos avisos de sessão (HH:MM)
// ---

/// `"17:45:30"` -> `"17:45"`. Valores sem `:` voltam apenas aparados.
pub fn truncate_time_of_day(raw: &str) -> String {
    let value = raw.trim();
    let mut parts = value.split(':');
    match (parts.next(), parts.next()) {
        (Some(hours), Some(minutes)) => format!("{}:{}", hours, minutes),
        _ => value.to_string(),
    }
}

/// Interpreta um marcador `HH:MM` (segundos, se vierem, são descartados).
/// Valor malformado devolve `None`.
pub fn parse_time_of_day(raw: &str) -> Option<NaiveTime> {
    let value = truncate_time_of_day(raw);
    NaiveTime::parse_from_str(&value, "%H:%M")
        .ok()
        .and_then(|t| t.with_second(0))
}

/// Ancora um horário no dia informado.
pub fn anchor_to_day(day: NaiveDate, time: NaiveTime) -> NaiveDateTime {
    day.and_time(time)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn form_dates_keep_local_calendar_fields() {
        assert_eq!(parse_form_date("2025-01-01"), Some(ymd(2025, 1, 1)));
        assert_eq!(parse_form_date("31/12/2025"), Some(ymd(2025, 12, 31)));
        assert_eq!(
            parse_form_date("2025-01-01T00:00:00-03:00"),
            Some(ymd(2025, 1, 1))
        );
        assert_eq!(
            parse_form_date("2025-12-31T23:30:00+09:00"),
            Some(ymd(2025, 12, 31))
        );
        assert_eq!(parse_form_date("2025-03-10T08:15"), Some(ymd(2025, 3, 10)));
    }

    #[test]
    fn blank_or_garbage_dates_are_absent() {
        assert_eq!(parse_form_date(""), None);
        assert_eq!(parse_form_date("   "), None);
        assert_eq!(parse_form_date("amanhã"), None);
        assert_eq!(parse_form_date("2025-02-30"), None);
    }

    #[test]
    fn dates_are_sent_as_iso_calendar_days() {
        assert_eq!(format_date(ymd(2025, 1, 1)), "2025-01-01");
    }

    #[test]
    fn markers_drop_seconds() {
        assert_eq!(truncate_time_of_day("17:45:30"), "17:45");
        assert_eq!(truncate_time_of_day(" 09:00 "), "09:00");
        assert_eq!(truncate_time_of_day("nope"), "nope");
        assert_eq!(
            parse_time_of_day("09:05:59"),
            NaiveTime::from_hms_opt(9, 5, 0)
        );
    }

    #[test]
    fn malformed_markers_do_not_parse() {
        assert_eq!(parse_time_of_day(""), None);
        assert_eq!(parse_time_of_day("25:00"), None);
        assert_eq!(parse_time_of_day("9h00"), None);
    }
}
