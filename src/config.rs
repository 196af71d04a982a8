// src/config.rs

use std::{env, sync::Arc, time::Duration};

use anyhow::Context;
use chrono::{Duration as ChronoDuration, Local, NaiveTime};

use crate::{
    api::{HttpBackend, IdentityGateway, InMemoryBackend, PermissionStore},
    middleware::route_guard::RouteGuard,
    models::auth::{CurrentUserResponse, WarningsPayload},
    services::{
        auth::AuthService, permission_editor::PermissionEditor, snapshot_loader::SnapshotLoader,
    },
    session::{
        clock::{Clock, LocalClock},
        context::{SessionContext, SessionSettings},
    },
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    // None só é aceito no modo demonstração
    pub api_base_url: Option<String>,
    pub api_token: Option<String>,
    pub demo_mode: bool,
    pub close_session_on_inactivity: bool,
    pub poll_interval: Duration,
    pub inactivity_timeout: Duration,
    pub public_paths: Vec<String>,
    pub default_responsible_user: String,
    pub notification_dismiss: Duration,
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" | "s" | "sim" => Some(true),
        "0" | "false" | "no" | "off" | "n" | "nao" | "não" => Some(false),
        _ => None,
    }
}

impl AppConfig {
    /// Lê do ambiente (e do `.env`, se existir).
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Relê o `.env` sobrescrevendo o que já estava no ambiente.
    pub fn reload_from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv_override().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Monta a configuração a partir de qualquer fonte chave -> valor.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bool_var = |key: &str, default: bool| -> anyhow::Result<bool> {
            match get(key) {
                Some(raw) => parse_bool(&raw)
                    .with_context(|| format!("{} deve ser booleano, veio '{}'", key, raw)),
                None => Ok(default),
            }
        };

        let secs_var = |key: &str, default: u64| -> anyhow::Result<Duration> {
            match get(key) {
                Some(raw) => raw
                    .trim()
                    .parse::<u64>()
                    .map(Duration::from_secs)
                    .with_context(|| format!("{} deve ser um número de segundos, veio '{}'", key, raw)),
                None => Ok(Duration::from_secs(default)),
            }
        };

        let demo_mode = bool_var("CONSOLE_DEMO", false)?;
        let api_base_url = get("API_BASE_URL");
        if api_base_url.is_none() && !demo_mode {
            anyhow::bail!("API_BASE_URL deve ser definida (ou use CONSOLE_DEMO=true)");
        }

        let poll_interval = secs_var("SESSION_POLL_INTERVAL_SECS", 10)?;
        if poll_interval.is_zero() {
            anyhow::bail!("SESSION_POLL_INTERVAL_SECS precisa ser maior que zero");
        }

        let public_paths = get("PUBLIC_PATHS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_else(|| vec!["/login".to_string(), "/forgot-password".to_string()]);

        Ok(Self {
            api_base_url,
            api_token: get("API_TOKEN"),
            demo_mode,
            close_session_on_inactivity: bool_var("CLOSE_SESSION_ON_INACTIVITY", true)?,
            poll_interval,
            inactivity_timeout: secs_var("INACTIVITY_TIMEOUT_SECS", 900)?,
            public_paths,
            default_responsible_user: get("DEFAULT_RESPONSIBLE_USER")
                .unwrap_or_else(|| "sistema".to_string()),
            notification_dismiss: secs_var("NOTIFICATION_DISMISS_SECS", 3)?,
        })
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            close_session_on_inactivity: self.close_session_on_inactivity,
            poll_interval: self.poll_interval,
            inactivity_timeout: self.inactivity_timeout,
        }
    }
}

// Usuário de demonstração: avisos em 1, 2 e 3 minutos a partir de agora
fn demo_user(now: NaiveTime) -> CurrentUserResponse {
    let marker = |minutes: i64| {
        (now + ChronoDuration::minutes(minutes))
            .format("%H:%M:%S")
            .to_string()
    };

    CurrentUserResponse {
        username: "demo".to_string(),
        function_code: Some("ADM".to_string()),
        entity_name: Some("Empresa Demonstração".to_string()),
        entity_code: Some("DEMO".to_string()),
        warnings: WarningsPayload {
            first: Some(marker(1)),
            second: Some(marker(2)),
            expiration: Some(marker(3)),
        },
    }
}

// O estado compartilhado que será acessível em todo o console
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub ctx: SessionContext,
    pub guard: RouteGuard,
    pub time_source: Arc<dyn Clock>,
    pub auth_service: AuthService,
    pub permission_editor: PermissionEditor,
    pub snapshot_loader: Arc<SnapshotLoader>,
}

impl AppState {
    pub fn new(config: AppConfig) -> anyhow::Result<Self> {
        let guard = RouteGuard::new(&config.public_paths);
        let initial_route = guard.login_path().to_string();
        let ctx = SessionContext::new(&initial_route, config.session_settings());

        // --- Monta o gráfico de dependências ---
        let (identity, permissions): (Arc<dyn IdentityGateway>, Arc<dyn PermissionStore>) =
            match &config.api_base_url {
                Some(base_url) if !config.demo_mode => {
                    // 401 em qualquer chamada: derruba a identidade e volta ao login
                    let hook_ctx = ctx.clone();
                    let login_path = initial_route.clone();
                    let backend = HttpBackend::new(base_url, config.api_token.clone())
                        .context("Falha ao criar o cliente HTTP")?
                        .with_unauthorized_hook(Arc::new(move || {
                            hook_ctx.clear_identity();
                            hook_ctx.set_route(&login_path);
                        }));
                    tracing::info!("✅ Usando a API remota em {}", base_url);
                    let backend = Arc::new(backend);
                    (
                        backend.clone() as Arc<dyn IdentityGateway>,
                        backend as Arc<dyn PermissionStore>,
                    )
                }
                _ => {
                    tracing::warn!("🧪 Modo demonstração: backend em memória");
                    let backend = Arc::new(InMemoryBackend::with_user(demo_user(
                        Local::now().time(),
                    )));
                    (
                        backend.clone() as Arc<dyn IdentityGateway>,
                        backend as Arc<dyn PermissionStore>,
                    )
                }
            };

        let auth_service = AuthService::new(identity.clone(), guard.clone());
        let permission_editor = PermissionEditor::new(permissions)
            .with_default_responsible(&config.default_responsible_user)
            .with_notice_delay(config.notification_dismiss);
        let snapshot_loader = Arc::new(SnapshotLoader::new(identity, guard.clone()));

        Ok(Self {
            config,
            ctx,
            guard,
            time_source: Arc::new(LocalClock),
            auth_service,
            permission_editor,
            snapshot_loader,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = AppConfig::from_lookup(lookup(&[("API_BASE_URL", "http://api.local")])).unwrap();
        assert!(config.close_session_on_inactivity);
        assert_eq!(config.poll_interval, Duration::from_secs(10));
        assert_eq!(config.inactivity_timeout, Duration::from_secs(900));
        assert_eq!(config.public_paths, vec!["/login", "/forgot-password"]);
        assert_eq!(config.default_responsible_user, "sistema");
        assert!(config.session_settings().watchdog().enabled);
    }

    #[test]
    fn api_url_is_required_outside_demo() {
        assert!(AppConfig::from_lookup(lookup(&[])).is_err());
        let demo = AppConfig::from_lookup(lookup(&[("CONSOLE_DEMO", "true")])).unwrap();
        assert!(demo.demo_mode);
    }

    #[test]
    fn overrides_are_parsed() {
        let config = AppConfig::from_lookup(lookup(&[
            ("API_BASE_URL", "http://api.local"),
            ("CLOSE_SESSION_ON_INACTIVITY", "false"),
            ("INACTIVITY_TIMEOUT_SECS", "0"),
            ("PUBLIC_PATHS", "/entrar, /recuperar-senha ,"),
        ]))
        .unwrap();

        assert!(!config.session_settings().close_session_on_inactivity);
        assert!(!config.session_settings().watchdog().enabled);
        assert_eq!(config.public_paths, vec!["/entrar", "/recuperar-senha"]);
    }

    #[test]
    fn bad_values_are_rejected() {
        let with = |key: &str, value: &str| {
            AppConfig::from_lookup(lookup(&[("API_BASE_URL", "http://api.local"), (key, value)]))
        };
        assert!(with("CLOSE_SESSION_ON_INACTIVITY", "talvez").is_err());
        assert!(with("SESSION_POLL_INTERVAL_SECS", "0").is_err());
        assert!(with("INACTIVITY_TIMEOUT_SECS", "-5").is_err());
    }

    #[tokio::test]
    async fn demo_state_starts_on_login_route() {
        let config = AppConfig::from_lookup(lookup(&[("CONSOLE_DEMO", "1")])).unwrap();
        let state = AppState::new(config).unwrap();
        assert_eq!(state.ctx.route(), "/login");
        assert!(!state.ctx.has_identity());
    }
}
