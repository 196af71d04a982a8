//src/main.rs

use chrono::Local;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use session_console::{
    config::{AppConfig, AppState},
    models::permission::{resolve_authoritative, PermissionDraft},
    services::permission_editor::EditorForm,
    session::{
        presentation::{ModalPresenter, TerminalSurface},
        watchdog::WatchdogSlot,
        Acknowledgement, SessionSupervisor,
    },
};

enum Flow {
    Continue,
    Quit,
}

const HELP: &str = "\
comandos:
  go <rota>                          navega (ex.: go /permissions)
  ack                                confirma o aviso na tela
  activity                           registra atividade do usuário
  perm <usuário> <função> <empresa> [início] [fim]
                                     grava uma permissão
  list <usuário>                     lista as permissões do usuário
  reload                             relê a configuração do ambiente
  quit                               sai";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Inicializa o logger (RUST_LOG, padrão "info")
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .compact()
        .init();

    let config = AppConfig::from_env()?;
    let state = AppState::new(config)?;

    let mut supervisor = SessionSupervisor::new(
        state.ctx.clone(),
        state.guard.clone(),
        state.time_source.clone(),
    );
    let mut presenter = ModalPresenter::new(TerminalSurface);
    let mut watchdog = WatchdogSlot::new();

    let mut session_state = supervisor.subscribe();
    let mut identity = state.ctx.subscribe_identity();
    let mut route = state.ctx.subscribe_route();
    let mut settings = state.ctx.subscribe_settings();

    tracing::info!("🚀 Console iniciado em {}", state.ctx.route());
    println!("{}", HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                watchdog.record_activity();
                match handle_command(&state, &mut supervisor, line.trim()).await {
                    Flow::Quit => break,
                    Flow::Continue => {}
                }
            }
            changed = session_state.changed() => {
                if changed.is_err() { break; }
                let current = *session_state.borrow_and_update();
                let markers = supervisor.markers().unwrap_or_default();
                presenter.render(current, &markers);
            }
            changed = identity.changed() => {
                if changed.is_err() { break; }
                sync_watchdog(&state, &mut watchdog);
            }
            changed = route.changed() => {
                if changed.is_err() { break; }
            }
            changed = settings.changed() => {
                if changed.is_err() { break; }
                sync_watchdog(&state, &mut watchdog);
            }
        }

        supervisor.reconcile();
    }

    supervisor.teardown();
    tracing::info!("👋 Console encerrado");
    Ok(())
}

// Watchdog segue a identidade e o timeout da configuração corrente
fn sync_watchdog(state: &AppState, watchdog: &mut WatchdogSlot) {
    let logged_in = state.ctx.has_identity();
    let config = state.ctx.settings().watchdog();
    watchdog.sync(logged_in, config, || {
        let auth = state.auth_service.clone();
        let ctx = state.ctx.clone();
        move || async move {
            if let Err(e) = auth.logout(&ctx).await {
                tracing::warn!("⚠️ Logout por inatividade falhou: {}", e);
            }
        }
    });
}

async fn handle_command(state: &AppState, supervisor: &mut SessionSupervisor, line: &str) -> Flow {
    let mut parts = line.split_whitespace();
    let Some(command) = parts.next() else {
        return Flow::Continue;
    };
    let args: Vec<&str> = parts.collect();

    match command {
        "go" => match args.first() {
            Some(path) => {
                let outcome = state.snapshot_loader.navigate(&state.ctx, path).await;
                println!("rota {} -> {:?}", path, outcome);
            }
            None => println!("uso: go <rota>"),
        },
        "ack" => match supervisor.acknowledge(&state.auth_service).await {
            Ok(Acknowledgement::Ignored) => println!("nenhum aviso na tela"),
            Ok(ack) => println!("aviso confirmado ({:?})", ack),
            Err(e) => println!("erro: {}", e.user_message()),
        },
        // A atividade já foi registrada ao ler a linha
        "activity" => {}
        "perm" => save_permission(state, &args).await,
        "list" => list_permissions(state, &args).await,
        "reload" => match AppConfig::reload_from_env() {
            Ok(config) => {
                state.ctx.reload_settings(config.session_settings());
                tracing::info!("🔄 Configuração recarregada");
            }
            Err(e) => println!("erro ao recarregar a configuração: {:#}", e),
        },
        "quit" | "exit" => return Flow::Quit,
        "help" => println!("{}", HELP),
        other => println!("comando desconhecido: {} (digite help)", other),
    }

    Flow::Continue
}

async fn save_permission(state: &AppState, args: &[&str]) {
    let [user, function, entity, dates @ ..] = args else {
        println!("uso: perm <usuário> <função> <empresa> [início] [fim]");
        return;
    };

    let mut draft = PermissionDraft::with_defaults(Local::now().date_naive());
    draft.user_id = user.parse().ok();
    draft.function_id = function.parse().ok();
    draft.entity_code = entity.to_string();
    if let Some(from) = dates.first() {
        draft.valid_from = Some(from.to_string());
    }
    if let Some(to) = dates.get(1) {
        draft.valid_to = Some(to.to_string());
    }

    let acting = state.ctx.identity();
    let mut form = EditorForm::open(draft);
    match form.save(&state.permission_editor, acting.as_ref()).await {
        Some(notice) => println!("{} (some em {:?})", notice.message, notice.dismiss_after),
        None => println!(
            "erro: {}",
            form.inline_error.as_deref().unwrap_or("falha desconhecida")
        ),
    }
}

async fn list_permissions(state: &AppState, args: &[&str]) {
    let Some(user_id) = args.first().and_then(|raw| raw.parse::<i64>().ok()) else {
        println!("uso: list <usuário>");
        return;
    };

    let permissions = match state.permission_editor.permissions_for(user_id).await {
        Ok(list) => list,
        Err(e) => {
            println!("erro: {}", e.user_message());
            return;
        }
    };

    if permissions.is_empty() {
        println!("nenhuma permissão para o usuário {}", user_id);
        return;
    }

    for p in &permissions {
        println!(
            "#{:?} função {} empresa {} ativa={} {:?}..{:?}",
            p.permission_id, p.function_id, p.entity_code, p.active, p.valid_from, p.valid_to
        );
    }

    let today = Local::now().date_naive();
    let entity = state
        .ctx
        .identity()
        .and_then(|u| u.entity_code)
        .unwrap_or_else(|| permissions[0].entity_code.clone());
    match resolve_authoritative(&permissions, user_id, &entity, today) {
        Some(p) => println!("vale hoje em {}: #{:?}", entity, p.permission_id),
        None => println!("nenhuma permissão vigente hoje em {}", entity),
    }
}
