/// rollsync - follow a shared dice table from the terminal
///
/// Joins a game (or resumes a configured session), keeps the live stream
/// open and prints the roll log as it changes. Ctrl-C logs out.
use anyhow::Context as _;
use rollsync::{
    config::ClientConfig,
    event::{Event, Source},
    metrics,
    rules::{self, Glitch, RollOutcome},
    store::State,
    ClientContext,
};
use std::sync::Arc;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = ClientConfig::from_env().context("loading configuration")?;

    // Initialize logging
    tracing_subscriber::registry()
        .with(config.logging.env_filter())
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Print banner
    print_banner();

    // Create client context
    let ctx = ClientContext::new(config).context("creating client")?;

    // Join or resume
    let session = match ctx.resume_configured()? {
        Some(session) => session,
        None => {
            let game_id = ctx
                .config
                .game
                .game_id
                .clone()
                .context("ROLLSYNC_GAME_ID is required to join a game")?;
            let player_name = ctx
                .config
                .game
                .player_name
                .clone()
                .unwrap_or_else(|| "rollsync".to_string());
            ctx.join(&game_id, &player_name).await?
        }
    };
    info!("Following game {} as {}", session.game_id, session.player_name);

    // First page of history
    ctx.paginator.load_more_items(0).await;

    let mut changes = ctx.store.subscribe();
    let mut connection = ctx.manager.subscribe();
    let mut printed: Option<Arc<State>> = None;
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            changed = changes.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = changes.borrow_and_update().clone();
                print_log(&state, &mut printed);
            }
            changed = connection.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = *connection.borrow_and_update();
                info!("Connection: {:?}", current);
            }
            _ = &mut shutdown => {
                info!("Shutting down");
                break;
            }
        }
    }

    ctx.logout().await;
    debug!("Final metrics:\n{}", metrics::render_metrics());
    Ok(())
}

/// Print the log whenever the store published a new snapshot; returns
/// whether anything was printed
fn print_log(state: &Arc<State>, printed: &mut Option<Arc<State>>) -> bool {
    if printed.as_ref().is_some_and(|last| Arc::ptr_eq(last, state)) {
        return false;
    }
    println!("---- {} events ----", state.events.len());
    for event in &state.events {
        println!("{}", describe(event));
    }
    *printed = Some(state.clone());
    true
}

fn describe(event: &Event) -> String {
    let who = match event.source() {
        Source::Local => "(local)".to_string(),
        Source::Game(source) => source.name.clone(),
    };
    let title = event.title().unwrap_or_default();
    match rules::outcome(event) {
        Some(RollOutcome::Dice { hits, glitch }) => {
            let glitch = match glitch {
                Glitch::None => "",
                Glitch::Glitch => " GLITCH",
                Glitch::Critical => " CRITICAL GLITCH",
            };
            format!("[{}] {} {}: {} hits{}", event.id(), who, title, hits, glitch)
        }
        Some(RollOutcome::Initiative { total }) => {
            format!("[{}] {} {}: initiative {}", event.id(), who, title, total)
        }
        None => match event {
            Event::PlayerJoin { .. } => format!("[{}] {} joined", event.id(), who),
            other => {
                warn!("No summary for {}", other.kind());
                format!("[{}] {} {}", event.id(), who, other.kind())
            }
        },
    }
}

fn print_banner() {
    println!(
        r#"
    rollsync
    ========
        Shared dice table client v{}
        "#,
        env!("CARGO_PKG_VERSION")
    );
}
