use clap::Parser;

mod app;
mod auth;
mod chat;
mod cli;
mod config;
mod error;
mod extract;
mod geo;
mod jobs;
mod rooms;
mod state;
#[cfg(test)]
mod testing;
mod updates;
mod users;

use crate::cli::{Cli, Command};
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "cercania=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let cli = Cli::parse();
    let state = AppState::init().await?;

    sqlx::migrate!("./migrations").run(&state.db).await?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => app::serve(state).await?,
        Command::PurgeInvitations { days } => {
            let days = days.unwrap_or(state.config.retention.invitation_days);
            let deleted = jobs::purge_old_invitations(&state.db, days).await?;
            println!("Se eliminaron {deleted} invitaciones antiguas");
        }
        Command::PurgeMessages { days } => {
            let retention = &state.config.retention;
            let days = days.unwrap_or(retention.message_days);
            let deleted = jobs::purge_old_messages(&state.db, days, retention.message_batch).await?;
            println!("Se eliminaron {deleted} mensajes antiguos");
        }
        Command::SweepInactive => {
            let window = state.config.proximity.activity_window_secs;
            let report = users::presence::sweep_inactive(&state.db, window).await?;
            println!(
                "Usuarios revisados: {}, marcados como offline: {}",
                report.checked, report.marked_offline
            );
        }
    }

    Ok(())
}
