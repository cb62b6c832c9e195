//! Procore login tool
//!
//! Command line client for the Procore OAuth2 flow:
//! 1. `login` runs the authorization-code flow (PKCE) and stores the credential
//! 2. `status` and `refresh` inspect or renew the stored credential
//! 3. `get` issues an authenticated request, retrying once on 401
//! 4. `logout` deletes the stored credential

mod callback;
mod cli;
mod commands;
mod config;
mod error;

use anyhow::{Context, Result};
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::Command;
use crate::commands::App;
use crate::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // JSON logs on stderr so command output on stdout stays clean
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let cli = match cli::parse(&args) {
        Ok(cli) => cli,
        Err(e) => {
            eprintln!("{e}\nusage: {}", cli::USAGE);
            std::process::exit(2);
        }
    };

    let config_path = Config::resolve_path(cli.config_path.as_deref());
    info!(path = %config_path.display(), "loading configuration");
    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;
    info!(
        client_id = %config.oauth.client_id,
        backend = ?config.storage.backend,
        "configuration loaded"
    );

    let app = App::from_config(&config)?;

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, cancelling");
            ctrl_c.cancel();
        }
    });

    let mut events = app.manager.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => info!(
                    expires_at = %event.new_credential.expires_at,
                    first_issue = event.previous_credential.is_none(),
                    "credential refreshed"
                ),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "refresh event listener lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    let output = match cli.command {
        Command::Login => app.login(&cancel).await?,
        Command::Status => app.status(&cancel).await?,
        Command::Refresh => app.refresh(&cancel).await?,
        Command::Logout => app.logout(&cancel).await?,
        Command::Get { url } => app.get(&url, &cancel).await?,
    };
    println!("{output}");
    Ok(())
}
