use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stack_sync::config::Config;
use stack_sync::server::{AppState, OctocrabFactory, build_router};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stack_sync=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::parse();
    tracing::debug!(?config, "Loaded configuration");

    let mut builder = octocrab::Octocrab::builder().personal_token(config.github_token.clone());
    if let Some(url) = &config.github_api_url {
        builder = builder
            .base_uri(url.as_str())
            .with_context(|| format!("invalid GitHub API URL {url}"))?;
    }
    let octocrab = builder.build().context("building GitHub client")?;

    let state = AppState::new(
        config.webhook_secret.as_bytes().to_vec(),
        OctocrabFactory::new(octocrab, config.head_owner.clone()),
        config.sync_options(),
    );
    let app = build_router(state.clone());

    let shutdown = CancellationToken::new();
    tokio::spawn(wait_for_signal(shutdown.clone()));

    let listener = tokio::net::TcpListener::bind(config.listen)
        .await
        .with_context(|| format!("binding {}", config.listen))?;
    tracing::info!("listening on {}", config.listen);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.clone().cancelled_owned())
        .await
        .context("serving HTTP")?;

    let tracker = state.tracker();
    tracker.close();
    tracing::info!(in_flight = tracker.len(), "Waiting for push handlers");
    tracker.wait().await;

    Ok(())
}

/// Cancels `shutdown` on Ctrl-C or, on Unix, SIGTERM.
async fn wait_for_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    tracing::info!("Shutdown requested");
    shutdown.cancel();
}
