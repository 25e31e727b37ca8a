//! Notes server binary.
//!
//! Loads [`Settings`], picks the store and mailer they describe, and serves
//! [`api::router`] until Ctrl+C or SIGTERM.

use std::sync::Arc;

use anyhow::{Context, Result};
use api::config::Settings;
use api::db::{self, PgStore};
use api::mail::{Mailer, OutboxMailer, SmtpMailer};
use api::AppState;
use store::{MemoryStore, Store};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let settings = Settings::new().context("Failed to load settings")?;

    if settings.auth.uses_default_secret() {
        tracing::warn!("auth.jwt_secret is not set, using the built-in default. Set NOTES_AUTH__JWT_SECRET in production");
    }

    let mut pool = None;
    let store: Arc<dyn Store> = if settings.database.is_memory() {
        tracing::warn!("Using the in-memory store, data is lost on restart");
        Arc::new(MemoryStore::new())
    } else {
        tracing::info!("Connecting to database...");
        let pg = db::connect(&settings.database)
            .await
            .context("Failed to create database pool")?;

        tracing::info!("Running database migrations...");
        db::migrate(&pg).await.context("Failed to run migrations")?;

        pool = Some(pg.clone());
        Arc::new(PgStore::new(pg))
    };

    let mailer: Arc<dyn Mailer> = if settings.mail.smtp_host.is_some() {
        Arc::new(SmtpMailer::new(&settings.mail).context("Failed to configure SMTP")?)
    } else {
        tracing::warn!("mail.smtp_host is not set, OTP codes are written to the log");
        Arc::new(OutboxMailer::new())
    };

    if settings.google.is_none() {
        tracing::info!("Google login disabled");
    }

    let address = settings.server.address();
    let state = AppState::new(settings, store, mailer)
        .map_err(anyhow::Error::msg)
        .context("Failed to configure Google login")?;
    let app = api::router(Arc::new(state));

    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind to {address}"))?;

    tracing::info!("Server listening on {}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    if let Some(pool) = pool {
        pool.close().await;
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
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
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, stopping...");
}
