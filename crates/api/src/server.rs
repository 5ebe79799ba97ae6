//! Listener setup and graceful shutdown.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use axum::Router;
use axum_server::tls_rustls::RustlsConfig;

use crate::config::{Settings, TlsPaths};

/// How long open connections may finish after a shutdown signal.
const CONNECTION_DRAIN: Duration = Duration::from_secs(10);

/// Serve `app` until SIGINT or SIGTERM, over HTTPS when TLS is configured.
pub async fn serve(app: Router, settings: &Settings) -> anyhow::Result<()> {
    let addr = SocketAddr::new(settings.host, settings.port);
    match &settings.tls {
        Some(tls) => serve_tls(app, addr, tls).await,
        None => serve_plain(app, addr).await,
    }
}

async fn serve_plain(app: Router, addr: SocketAddr) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    tracing::info!(%addr, "Listening for webhooks over HTTP");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")
}

async fn serve_tls(app: Router, addr: SocketAddr, tls: &TlsPaths) -> anyhow::Result<()> {
    let config = RustlsConfig::from_pem_file(&tls.cert, &tls.key)
        .await
        .with_context(|| {
            format!(
                "load TLS certificate {} and key {}",
                tls.cert.display(),
                tls.key.display()
            )
        })?;

    let handle = axum_server::Handle::new();
    let shutdown = handle.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        shutdown.graceful_shutdown(Some(CONNECTION_DRAIN));
    });

    tracing::info!(%addr, "Listening for webhooks over HTTPS");
    axum_server::bind_rustls(addr, config)
        .handle(handle)
        .serve(app.into_make_service())
        .await
        .context("server error")
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM so the server shuts down
/// cleanly whether stopped interactively or by a process manager.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl-C handler");
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
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
