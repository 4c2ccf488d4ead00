// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use community_chains_server::{
    api::router,
    config::{Config, TlsPaths},
    reconciler::Reconciler,
    state::AppState,
    telemetry::{self, LogFormat},
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Time in-flight HTTPS requests get to finish after shutdown starts.
const TLS_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() {
    telemetry::init(LogFormat::from_env());

    if let Err(e) = run().await {
        error!(error = %e, "Server failed");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), BoxError> {
    let config = Config::from_env()?;
    let addr = config.bind_addr;
    let tls = config.tls.clone();
    let reconcile_interval = config.reconcile_interval;

    let state = AppState::build(config)?;
    let shutdown = CancellationToken::new();

    let reconciler = match reconcile_interval {
        Some(interval) => {
            let reconciler = Reconciler::new(state.routing.clone(), state.storage.clone())
                .with_interval(interval);
            Some(tokio::spawn(reconciler.run(shutdown.clone())))
        }
        None => {
            info!("Reconciler disabled");
            None
        }
    };

    tokio::spawn(cancel_on_signal(shutdown.clone()));

    let app = router(state);
    let served = match tls {
        Some(paths) => serve_tls(app, addr, &paths, shutdown.clone()).await,
        None => serve_http(app, addr, shutdown.clone()).await,
    };

    shutdown.cancel();
    if let Some(task) = reconciler {
        if let Err(e) = task.await {
            warn!(error = %e, "Reconciler task ended abnormally");
        }
    }
    served
}

async fn serve_http(app: Router, addr: SocketAddr, shutdown: CancellationToken) -> Result<(), BoxError> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "Community Chains server listening on http://{addr} (docs at /docs)");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    Ok(())
}

async fn serve_tls(
    app: Router,
    addr: SocketAddr,
    paths: &TlsPaths,
    shutdown: CancellationToken,
) -> Result<(), BoxError> {
    // Install the ring crypto provider for rustls before any TLS operation.
    if rustls::crypto::ring::default_provider().install_default().is_err() {
        warn!("rustls crypto provider already installed");
    }

    let tls_config = RustlsConfig::from_pem_file(&paths.cert, &paths.key).await?;
    info!(%addr, cert = %paths.cert.display(), "Community Chains server listening on https://{addr} (docs at /docs)");

    let handle = axum_server::Handle::new();
    let drain = handle.clone();
    tokio::spawn(async move {
        shutdown.cancelled().await;
        drain.graceful_shutdown(Some(TLS_DRAIN_TIMEOUT));
    });

    axum_server::bind_rustls(addr, tls_config)
        .handle(handle)
        .serve(app.into_make_service())
        .await?;
    Ok(())
}

async fn cancel_on_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for ctrl-c");
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
                error!(error = %e, "Failed to listen for SIGTERM");
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
    info!("Shutdown signal received");
    shutdown.cancel();
}
