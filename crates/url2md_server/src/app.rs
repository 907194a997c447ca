use std::sync::Arc;

use anyhow::Context;
use serde_json::json;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use url2md_logging::{conv_error, conv_info};

use crate::config::ServerConfig;
use crate::context::{AppContext, Transport};
use crate::sampler::{spawn_rate_limit_sweeper, spawn_stats_sampler};
use crate::{history, http, mcp};

/// Runs the server until a shutdown signal or, on stdio, end of input.
pub async fn run(config: ServerConfig, transport: Transport) -> anyhow::Result<()> {
    let listener = match transport {
        Transport::Http => {
            let addr = format!("{}:{}", config.host, config.port);
            let listener = TcpListener::bind(&addr)
                .await
                .with_context(|| format!("failed to bind {}", addr))?;
            Some(listener)
        }
        Transport::Stdio => None,
    };

    let ctx = Arc::new(AppContext::from_config(&config, transport));
    if let Some(path) = &config.history_file {
        history::load_into(&ctx.store, path);
    }

    let cancel = CancellationToken::new();
    let sampler = spawn_stats_sampler(ctx.clone(), config.stats_interval(), cancel.clone());
    let sweeper = spawn_rate_limit_sweeper(ctx.clone(), cancel.clone());
    let signals = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = wait_for_signal() => cancel.cancel(),
                _ = cancel.cancelled() => {}
            }
        })
    };

    ctx.activity.info(
        "URL to markdown server started",
        Some(json!({
            "transport": match transport {
                Transport::Http => "http",
                Transport::Stdio => "stdio",
            },
            "port": config.port,
        })),
    );

    let result = match listener {
        Some(listener) => http::serve(ctx.clone(), listener, cancel.clone())
            .await
            .context("HTTP server failed"),
        None => mcp::serve_stdio(&ctx, cancel.clone())
            .await
            .context("stdio transport failed"),
    };

    cancel.cancel();
    let _ = tokio::join!(sampler, sweeper, signals);

    if let Some(path) = &config.history_file {
        if let Err(err) = history::save(&ctx.store, path) {
            conv_error!("Failed to save job history to {:?}: {}", path, err);
        }
    }
    conv_info!("Server stopped");
    result
}

async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            conv_error!("Failed to listen for Ctrl+C: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                conv_error!("Failed to install SIGTERM handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => conv_info!("Received Ctrl+C, shutting down"),
        _ = terminate => conv_info!("Received SIGTERM, shutting down"),
    }
}
