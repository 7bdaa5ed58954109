use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use quill_common::observability::{LogConfig, LogFormat};
use quill_config::{LogFormatKind, QuillConfig};
use quill_web::{ContentExtractor, DomQueryParser, HttpPageFetcher};
use tokio::net::TcpListener;

use crate::{AppState, router};

/// Wire the production fetcher and parser into handler state.
pub fn build_state(cfg: &QuillConfig) -> Result<AppState> {
    let fetcher = HttpPageFetcher::from_config(&cfg.fetcher)
        .context("failed to build page fetcher")?;
    let extractor = ContentExtractor::new(Arc::new(fetcher), Arc::new(DomQueryParser));
    Ok(AppState::new(extractor))
}

/// Map the `logging` section onto the shared logging initialiser.
pub fn log_config(cfg: &QuillConfig) -> LogConfig {
    LogConfig {
        app_name: "quill",
        log_dir: cfg.logging.dir.as_ref().map(PathBuf::from),
        emit_stderr: cfg.logging.stderr,
        format: match cfg.logging.format {
            LogFormatKind::Text => LogFormat::Text,
            LogFormatKind::Json => LogFormat::Json,
        },
        default_filter: cfg.logging.effective_filter(cfg.server.debug),
    }
}

/// Bind, serve and block until Ctrl-C.
pub async fn serve(cfg: QuillConfig) -> Result<()> {
    let state = build_state(&cfg)?;
    let app = router(state, &cfg.cors);

    let addr = cfg.server.bind_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(
        addr = %listener.local_addr()?,
        any_origin = cfg.cors.allows_any_origin(),
        fetch_timeout_secs = cfg.fetcher.timeout_secs,
        "server.listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("server.stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for ctrl-c");
    }
    tracing::info!("server.shutdown_requested");
}
