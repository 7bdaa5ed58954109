use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use quill_app::server;
use quill_common::observability::init_logging;
use quill_config::{QuillConfig, QuillConfigLoader};

/// Fetch web articles and serve them as a simplified HTML fragment.
#[derive(Debug, Parser)]
#[command(name = "quill", version)]
struct Cli {
    /// YAML config file; skipped when it does not exist.
    #[arg(short, long, env = "QUILL_CONFIG_FILE", default_value = "quill.yaml")]
    config: PathBuf,

    /// Interface to bind, overrides `server.host`.
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, overrides `server.port`.
    #[arg(short, long)]
    port: Option<u16>,

    /// Verbose logging.
    #[arg(long)]
    debug: bool,
}

impl Cli {
    fn apply(&self, cfg: &mut QuillConfig) {
        if let Some(host) = &self.host {
            cfg.server.host = host.clone();
        }
        if let Some(port) = self.port {
            cfg.server.port = port;
        }
        if self.debug {
            cfg.server.debug = true;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 1) Load config (file < env < CLI flags)
    let mut cfg = QuillConfigLoader::new()
        .with_optional_file(&cli.config)
        .load()?;
    cli.apply(&mut cfg);

    let log_path = init_logging(server::log_config(&cfg))?;
    tracing::info!(
        config = %cli.config.display(),
        log = %log_path.display(),
        "quill.start"
    );

    server::serve(cfg).await
}
