// src/bin/cryptoinfo_daemon.rs
use anyhow::Context;
use clap::Parser;
use cryptoinfo::{
    clock::SystemClock,
    config::CryptoinfoConfig,
    entity::Entity,
    poller::Poller,
    providers::{Endpoints, ReqwestTransport},
    publishing::StdoutPublisher,
    services::MetricServices,
    template::TeraRenderer,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "cryptoinfo_daemon", about = "Poll crypto metrics and print entity snapshots as JSON lines")]
struct Cli {
    /// Config file; falls back to $CRYPTOINFO_CONFIG.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();
    let path = cli
        .config
        .or_else(|| std::env::var_os("CRYPTOINFO_CONFIG").map(PathBuf::from))
        .context("no config file: pass --config or set CRYPTOINFO_CONFIG")?;
    let cfg = CryptoinfoConfig::from_path(&path)
        .with_context(|| format!("loading {}", path.display()))?;

    let services = MetricServices::new(
        Arc::new(SystemClock),
        Arc::new(TeraRenderer),
        Endpoints::new(&cfg.daemon.coingecko_base_url, &cfg.daemon.cryptoid_base_url)
            .with_mempool(&cfg.daemon.mempool_base_url),
    );
    let transport = Arc::new(ReqwestTransport::new(cfg.daemon.request_timeout_secs)?);

    let mut entities = Vec::with_capacity(cfg.entities.len());
    for entity_cfg in &cfg.entities {
        match Entity::new(entity_cfg, services.clone()).await {
            Ok(entity) => entities.push(entity),
            Err(e) => tracing::error!("skipping {} ({}): {e}", entity_cfg.cryptocurrency_name, entity_cfg.api_mode),
        }
    }

    let poller = Poller::new(entities, StdoutPublisher, transport);
    tokio::select! {
        _ = poller.run() => {}
        _ = tokio::signal::ctrl_c() => tracing::info!("shutting down"),
    }

    #[cfg(feature = "metrics")]
    eprintln!("{}", cryptoinfo::metrics::gather_text());
    Ok(())
}
