// src/bin/metric_probe.rs
use clap::Parser;
use cryptoinfo::{
    config::{ChildSensorConfig, EntityConfig},
    entity::Entity,
    poller::Poller,
    providers::{http::DEFAULT_TIMEOUT_SECS, ReqwestTransport},
    publishing::StdoutPublisher,
    services::MetricServices,
};
use std::sync::Arc;

/// Runs a single update of one entity and prints its snapshots.
#[derive(Parser, Debug)]
#[command(name = "metric_probe")]
struct Cli {
    #[arg(long, default_value = "price_main")]
    mode: String,
    #[arg(long, default_value = "bitcoin")]
    asset: String,
    #[arg(long, default_value = "usd")]
    quote: String,
    #[arg(long, default_value_t = 1.0)]
    multiplier: f64,
    #[arg(long = "pool-prefix")]
    pool_prefix: Vec<String>,
    #[arg(long, default_value = "")]
    args: String,
    #[arg(long)]
    api_domain: Option<String>,
    #[arg(long)]
    pool_name: Option<String>,
    /// Child attribute to project, as `attribute[:unit]`.
    #[arg(long = "child")]
    children: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();
    let cfg = EntityConfig {
        api_mode: cli.mode,
        cryptocurrency_name: cli.asset,
        currency_name: cli.quote,
        multiplier: cli.multiplier,
        pool_prefix: cli.pool_prefix,
        fetch_args: cli.args,
        api_domain_name: cli.api_domain,
        pool_name: cli.pool_name,
        extra_sensors: cli
            .children
            .iter()
            .map(|arg| {
                let (property, unit) = match arg.split_once(':') {
                    Some((p, u)) => (p, Some(u.to_string())),
                    None => (arg.as_str(), None),
                };
                ChildSensorConfig {
                    property: property.to_string(),
                    id: None,
                    unique_id: None,
                    unit_of_measurement: unit,
                }
            })
            .collect(),
        ..EntityConfig::default()
    };

    let services = MetricServices::with_defaults();
    let entity = Entity::new(&cfg, services).await?;
    let transport = Arc::new(ReqwestTransport::new(DEFAULT_TIMEOUT_SECS)?);
    let mut poller = Poller::new(vec![entity], StdoutPublisher, transport);
    for outcome in poller.tick_once().await {
        eprintln!("outcome: {}", outcome.as_str());
    }
    Ok(())
}
