use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod bundle;
mod catalog;
mod config;
mod error;
mod model;
mod riot;
mod server;
mod stats;

use crate::catalog::{CatalogCache, RarityPolicy};
use crate::config::Config;
use crate::riot::RiotClient;
use crate::server::AppState;

#[derive(Parser, Debug)]
#[command(
    name = "rift-companion",
    about = "Proxy service for the League companion app",
    version
)]
struct Cli {
    /// Port to listen on
    #[arg(long, default_value_t = 4000)]
    port: u16,

    /// Regional routing value for the Riot API host
    #[arg(long, default_value = "europe")]
    region: String,

    /// Pinned Data Dragon version
    #[arg(long = "ddragon-version", default_value = "14.23.1")]
    ddragon_version: String,

    /// Seconds before cached catalog data is refetched
    #[arg(long = "catalog-ttl-secs", default_value_t = 3600)]
    catalog_ttl_secs: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Cli::parse();
    let config = Config::from_env(&args.region, &args.ddragon_version, args.catalog_ttl_secs)?;

    let riot = Arc::new(RiotClient::new(
        &config.api_key,
        &config.riot_base,
        config.request_timeout,
    )?);
    let catalog = Arc::new(CatalogCache::new(
        &config.ddragon_base,
        config.catalog_ttl,
        RarityPolicy::default(),
        config.request_timeout,
    )?);

    let app = server::build_router(AppState { riot, catalog });

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", args.port))
        .await
        .context("failed to bind listener")?;
    tracing::info!(port = args.port, region = %args.region, "listening");
    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}
