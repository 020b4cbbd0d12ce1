//! FeedForge
//!
//! Fetches threat intelligence feeds, normalizes and enriches their
//! indicators, and writes one deduplicated snapshot per run.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod collectors;
mod config;
mod enrichment;
mod models;
mod pipeline;
mod storage;

use config::AppConfig;
use enrichment::{EnrichmentEngine, ipinfo::IpInfoProvider, whoisxml::WhoisXmlProvider};
use pipeline::Pipeline;

/// FeedForge
#[derive(Parser, Debug)]
#[command(name = "feedforge")]
#[command(about = "Fetch, normalize, enrich, and snapshot threat intelligence feeds")]
struct Args {
    /// Directory for verbatim feed captures
    #[arg(long, env = "RAW_DIR", default_value = "feeds/raw")]
    raw_dir: PathBuf,

    /// Directory for parsed snapshots
    #[arg(long, env = "PARSED_DIR", default_value = "feeds/parsed")]
    parsed_dir: PathBuf,

    /// AlienVault OTX API key
    #[arg(long, env = "OTX_API_KEY")]
    otx_api_key: Option<String>,

    /// AbuseIPDB API key
    #[arg(long, env = "ABUSEIPDB_API_KEY")]
    abuseipdb_api_key: Option<String>,

    /// IPinfo token; enables address enrichment
    #[arg(long, env = "IPINFO_API_KEY")]
    ipinfo_api_key: Option<String>,

    /// WhoisXML API key; enables domain enrichment
    #[arg(long, env = "WHOIS_API_KEY")]
    whois_api_key: Option<String>,

    /// Classification tag applied to every indicator
    #[arg(long, env = "THREAT_TYPE", default_value = "malware")]
    threat_type: String,

    /// Confidence score applied to every indicator
    #[arg(long, env = "CONFIDENCE", default_value = "80")]
    confidence: u8,

    /// Attempts per feed fetch before giving up on the feed
    #[arg(long, env = "FETCH_ATTEMPTS", default_value = "3")]
    fetch_attempts: u32,

    /// Base delay between fetch attempts, in seconds
    #[arg(long, env = "FETCH_RETRY_DELAY_SECS", default_value = "5")]
    fetch_retry_delay_secs: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "feedforge=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    tracing::info!("Starting FeedForge");

    let feeds = config::build_feeds(
        args.otx_api_key.as_deref(),
        args.abuseipdb_api_key.as_deref(),
        std::env::vars(),
    )
    .context("Failed to assemble feed configuration")?;

    let config = AppConfig {
        feeds,
        ipinfo_token: args.ipinfo_api_key,
        whois_api_key: args.whois_api_key,
        raw_dir: args.raw_dir,
        parsed_dir: args.parsed_dir,
        threat_type: args.threat_type,
        confidence: args.confidence,
        fetch_attempts: args.fetch_attempts,
        retry_delay: Duration::from_secs(args.fetch_retry_delay_secs),
    };

    // Register an enrichment provider per configured credential
    let mut enrichment = EnrichmentEngine::new();
    if let Some(token) = config.ipinfo_token.clone() {
        tracing::info!("Address enrichment enabled");
        enrichment.add_provider(Box::new(IpInfoProvider::new(token)));
    }
    if let Some(api_key) = config.whois_api_key.clone() {
        tracing::info!("Domain enrichment enabled");
        enrichment.add_provider(Box::new(WhoisXmlProvider::new(api_key)));
    }

    let pipeline = Pipeline::new(config, enrichment);
    let summary = pipeline.run().await.context("Pipeline run failed")?;

    tracing::info!(
        feeds_fetched = summary.feeds_fetched,
        feeds_failed = summary.feeds_failed,
        feeds_skipped = summary.feeds_skipped,
        indicators_raw = summary.indicators_raw,
        indicators_unique = summary.indicators_unique,
        snapshot = ?summary.snapshot_path,
        "Run complete"
    );

    Ok(())
}
