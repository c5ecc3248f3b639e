//! Batch market report over the configured token list.
//!
//! ```bash
//! # Report on the tokens from config.yaml
//! market-report
//!
//! # Report on specific symbols, cleaning expired cache rows first
//! market-report BTC KAS --sweep --stats
//! ```

use anyhow::{bail, Context};
use clap::Parser;
use token_market_sdk::{AppConfig, AssetSnapshot, MarketDataTracker, SnapshotError};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "market-report")]
#[command(about = "Cached market data report for cryptocurrency assets", version)]
struct Cli {
    /// Symbols to report on (defaults to the configured `tokens` list)
    symbols: Vec<String>,

    /// Path to the configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: String,

    /// Remove expired cache entries before querying
    #[arg(long)]
    sweep: bool,

    /// Print cache and provider statistics after the report
    #[arg(long)]
    stats: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let cli = Cli::parse();

    let config = AppConfig::load(&cli.config)
        .with_context(|| format!("failed to load configuration from {}", cli.config))?;
    let tracker = MarketDataTracker::new(&config).context("failed to build tracker")?;

    if cli.sweep {
        let removed = tracker.sweep_cache();
        if removed > 0 {
            println!("removed {} expired cache entries", removed);
        }
    }

    let symbols = if cli.symbols.is_empty() {
        config.tokens.clone()
    } else {
        cli.symbols.clone()
    };
    if symbols.is_empty() {
        bail!("no symbols to report on: pass them as arguments or set `tokens` in the configuration");
    }

    let results = tracker.get_snapshots(&symbols).await;

    let mut produced = 0usize;
    for (symbol, result) in &results {
        match result {
            Ok(snapshot) => {
                produced += 1;
                print_snapshot(&tracker, snapshot);
            }
            Err(SnapshotError::UnknownAsset { symbol }) => {
                println!("{}: unknown asset", symbol);
            }
            Err(SnapshotError::AllFieldsUnresolved { .. }) => {
                println!("{}: no data available (all providers failed)", symbol);
            }
        }
        println!("{}", "-".repeat(50));
    }

    if cli.stats {
        print_stats(&tracker).await;
    }

    if produced == 0 {
        bail!("every requested asset failed");
    }
    Ok(())
}

fn print_snapshot(tracker: &MarketDataTracker, snapshot: &AssetSnapshot) {
    let name = tracker
        .registry()
        .resolve(&snapshot.symbol)
        .map(|spec| spec.name)
        .unwrap_or("");
    println!("{} ({})", snapshot.symbol, name);

    match snapshot.usd_price {
        Some(price) => println!("  USD price:  ${:.2}", price),
        None => println!("  USD price:  unavailable"),
    }
    match snapshot.cny_price {
        Some(price) => println!("  CNY price:  ¥{:.2}", price),
        None => println!("  CNY price:  unavailable"),
    }
    match snapshot.circulating_supply {
        Some(supply) => println!("  supply:     {:.0} {}", supply, snapshot.symbol),
        None => println!("  supply:     unavailable"),
    }
    match snapshot.hashrate {
        Some(rate) => println!(
            "  hash rate:  {:.2} {}",
            rate,
            snapshot.hashrate_unit.as_deref().unwrap_or("")
        ),
        None => {
            let supports = tracker
                .registry()
                .resolve(&snapshot.symbol)
                .map(|spec| spec.supports_hashrate)
                .unwrap_or(false);
            if supports {
                println!("  hash rate:  unavailable");
            } else {
                println!("  hash rate:  n/a (no proof-of-work)");
            }
        }
    }
    if snapshot.partial {
        let missing: Vec<&str> = snapshot.unresolved.iter().map(|f| f.as_str()).collect();
        println!("  partial result, unresolved: {}", missing.join(", "));
    }
}

async fn print_stats(tracker: &MarketDataTracker) {
    let stats = tracker.cache_stats();
    println!("cache: enabled={}", stats.enabled);
    println!("  entries: {}", stats.total_entries);
    println!("  hits:    {}", stats.hit_count);
    println!("  misses:  {}", stats.miss_count);

    for metrics in tracker.provider_metrics().await {
        println!(
            "provider {}: {} requests, {} failed, p50 {:.0}ms, p99 {:.0}ms",
            metrics.provider_name,
            metrics.total_requests,
            metrics.failed_requests,
            metrics.latency_p50_ms,
            metrics.latency_p99_ms
        );
        for (kind, count) in &metrics.errors_by_kind {
            println!("  {}: {}", kind, count);
        }
    }
}
