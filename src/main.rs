use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use product_lookup::barcode::{
    canonical_ean13, generate_variants, has_valid_check_digit, normalize_digits,
};
use product_lookup::config::AppConfig;
use product_lookup::logging;
use product_lookup::metrics;
use product_lookup::registry::{PluginLoader, PluginProvider};
use product_lookup::types::SearchType;
use product_lookup::ProductLookupService;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "product-lookup")]
#[command(about = "Barcode-aware product lookup across multiple data sources")]
#[command(version)]
struct Cli {
    /// Plugin configuration document (overrides config.toml)
    #[arg(long, global = true)]
    plugins: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Look a product up by barcode or name
    Lookup(LookupArgs),
    /// Show configured plugin descriptors and the active plugins
    Plugins,
    /// Show every equivalent representation of a barcode
    Variants {
        barcode: String,
    },
}

#[derive(Args)]
struct LookupArgs {
    query: String,

    /// Treat the query as a barcode
    #[arg(long, conflicts_with = "name")]
    barcode: bool,

    /// Treat the query as a product name
    #[arg(long)]
    name: bool,

    #[arg(long)]
    max_results: Option<usize>,

    /// Cancel the remaining plugins after this many seconds
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Print Prometheus metrics after the response
    #[arg(long)]
    print_metrics: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let config = AppConfig::load().context("failed to load application config")?;
    logging::init_logging(&config.logging);

    let cli = Cli::parse();

    match cli.command {
        Commands::Variants { barcode } => print_variants(&barcode)?,
        Commands::Plugins => {
            let provider = start_provider(&config, cli.plugins).await;
            let snapshot = provider.snapshot();
            let output = json!({
                "source": snapshot.source.to_string(),
                "plugins": provider.get_plugin_configurations(),
                "storePlugins": provider.get_store_plugin_configurations(),
                "activeLookupPlugins": snapshot.lookup_plugin_ids(),
                "activeStorePlugins": snapshot.store_plugin_ids(),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Commands::Lookup(args) => {
            metrics::init_metrics(config.metrics.listen_addr);
            let provider = start_provider(&config, cli.plugins).await;
            let service = ProductLookupService::new(provider, config.lookup.max_results);

            let search_type = if args.barcode {
                Some(SearchType::Barcode)
            } else if args.name {
                Some(SearchType::Name)
            } else {
                None
            };

            let cancel = CancellationToken::new();
            spawn_cancel_triggers(&cancel, args.timeout_secs);

            let response = service
                .lookup(&args.query, search_type, args.max_results, &cancel)
                .await;
            println!("{}", serde_json::to_string_pretty(&response)?);

            if args.print_metrics {
                match metrics::render_metrics() {
                    Some(text) => eprintln!("{}", text),
                    None => warn!("Metrics are served over HTTP, nothing to print"),
                }
            }
        }
    }

    Ok(())
}

async fn start_provider(config: &AppConfig, override_path: Option<PathBuf>) -> Arc<PluginProvider> {
    let path = override_path.unwrap_or_else(|| config.lookup.plugin_config.clone());
    info!(path = %path.display(), "Loading plugins");
    Arc::new(PluginProvider::start(PluginLoader::new(Some(path))).await)
}

/// Cancel on Ctrl-C, and after `timeout_secs` when given.
fn spawn_cancel_triggers(cancel: &CancellationToken, timeout_secs: Option<u64>) {
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling remaining plugins");
            on_signal.cancel();
        }
    });

    if let Some(secs) = timeout_secs {
        let on_timeout = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(secs)).await;
            if !on_timeout.is_cancelled() {
                warn!(timeout_secs = secs, "Lookup timed out, cancelling remaining plugins");
                on_timeout.cancel();
            }
        });
    }
}

fn print_variants(barcode: &str) -> Result<()> {
    let digits = normalize_digits(barcode);
    let output = json!({
        "input": barcode,
        "digits": digits,
        "validCheckDigit": has_valid_check_digit(&digits, false),
        "canonicalEan13": canonical_ean13(&digits),
        "variants": generate_variants(&digits),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
