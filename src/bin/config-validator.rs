//! # Gateway Configuration Validator
//!
//! Loads `gateway-config.yaml` for an environment exactly as the server would,
//! runs validation, and prints either a per-section summary or the sanitized
//! effective configuration.

use bgg_gateway::config::{ConfigManager, GatewayConfig};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "config-validator")]
#[command(about = "Validate BGG gateway configuration")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Environment section to apply (development, test, production)
    #[arg(short, long, default_value = "development")]
    environment: String,

    /// Directory containing gateway-config.yaml
    #[arg(short, long)]
    config_dir: Option<PathBuf>,

    /// Verbose output level (use multiple times for more verbosity)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Validate every section
    All,

    /// Validate a single section
    Component {
        /// cache, upstream, rate_limiter, dispatcher, metrics, refresh, web
        name: String,
    },

    /// Print the effective configuration with secrets masked
    Show,
}

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let _ = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .try_init();

    let result = ConfigManager::load_from_directory_with_env(cli.config_dir.clone(), &cli.environment)
        .map_err(|e| e.to_string())
        .map(|manager| {
            for warning in manager.config().warnings() {
                eprintln!("warning: {warning}");
            }
            manager
        })
        .and_then(|manager| match &cli.command {
            Some(Commands::Component { name }) => print_component(manager.config(), name),
            Some(Commands::Show) => print_effective(&manager),
            Some(Commands::All) | None => {
                for name in COMPONENTS {
                    print_component(manager.config(), name)?;
                }
                Ok(())
            }
        });

    match result {
        Ok(()) => {
            info!("Configuration validation completed successfully");
            println!("Configuration for '{}' is valid", cli.environment);
        }
        Err(e) => {
            error!("Configuration validation failed: {e}");
            eprintln!("Configuration for '{}' is invalid: {e}", cli.environment);
            process::exit(1);
        }
    }
}

const COMPONENTS: [&str; 7] = [
    "cache",
    "upstream",
    "rate_limiter",
    "dispatcher",
    "metrics",
    "refresh",
    "web",
];

fn print_component(config: &GatewayConfig, name: &str) -> Result<(), String> {
    match name.to_lowercase().replace('-', "_").as_str() {
        "cache" => println!(
            "cache: backend={} ttl={}s max_entries={}",
            config.cache.backend, config.cache.ttl_seconds, config.cache.max_entries
        ),
        "upstream" => println!(
            "upstream: base_url={} timeout={}ms",
            config.upstream.base_url, config.upstream.request_timeout_ms
        ),
        "rate_limiter" => {
            for (label, policy) in [
                ("interactive", &config.rate_limiter.interactive),
                ("bulk", &config.rate_limiter.bulk),
            ] {
                println!(
                    "rate_limiter.{label}: spacing={}ms retries={} backoff={}..{}ms",
                    policy.min_spacing_ms,
                    policy.max_retries,
                    policy.base_delay_ms,
                    policy.max_delay_ms
                );
            }
        }
        "dispatcher" => println!(
            "dispatcher: fetch_timeout={}ms summary_interval={} coalesce={}",
            config.dispatcher.fetch_timeout_ms,
            config.dispatcher.summary_interval,
            config.dispatcher.coalesce_requests
        ),
        "metrics" => println!(
            "metrics: event_log={} window={} sample={}",
            config.metrics.event_log, config.metrics.hit_rate_window, config.metrics.memory_sample_size
        ),
        "refresh" => println!(
            "refresh: categories={} items_per_category={} item_delay={}ms max_pages={}",
            config.refresh.categories.join(","),
            config.refresh.items_per_category,
            config.refresh.item_delay_ms,
            config.refresh.max_pages
        ),
        "web" => println!(
            "web: bind={} timeout={}ms admin_tokens={} expose_error_details={}",
            config.web.bind_address,
            config.web.request_timeout_ms,
            config.web.admin_tokens.len(),
            config.web.expose_error_details
        ),
        other => return Err(format!("Unknown component: {other}")),
    }
    Ok(())
}

fn print_effective(manager: &ConfigManager) -> Result<(), String> {
    let rendered = serde_json::to_string_pretty(&manager.debug_config()).map_err(|e| e.to_string())?;
    println!("{rendered}");
    Ok(())
}
