//! ThreatFusion CLI
//!
//! Enrich a single threat indicator across several intelligence sources
//! and fuse the answers into one risk score.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{warn, Level};
use tracing_subscriber::FmtSubscriber;

use fusion_agents::{build_providers, FusionConfig};
use fusion_core::Indicator;
use fusion_runtime::{
    calculate_risk, default_report_path, render_html, render_json, render_text, Orchestrator,
    OrchestratorConfig, RateGovernor,
};

#[derive(Parser)]
#[command(name = "threatfusion")]
#[command(author, version, about = "ThreatFusion: multi-source threat intelligence enrichment", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbosity level (0-3), defaults to LOG_LEVEL
    #[arg(short, long, global = true)]
    verbose: Option<u8>,

    /// TOML configuration file
    #[arg(short, long, global = true, env = "THREATFUSION_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
    Html,
}

#[derive(Subcommand)]
enum Commands {
    /// Enrich an indicator (hash, IP, domain, URL or email)
    Enrich {
        /// The indicator to look up
        indicator: String,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        output: OutputFormat,

        /// Save the report to a file
        #[arg(short, long)]
        save: Option<PathBuf>,

        /// Overall timeout in seconds (default: DEFAULT_TIMEOUT or 30)
        #[arg(short, long)]
        timeout: Option<u64>,

        /// Maximum concurrent provider calls (default: MAX_WORKERS or 8)
        #[arg(long)]
        workers: Option<usize>,
    },

    /// Show which intelligence sources are configured
    ConfigCheck,

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = FusionConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;

    FmtSubscriber::builder()
        .with_max_level(log_level(cli.verbose, &config.app.log_level))
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    match cli.command {
        Commands::Enrich {
            indicator,
            output,
            save,
            timeout,
            workers,
        } => {
            run_enrich(&config, &indicator, output, save, timeout, workers).await?;
        }
        Commands::ConfigCheck => config_check(&config),
        Commands::Version => print_version(),
    }

    Ok(())
}

/// `-v` wins; otherwise the configured level name
fn log_level(verbose: Option<u8>, configured: &str) -> Level {
    match verbose {
        Some(0) => Level::ERROR,
        Some(1) => Level::INFO,
        Some(2) => Level::DEBUG,
        Some(_) => Level::TRACE,
        None => match configured.trim().to_ascii_uppercase().as_str() {
            "WARNING" => Level::WARN,
            "CRITICAL" => Level::ERROR,
            other => other.parse().unwrap_or(Level::INFO),
        },
    }
}

async fn run_enrich(
    config: &FusionConfig,
    raw: &str,
    output: OutputFormat,
    save: Option<PathBuf>,
    timeout: Option<u64>,
    workers: Option<usize>,
) -> Result<()> {
    let indicator = Indicator::parse(raw).map_err(|e| anyhow!("Invalid indicator: {}", e))?;

    if indicator.is_private {
        warn!(
            "{} is a private/non-routable address, external sources may have no data",
            indicator.value
        );
    }

    let providers = build_providers(&config.api, &config.http.to_http_config())?;
    if providers.is_empty() {
        return Err(anyhow!(
            "No API keys configured. Set VT_API_KEY, SHODAN_API_KEY, CENSYS_API_ID/CENSYS_API_SECRET, OTX_API_KEY or ABUSEIPDB_API_KEY"
        ));
    }

    let governor = Arc::new(RateGovernor::new());
    for provider in &providers {
        let rate = config.rate_limit_for(provider.name(), provider.default_rate_per_minute());
        governor.register(provider.name(), rate);
    }

    let orchestrator_config = OrchestratorConfig::default()
        .with_max_workers(workers.unwrap_or(config.app.max_workers))
        .with_call_timeout(Duration::from_secs(config.app.call_timeout_secs))
        .with_cancel_abandoned(config.app.cancel_abandoned);
    let orchestrator = Orchestrator::new(providers, governor, orchestrator_config)?;

    let global_timeout = Duration::from_secs(timeout.unwrap_or(config.app.default_timeout_secs));

    if output == OutputFormat::Text {
        println!("🔍 Enriching {} ({})\n", indicator.value, indicator.indicator_type);
    }

    let results = orchestrator
        .enrich_parallel(&indicator.value, indicator.indicator_type, global_timeout)
        .await;

    if results.no_applicable_providers() {
        eprintln!(
            "⚠️  No configured source supports {} indicators",
            indicator.indicator_type
        );
    }

    let risk = calculate_risk(&results);

    match output {
        OutputFormat::Text | OutputFormat::Json => {
            let report = if output == OutputFormat::Text {
                render_text(&indicator, &results, &risk)
            } else {
                render_json(&indicator, &results, &risk)?
            };
            println!("{}", report);
            if let Some(path) = save {
                write_report(&path, &report)?;
            }
        }
        OutputFormat::Html => {
            let report = render_html(&indicator, &results, &risk);
            let path = save.unwrap_or_else(|| PathBuf::from(default_report_path(&indicator.value)));
            write_report(&path, &report)?;
        }
    }

    Ok(())
}

fn write_report(path: &Path, report: &str) -> Result<()> {
    fs::write(path, report).with_context(|| format!("Failed to write {}", path.display()))?;
    eprintln!("📄 Report saved to: {}", path.display());
    Ok(())
}

fn config_check(config: &FusionConfig) {
    println!("🔑 ThreatFusion configuration\n");
    println!("   {:<12} STATUS", "SERVICE");

    let services = config.configured_services();
    for (name, configured) in &services {
        let status = if *configured { "✅ configured" } else { "❌ missing" };
        println!("   {:<12} {}", name, status);
    }

    let configured = services.iter().filter(|(_, set)| *set).count();
    println!("\n📊 {}/{} services configured", configured, services.len());
    println!(
        "⚙️  Workers: {} | Timeout: {}s | Per-call timeout: {}s",
        config.app.max_workers, config.app.default_timeout_secs, config.app.call_timeout_secs
    );

    if configured == 0 {
        println!("\n⚠️  No API keys configured. Set them in the environment or a --config file.");
    }
}

fn print_version() {
    println!("🛡️  ThreatFusion v{}", env!("CARGO_PKG_VERSION"));
    println!(
        "   Platform: {}-{}",
        std::env::consts::OS,
        std::env::consts::ARCH
    );
}
