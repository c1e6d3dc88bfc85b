use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use serde::Serialize;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use infragraph_core::{ConfigManager, Settings};
use infragraph_graph::{EntityRef, Generation, PriceTable};
use infragraph_region::{Capabilities, Region, RefreshReport, SnapshotDiscovery};

#[derive(Parser)]
#[command(name = "infragraph")]
#[command(about = "InfraGraph - cloud infrastructure discovery and relationship graph", long_about = None)]
#[command(version)]
struct Cli {
    /// Directory holding default.toml, {env}.toml and local.toml
    #[arg(long, global = true, env = "INFRAGRAPH_CONFIG_DIR")]
    config_dir: Option<PathBuf>,

    /// Configuration environment (development, production, ...)
    #[arg(long, global = true)]
    env: Option<String>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Refresh the region and poll hosts on their intervals until Ctrl-C
    Run,

    /// Run one refresh cycle and print what was discovered
    Refresh {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run one refresh cycle and resolve an identity such as `inst:i-0abc`
    Lookup {
        identity: String,
    },

    /// Print the JSON schema of the configuration
    Schema,
}

#[derive(Serialize)]
struct EntitySummary {
    kind: String,
    identity: String,
    name: String,
    key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    hourly_cost: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    monthly_cost: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reachability: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Err(e) = execute(cli).await {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
    Ok(())
}

async fn execute(cli: Cli) -> Result<()> {
    if let Commands::Schema = cli.command {
        let schema = schemars::schema_for!(Settings);
        println!("{}", serde_json::to_string_pretty(&schema)?);
        return Ok(());
    }

    let config = ConfigManager::new(cli.config_dir.clone(), cli.env.clone())
        .context("Failed to load configuration")?;
    let settings = config.settings().clone();
    init_tracing(&settings, cli.verbose);

    let region = build_region(&settings)?;
    match cli.command {
        Commands::Run => run(region, &settings).await,
        Commands::Refresh { json } => {
            let report = region.refresh().await.context("Refresh failed")?;
            print_report(&region, &report, json)
        }
        Commands::Lookup { identity } => {
            region.refresh().await.context("Refresh failed")?;
            let summary = region.read(|g| {
                g.lookup(&identity)
                    .map(|entity| summarize(g, region.prices(), entity))
            });
            let summary = summary.with_context(|| format!("No entity with identity {identity}"))?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(())
        }
        Commands::Schema => Ok(()),
    }
}

fn init_tracing(settings: &Settings, verbose: bool) {
    let level = if verbose {
        "debug"
    } else {
        settings.logging.level.as_str()
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("infragraph={level}").into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn build_region(settings: &Settings) -> Result<Arc<Region>> {
    let discovery = SnapshotDiscovery::new(&settings.discovery.snapshot_dir);
    let mut region = Region::new(settings, Capabilities::new(Arc::new(discovery)));

    if let Some(path) = &settings.discovery.prices_file {
        let prices = PriceTable::from_path(path)
            .with_context(|| format!("Failed to load prices from {}", path.display()))?;
        info!(rows = prices.len(), "loaded price table");
        region = region.with_prices(prices);
    }
    Ok(Arc::new(region))
}

async fn run(region: Arc<Region>, settings: &Settings) -> Result<()> {
    let mut refresh = tokio::time::interval(settings.refresh.region_interval());
    let mut hosts = tokio::time::interval(settings.refresh.instance_interval());
    // The host poll needs a generation; the first region tick provides it.
    hosts.reset();

    info!(region = region.name(), "starting periodic refresh");
    loop {
        tokio::select! {
            _ = refresh.tick() => {
                if let Err(e) = region.refresh().await {
                    error!("refresh failed: {e}");
                }
            }
            _ = hosts.tick() => {
                let report = region.poll_instances().await;
                info!(?report, "host poll");
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                region.throttle().stop();
                return Ok(());
            }
        }
    }
}

fn print_report(region: &Region, report: &RefreshReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    println!(
        "{} {} generation {}",
        "✓".green().bold(),
        region.name().bold(),
        report.generation
    );
    println!(
        "  load {} ms, link {} ms",
        report.load.as_millis(),
        report.link.as_millis()
    );
    for (kind, count) in report.counts.iter().filter(|(_, count)| *count > 0) {
        println!("  {:<22} {}", kind.to_string().cyan(), count);
    }
    if let Some(metrics) = report.metrics {
        println!(
            "  metrics: {} calls, {} failed",
            metrics.submitted,
            if metrics.failed > 0 {
                metrics.failed.to_string().yellow()
            } else {
                metrics.failed.to_string().normal()
            }
        );
    }
    Ok(())
}

fn summarize(g: &Generation, prices: &PriceTable, entity: EntityRef) -> EntitySummary {
    let mut summary = EntitySummary {
        kind: entity.kind().to_string(),
        identity: g.identity_of(entity),
        name: g.name_of(entity).to_string(),
        key: g.key_of(entity).to_string(),
        hourly_cost: None,
        monthly_cost: None,
        reachability: None,
    };

    match entity {
        EntityRef::Instance(ix) => {
            let instance = &g.instances[ix];
            let image = instance.links.image.map(|i| &g.images[i]);
            summary.hourly_cost = Some(prices.instance_hourly(instance, image));
            summary.monthly_cost = Some(prices.instance_monthly(instance, image));
            let host = instance.host.read();
            summary.reachability = Some(match (&host.reason, host.unreachable) {
                (Some(reason), true) => format!("unreachable: {reason}"),
                (Some(reason), false) => reason.clone(),
                (None, true) => "unreachable".to_string(),
                (None, false) => "reachable".to_string(),
            });
        }
        EntityRef::DatabaseInstance(ix) => {
            let db = &g.database_instances[ix];
            summary.hourly_cost = Some(prices.database_hourly(db));
            summary.monthly_cost = Some(prices.database_monthly(db));
        }
        EntityRef::CacheCluster(ix) => {
            let cluster = &g.cache_clusters[ix];
            summary.hourly_cost = Some(prices.cache_hourly(cluster));
            summary.monthly_cost = Some(prices.cache_monthly(cluster));
        }
        _ => {}
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_global_flags_after_subcommands() {
        let cli = Cli::try_parse_from(["infragraph", "refresh", "--json", "--env", "test", "-v"])
            .unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.env.as_deref(), Some("test"));
        assert!(matches!(cli.command, Commands::Refresh { json: true }));

        let cli = Cli::try_parse_from(["infragraph", "lookup", "inst:i-1"]).unwrap();
        assert!(matches!(&cli.command, Commands::Lookup { identity } if identity == "inst:i-1"));
    }
}
