use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use market_intel_server::availability::AvailabilityReporter;
use market_intel_server::cache::Cache;
use market_intel_server::config::Settings;
use market_intel_server::data_service::DataService;
use market_intel_server::dispatcher::Dispatcher;
use market_intel_server::gateway;
use market_intel_server::notifications::LoggingNotificationSink;

#[derive(Parser)]
#[command(name = "market-intel-server", about = "Market-intelligence aggregation service")]
struct Cli {
    /// Overrides LOG_LEVEL from the environment.
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the stdio tool-call loop (the default if no subcommand is given).
    Serve,
    /// Print adapter/tool availability without serving requests.
    Doctor,
}

fn init_tracing(log_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| log_level.parse().unwrap_or_else(|_| "info".into()));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn print_doctor_report(reporter: &AvailabilityReporter) {
    println!("market-intel-server doctor\n");
    println!("{}", "=".repeat(60));
    let report = reporter.report_all();
    for tool in &report {
        let label = if tool.available { "PASS" } else { "FAIL" };
        let detail = if tool.available {
            if tool.warnings.is_empty() {
                String::new()
            } else {
                tool.warnings.join("; ")
            }
        } else {
            format!("missing: {}", tool.missing_keys.join(", "))
        };
        println!("  {:<6} {:<35} {}", label, tool.tool_name, detail);
    }
    let enabled = report.iter().filter(|t| t.available).count();
    println!("\n{enabled}/{} tools available", report.len());
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = Settings::from_env();
    init_tracing(cli.log_level.as_deref().unwrap_or(&settings.log_level));

    let cache = Arc::new(Cache::new());
    if let Some(path) = &settings.cache_snapshot_path {
        match cache.load_snapshot(Path::new(path)).await {
            Ok(restored) => tracing::info!(restored, path, "reloaded cache snapshot"),
            Err(e) => tracing::debug!(error = %e, path, "no cache snapshot reloaded"),
        }
    }

    let service = DataService::new(&settings, cache.clone());
    let reporter = AvailabilityReporter::new(&service);
    reporter.log_startup_summary();

    match cli.command.unwrap_or(Command::Serve) {
        Command::Doctor => {
            print_doctor_report(&reporter);
            Ok(())
        }
        Command::Serve => {
            let dispatcher = Arc::new(Dispatcher::new(
                service,
                settings.rate_limit_requests,
                settings.rate_limit_window,
                Arc::new(LoggingNotificationSink),
            ));

            let result = gateway::run_stdio_loop(dispatcher).await;

            if let Some(path) = &settings.cache_snapshot_path {
                if let Err(e) = cache.persist_snapshot(Path::new(path)).await {
                    tracing::warn!(error = %e, path, "failed to persist cache snapshot on shutdown");
                }
            }

            result
        }
    }
}
