// src/main.rs
use clap::Parser;
use ct_zonescan::cli::{Cli, OutputFormat};
use ct_zonescan::config::Config;
use ct_zonescan::ct_log::{CtLogClient, Scanner};
use ct_zonescan::output::{human, json, OutputManager};
use ct_zonescan::progress::ProgressIndicator;
use ct_zonescan::shutdown::ShutdownSignal;
use ct_zonescan::stats::ScanStats;
use ct_zonescan::zones::ZoneSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Validate arguments
    cli.validate()?;

    // Load config file
    let mut config = Config::from_file(Path::new(&cli.config))?;

    // Apply CLI overrides
    if let Some(ref url) = cli.log_url {
        config.scan.log_url = url.clone();
    }
    if let Some(start) = cli.start {
        config.scan.start_index = start;
    }
    if let Some(end) = cli.end {
        config.scan.end_index = Some(end);
    }
    if let Some(workers) = cli.workers {
        config.scan.workers = workers;
    }
    if let Some(batch_size) = cli.batch_size {
        config.scan.batch_size = batch_size;
    }

    // Initialize logging
    let log_level = cli
        .log_level_override()
        .unwrap_or(config.logging.level.as_str());

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Starting ct-zonescan...");

    let zones = ZoneSet::from_json_file(Path::new(&cli.zones))?;
    tracing::info!("Loaded {} zones from {}", zones.len(), cli.zones);

    if cli.to_head {
        let client = CtLogClient::new(config.scan.base_url(), config.scan.network_timeout())?;
        let sth = client.get_sth().await?;
        tracing::info!("Log head is at tree size {}", sth.tree_size);
        config.scan.end_index = Some(sth.tree_size);
    }

    // Create output manager
    let mut output_manager = OutputManager::new();

    match cli.output_format() {
        OutputFormat::Human => {
            output_manager.add_sink(Arc::new(human::HumanOutput::new()));
        }
        OutputFormat::Json => {
            output_manager.add_sink(Arc::new(json::JsonOutput::new()));
        }
        OutputFormat::Silent => {
            tracing::info!("Silent mode: no stdout output");
        }
    }

    let scanner = Scanner::from_config(config.scan, zones)?
        .with_tracing(config.logging.verbose)
        .with_output(output_manager);
    let stats = scanner.stats();

    // Progress indicator and periodic stats
    let progress = ProgressIndicator::new(cli.should_show_progress());
    let tracker = if cli.stats || progress.is_enabled() {
        let interval = if cli.stats {
            Duration::from_secs(cli.stats_interval)
        } else {
            Duration::from_secs(1)
        };
        Some(progress.track(stats.clone(), interval))
    } else {
        None
    };

    // Ctrl-C stops dispatching; in-flight batches still finish
    let shutdown = ShutdownSignal::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Interrupt received, stopping scan...");
                shutdown.trigger();
            }
        });
    }

    let report = scanner.run(shutdown).await;

    if let Some(handle) = tracker {
        handle.abort();
    }
    progress.finish();

    if let Some(ref path) = cli.output_file {
        json::write_report(Path::new(path), &report.matches)?;
        tracing::info!("Wrote {} matches to {}", report.matches.len(), path);
    }

    tracing::info!(
        "Resume with --start {} to continue where this scan stopped",
        report.next_offset
    );

    // Print final stats if enabled
    if cli.stats {
        let snapshot = stats.snapshot();
        eprintln!("\n\n📊 Final Statistics:");
        eprintln!("  Batches attempted: {}", snapshot.batches_attempted);
        eprintln!("  Batches failed: {}", snapshot.batches_failed);
        eprintln!("  Entries decoded: {}", snapshot.entries_decoded);
        eprintln!("  Decode failures: {}", snapshot.entries_failed);
        eprintln!("  Matches found: {}", snapshot.matches_found);
        eprintln!("  Rate: {:.1} entries/min", snapshot.entries_per_minute);
        eprintln!("  Uptime: {}", ScanStats::format_uptime(snapshot.uptime_secs));
        eprintln!("  Next offset: {}", report.next_offset);
    }

    Ok(())
}
