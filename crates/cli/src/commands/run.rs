//! `run` command implementation.

use anyhow::{Context, Result};
use contracts::PipelineBlueprint;
use tracing::{error, info, warn};

use crate::cli::RunArgs;
use crate::pipeline::{Pipeline, PipelineConfig};

/// Execute the `run` command
pub async fn run_pipeline(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    let mut blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    if apply_overrides(&mut blueprint, args) {
        config_loader::ConfigLoader::validate(&blueprint)
            .context("Configuration invalid after command line overrides")?;
    }

    info!(
        channel = %blueprint.channel.name,
        capacity = blueprint.channel.capacity,
        strategy = ?blueprint.dispatch.strategy,
        handlers = blueprint.handlers.len(),
        "Configuration loaded"
    );

    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&blueprint);
        return Ok(());
    }

    let pipeline_config = PipelineConfig {
        blueprint,
        input: args.input.clone(),
        limit: (args.limit > 0).then_some(args.limit),
        metrics_port: (args.metrics_port > 0).then_some(args.metrics_port),
    };

    info!("Starting pipeline...");

    let stats = Pipeline::new(pipeline_config)
        .run(setup_shutdown_signal())
        .await
        .context("Pipeline execution failed")?;

    info!(
        messages_sent = stats.messages_sent,
        delivered = stats.poller.delivered_count,
        failed = stats.poller.failure_count,
        duration_secs = stats.duration.as_secs_f64(),
        throughput = format!("{:.2}", stats.throughput()),
        interrupted = stats.interrupted,
        "Pipeline finished"
    );
    stats.print_summary();

    Ok(())
}

/// Apply command line overrides; returns true if anything changed
fn apply_overrides(blueprint: &mut PipelineBlueprint, args: &RunArgs) -> bool {
    let mut changed = false;
    if let Some(capacity) = args.capacity {
        info!(capacity, "Overriding channel capacity from CLI");
        blueprint.channel.capacity = capacity;
        changed = true;
    }
    if let Some(max) = args.max_messages_per_poll {
        info!(max, "Overriding max messages per poll from CLI");
        blueprint.poller.max_messages_per_poll = max;
        changed = true;
    }
    if let Some(interval_ms) = args.interval_ms {
        info!(interval_ms, "Overriding poll interval from CLI");
        blueprint.poller.interval_ms = interval_ms;
        changed = true;
    }
    changed
}

/// Resolves on Ctrl+C or SIGTERM
///
/// A signal that cannot be installed is logged and never fires.
async fn setup_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    warn!("Received shutdown signal, stopping pipeline...");
}

/// Print configuration summary for dry-run mode
fn print_config_summary(blueprint: &PipelineBlueprint) {
    println!("\n=== Configuration Summary ===\n");
    println!("Channel:");
    println!("  Name: {}", blueprint.channel.name);
    if blueprint.channel.capacity == 0 {
        println!("  Capacity: unbounded");
    } else {
        println!("  Capacity: {}", blueprint.channel.capacity);
    }

    let poller = &blueprint.poller;
    println!("\nPoller:");
    if poller.max_messages_per_poll > 0 {
        println!("  Max messages per poll: {}", poller.max_messages_per_poll);
    } else {
        println!("  Max messages per poll: unbounded");
    }
    println!("  Receive timeout: {}", poller.receive_timeout());
    println!("  Interval: {}ms", poller.interval_ms);
    println!("  Propagate errors: {}", poller.propagate_errors);

    println!(
        "\nDispatch: {:?} (fail_fast: {})",
        blueprint.dispatch.strategy, blueprint.dispatch.fail_fast
    );

    println!("\nHandlers ({}):", blueprint.handlers.len());
    for handler in &blueprint.handlers {
        println!("  - {} ({:?})", handler.name, handler.handler_type);
    }

    println!();
}
