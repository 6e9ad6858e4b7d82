//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::{DispatchStrategy, PipelineBlueprint, Timeout};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    channel: String,
    capacity: usize,
    strategy: String,
    handler_count: usize,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(blueprint) => {
            let warnings = collect_warnings(&blueprint);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: (!warnings.is_empty()).then_some(warnings),
                summary: Some(ConfigSummary {
                    version: format!("{:?}", blueprint.version),
                    channel: blueprint.channel.name.clone(),
                    capacity: blueprint.channel.capacity,
                    strategy: format!("{:?}", blueprint.dispatch.strategy),
                    handler_count: blueprint.handlers.len(),
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(blueprint: &PipelineBlueprint) -> Vec<String> {
    let mut warnings = Vec::new();

    if blueprint.channel.capacity == 0 {
        warnings.push(
            "channel.capacity is 0 - the channel is unbounded and producers never block"
                .to_string(),
        );
    }

    let poller = &blueprint.poller;
    if poller.receive_timeout() == Timeout::Immediate && poller.interval_ms == 0 {
        warnings.push(
            "poller.receive_timeout_ms and poller.interval_ms are both 0 - the poller will busy-loop"
                .to_string(),
        );
    }

    if blueprint.dispatch.strategy == DispatchStrategy::RoundRobin {
        if blueprint.handlers.len() == 1 {
            warnings.push("round_robin with a single handler behaves like broadcast".to_string());
        }
        if blueprint.dispatch.fail_fast {
            warnings.push("dispatch.fail_fast has no effect with round_robin".to_string());
        }
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Channel: {}", summary.channel);
            println!("  Capacity: {}", summary.capacity);
            println!("  Strategy: {}", summary.strategy);
            println!("  Handlers: {}", summary.handler_count);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
