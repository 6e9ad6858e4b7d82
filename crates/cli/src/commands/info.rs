//! `info` command implementation.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use contracts::PipelineBlueprint;
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    channel: ChannelInfo,
    poller: PollerInfo,
    dispatch: DispatchInfo,
    handlers: Vec<HandlerInfo>,
}

#[derive(Serialize)]
struct ChannelInfo {
    name: String,
    capacity: usize,
    unbounded: bool,
}

#[derive(Serialize)]
struct PollerInfo {
    max_messages_per_poll: i64,
    receive_timeout: String,
    interval_ms: u64,
    propagate_errors: bool,
}

#[derive(Serialize)]
struct DispatchInfo {
    strategy: String,
    fail_fast: bool,
}

#[derive(Serialize)]
struct HandlerInfo {
    name: String,
    handler_type: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    params: BTreeMap<String, String>,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    let blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    if args.json {
        let info = build_config_info(&blueprint, args.handlers);
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&blueprint, args.handlers);
    }

    Ok(())
}

fn build_config_info(blueprint: &PipelineBlueprint, with_params: bool) -> ConfigInfo {
    let handlers = blueprint
        .handlers
        .iter()
        .map(|h| HandlerInfo {
            name: h.name.clone(),
            handler_type: format!("{:?}", h.handler_type),
            // Sorted so output is stable across runs
            params: if with_params {
                h.params.clone().into_iter().collect()
            } else {
                BTreeMap::new()
            },
        })
        .collect();

    ConfigInfo {
        version: format!("{:?}", blueprint.version),
        channel: ChannelInfo {
            name: blueprint.channel.name.clone(),
            capacity: blueprint.channel.capacity,
            unbounded: blueprint.channel.capacity == 0,
        },
        poller: PollerInfo {
            max_messages_per_poll: blueprint.poller.max_messages_per_poll,
            receive_timeout: blueprint.poller.receive_timeout().to_string(),
            interval_ms: blueprint.poller.interval_ms,
            propagate_errors: blueprint.poller.propagate_errors,
        },
        dispatch: DispatchInfo {
            strategy: format!("{:?}", blueprint.dispatch.strategy),
            fail_fast: blueprint.dispatch.fail_fast,
        },
        handlers,
    }
}

fn print_config_info(blueprint: &PipelineBlueprint, with_params: bool) {
    println!("╭─────────────────────────────────────────╮");
    println!("│         Pipeline Configuration          │");
    println!("╰─────────────────────────────────────────╯\n");

    println!("📥 Channel");
    println!("   ├─ Name: {}", blueprint.channel.name);
    if blueprint.channel.capacity == 0 {
        println!("   └─ Capacity: unbounded");
    } else {
        println!("   └─ Capacity: {}", blueprint.channel.capacity);
    }

    let poller = &blueprint.poller;
    println!("\n⏱  Poller");
    if poller.max_messages_per_poll > 0 {
        println!("   ├─ Max messages per poll: {}", poller.max_messages_per_poll);
    } else {
        println!("   ├─ Max messages per poll: unbounded");
    }
    println!("   ├─ Receive timeout: {}", poller.receive_timeout());
    println!("   ├─ Interval: {}ms", poller.interval_ms);
    println!("   └─ Propagate errors: {}", poller.propagate_errors);

    println!("\n🔀 Dispatch");
    println!("   ├─ Strategy: {:?}", blueprint.dispatch.strategy);
    println!("   └─ Fail fast: {}", blueprint.dispatch.fail_fast);

    println!("\n📤 Handlers ({})", blueprint.handlers.len());
    let count = blueprint.handlers.len();
    for (i, handler) in blueprint.handlers.iter().enumerate() {
        let last = i + 1 == count;
        let prefix = if last { "└─" } else { "├─" };
        println!("   {} {} ({:?})", prefix, handler.name, handler.handler_type);

        if with_params && !handler.params.is_empty() {
            let indent = if last { "      " } else { "   │  " };
            let params: BTreeMap<_, _> = handler.params.iter().collect();
            for (key, value) in params {
                println!("   {}  {} = {}", indent, key, value);
            }
        }
    }

    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use config_loader::{ConfigFormat, ConfigLoader};

    const CONFIG: &str = r#"
[channel]
name = "orders"
capacity = 0

[[handlers]]
name = "out"
handler_type = "stream"
params = { target = "stdout", append_newline = "false" }
"#;

    #[test]
    fn test_params_hidden_by_default() {
        let bp = ConfigLoader::load_from_str(CONFIG, ConfigFormat::Toml).unwrap();
        let info = build_config_info(&bp, false);
        assert!(info.channel.unbounded);
        assert!(info.handlers[0].params.is_empty());

        let json = serde_json::to_value(&info).unwrap();
        assert!(json["handlers"][0].get("params").is_none());
        assert_eq!(json["poller"]["receive_timeout"], "1000ms");
    }

    #[test]
    fn test_params_sorted() {
        let bp = ConfigLoader::load_from_str(CONFIG, ConfigFormat::Toml).unwrap();
        let info = build_config_info(&bp, true);
        let keys: Vec<&String> = info.handlers[0].params.keys().collect();
        assert_eq!(keys, ["append_newline", "target"]);
    }
}
