//! # Observability
//!
//! 轮询分发管道的日志与指标。
//!
//! - `init_with_config`: 安装 tracing 订阅器，日志写到 stderr，stdout 留给 stream 处理器
//! - `init_metrics_only`: 安装 Prometheus 导出器
//! - `metrics`: PollOutcome 指标记录与聚合
//!
//! ```ignore
//! use observability::{LogFormat, ObservabilityConfig};
//!
//! observability::init_with_config(ObservabilityConfig::from_verbosity(
//!     false,
//!     1,
//!     LogFormat::Compact,
//! ))?;
//! observability::init_metrics_only(9000)?;
//!
//! let outcome = poller.run().await?;
//! observability::record_poll_cycle("orders", &outcome, elapsed_ms);
//! ```

pub mod metrics;

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

pub use crate::metrics::{
    record_channel_depth, record_handler_failure, record_message_dispatched, record_poll_cycle,
    MetricsSummary, PollStatsAggregator, RunningStats, StatsSummary,
};

/// 日志配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservabilityConfig {
    pub log_format: LogFormat,
    /// `RUST_LOG` 未设置时使用的过滤指令
    pub default_log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Json,
            default_log_level: "info".to_string(),
        }
    }
}

impl ObservabilityConfig {
    /// 由 `-q` / `-v` 次数推出默认级别
    ///
    /// `quiet` 优先；0 次 `-v` 为 info，1 次为 debug，更多为 trace。
    pub fn from_verbosity(quiet: bool, verbose: u8, log_format: LogFormat) -> Self {
        let level = match (quiet, verbose) {
            (true, _) => "warn",
            (false, 0) => "info",
            (false, 1) => "debug",
            (false, _) => "trace",
        };
        Self {
            log_format,
            default_log_level: level.to_string(),
        }
    }

    fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&self.default_log_level))
    }
}

/// 日志格式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// JSON 结构化日志，带线程与源码位置
    #[default]
    Json,
    Pretty,
    /// 单行
    Compact,
}

impl LogFormat {
    fn layer(self) -> Box<dyn Layer<Registry> + Send + Sync> {
        match self {
            LogFormat::Json => fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_names(true)
                .with_file(true)
                .with_line_number(true)
                .boxed(),
            LogFormat::Pretty => fmt::layer().pretty().with_writer(std::io::stderr).boxed(),
            LogFormat::Compact => fmt::layer().compact().with_writer(std::io::stderr).boxed(),
        }
    }
}

/// 安装全局 tracing 订阅器，只能调用一次
pub fn init_with_config(config: ObservabilityConfig) -> Result<()> {
    tracing_subscriber::registry()
        .with(config.log_format.layer())
        .with(config.env_filter())
        .try_init()
        .context("Failed to initialize tracing subscriber")?;

    tracing::debug!(
        log_format = ?config.log_format,
        default_log_level = %config.default_log_level,
        "Logging initialized"
    );
    Ok(())
}

/// 在 `0.0.0.0:port` 上暴露 Prometheus 指标
///
/// 不触碰 tracing，由 `run` 命令在管道启动时按需调用。
pub fn init_metrics_only(port: u16) -> Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], port))
        .install()
        .with_context(|| format!("Failed to install Prometheus recorder on port {port}"))?;

    tracing::info!(port, "Prometheus metrics endpoint initialized");
    Ok(())
}
