//! 轮询分发指标收集模块
//!
//! 基于 PollOutcome 收集和统计轮询分发器的运行指标。

use std::collections::HashMap;

use contracts::PollOutcome;
use metrics::{counter, gauge, histogram};

/// 从 PollOutcome 记录指标
///
/// 每个轮询周期结束后调用。
///
/// # Example
///
/// ```ignore
/// use observability::metrics::record_poll_cycle;
///
/// let started = Instant::now();
/// let outcome = poller.run().await?;
/// record_poll_cycle("input", &outcome, started.elapsed().as_secs_f64() * 1000.0);
/// ```
pub fn record_poll_cycle(channel: &str, outcome: &PollOutcome, duration_ms: f64) {
    let channel = channel.to_string();

    counter!("courier_poll_cycles_total", "channel" => channel.clone()).increment(1);
    if outcome.is_empty() {
        counter!("courier_poll_cycles_empty_total", "channel" => channel.clone()).increment(1);
    }

    // 每轮消息数
    histogram!("courier_poll_batch_size", "channel" => channel.clone())
        .record(outcome.received as f64);
    histogram!("courier_poll_cycle_duration_ms", "channel" => channel.clone())
        .record(duration_ms);

    counter!("courier_messages_received_total", "channel" => channel.clone())
        .increment(outcome.received as u64);

    // 投递结果
    if outcome.delivered > 0 {
        counter!("courier_messages_delivered_total", "channel" => channel.clone())
            .increment(outcome.delivered as u64);
    }
    if outcome.undelivered > 0 {
        counter!("courier_messages_undelivered_total", "channel" => channel.clone())
            .increment(outcome.undelivered as u64);
    }
    if outcome.failed > 0 {
        counter!("courier_messages_failed_total", "channel" => channel)
            .increment(outcome.failed as u64);
    }
}

/// 记录单条消息分发结果
pub fn record_message_dispatched(handler: &str, success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "courier_messages_dispatched_total",
        "handler" => handler.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// 记录 handler 失败
pub fn record_handler_failure(handler: &str, kind: &str) {
    counter!(
        "courier_handler_failures_total",
        "handler" => handler.to_string(),
        "kind" => kind.to_string()
    )
    .increment(1);
}

/// 记录通道深度
pub fn record_channel_depth(channel: &str, depth: usize) {
    gauge!(
        "courier_channel_depth",
        "channel" => channel.to_string()
    )
    .set(depth as f64);
}

/// 轮询指标聚合器
///
/// 在内存中聚合指标，便于统计和输出摘要。
#[derive(Debug, Clone, Default)]
pub struct PollStatsAggregator {
    /// 总轮询周期数
    pub total_cycles: u64,

    /// 未取到消息的周期数
    pub empty_cycles: u64,

    /// 接收消息总数
    pub total_received: u64,

    /// 成功投递总数
    pub total_delivered: u64,

    /// 无订阅者丢弃总数
    pub total_undelivered: u64,

    /// 投递失败总数
    pub total_failed: u64,

    /// 非空周期的消息数统计
    pub batch_stats: RunningStats,

    /// 周期耗时统计 (毫秒)
    pub cycle_stats: RunningStats,

    /// 通道深度统计
    pub depth_stats: RunningStats,

    /// 各 handler 失败次数
    pub handler_failures: HashMap<String, u64>,
}

impl PollStatsAggregator {
    /// 创建新的聚合器
    pub fn new() -> Self {
        Self::default()
    }

    /// 更新聚合统计
    pub fn update(&mut self, outcome: &PollOutcome, duration_ms: f64) {
        self.total_cycles += 1;
        self.total_received += outcome.received as u64;
        self.total_delivered += outcome.delivered as u64;
        self.total_undelivered += outcome.undelivered as u64;
        self.total_failed += outcome.failed as u64;

        if outcome.is_empty() {
            self.empty_cycles += 1;
        } else {
            self.batch_stats.push(outcome.received as f64);
        }
        self.cycle_stats.push(duration_ms);
    }

    /// 记录通道深度采样
    pub fn record_depth(&mut self, depth: usize) {
        self.depth_stats.push(depth as f64);
    }

    /// 记录 handler 失败
    pub fn record_handler_failure(&mut self, handler: &str) {
        *self.handler_failures.entry(handler.to_string()).or_insert(0) += 1;
    }

    /// 生成摘要报告
    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            total_cycles: self.total_cycles,
            empty_cycles: self.empty_cycles,
            total_received: self.total_received,
            total_delivered: self.total_delivered,
            total_undelivered: self.total_undelivered,
            total_failed: self.total_failed,
            failure_rate: percent(self.total_failed, self.total_received),
            empty_rate: percent(self.empty_cycles, self.total_cycles),
            batch_size: StatsSummary::from(&self.batch_stats),
            cycle_ms: StatsSummary::from(&self.cycle_stats),
            channel_depth: StatsSummary::from(&self.depth_stats),
            handler_failures: self.handler_failures.clone(),
        }
    }

    /// 重置统计
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

fn percent(part: u64, total: u64) -> f64 {
    if total > 0 {
        part as f64 / total as f64 * 100.0
    } else {
        0.0
    }
}

/// 指标摘要
#[derive(Debug, Clone, Default)]
pub struct MetricsSummary {
    pub total_cycles: u64,
    pub empty_cycles: u64,
    pub total_received: u64,
    pub total_delivered: u64,
    pub total_undelivered: u64,
    pub total_failed: u64,
    pub failure_rate: f64,
    pub empty_rate: f64,
    pub batch_size: StatsSummary,
    pub cycle_ms: StatsSummary,
    pub channel_depth: StatsSummary,
    pub handler_failures: HashMap<String, u64>,
}

impl std::fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Poll Metrics Summary ===")?;
        writeln!(
            f,
            "Poll cycles: {} ({} empty, {:.2}%)",
            self.total_cycles, self.empty_cycles, self.empty_rate
        )?;
        writeln!(f, "Messages received: {}", self.total_received)?;
        writeln!(f, "Messages delivered: {}", self.total_delivered)?;
        writeln!(f, "Messages undelivered: {}", self.total_undelivered)?;
        writeln!(
            f,
            "Messages failed: {} ({:.2}%)",
            self.total_failed, self.failure_rate
        )?;
        writeln!(f, "Batch size: {}", self.batch_size)?;
        writeln!(f, "Cycle time (ms): {}", self.cycle_ms)?;
        writeln!(f, "Channel depth: {}", self.channel_depth)?;

        if !self.handler_failures.is_empty() {
            writeln!(f, "Handler failures:")?;
            let mut failures: Vec<_> = self.handler_failures.iter().collect();
            failures.sort();
            for (handler, count) in failures {
                writeln!(f, "  {}: {}", handler, count)?;
            }
        }

        Ok(())
    }
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计计算器 (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// 添加新值
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    /// 样本数量
    pub fn count(&self) -> u64 {
        self.count
    }

    /// 均值
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    /// 标准差
    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(received: usize, delivered: usize, failed: usize) -> PollOutcome {
        PollOutcome {
            received,
            delivered,
            undelivered: received - delivered - failed,
            failed,
        }
    }

    #[test]
    fn test_running_stats() {
        let mut stats = RunningStats::default();
        for value in [1.0, 2.0, 3.0, 4.0, 5.0] {
            stats.push(value);
        }

        assert_eq!(stats.count(), 5);
        assert!((stats.mean() - 3.0).abs() < 1e-10);
        assert!((stats.min() - 1.0).abs() < 1e-10);
        assert!((stats.max() - 5.0).abs() < 1e-10);
        assert!((stats.variance() - 2.5).abs() < 1e-10);
    }

    #[test]
    fn test_aggregator_update() {
        let mut aggregator = PollStatsAggregator::new();

        aggregator.update(&outcome(4, 3, 1), 2.0);
        aggregator.update(&PollOutcome::default(), 1.0);
        aggregator.update(&outcome(2, 1, 0), 3.0);
        aggregator.record_handler_failure("socket");
        aggregator.record_depth(7);

        assert_eq!(aggregator.total_cycles, 3);
        assert_eq!(aggregator.empty_cycles, 1);
        assert_eq!(aggregator.total_received, 6);
        assert_eq!(aggregator.total_delivered, 4);
        assert_eq!(aggregator.total_undelivered, 1);
        assert_eq!(aggregator.total_failed, 1);
        assert_eq!(aggregator.batch_stats.count(), 2);
        assert_eq!(aggregator.handler_failures.get("socket"), Some(&1));

        let summary = aggregator.summary();
        assert!((summary.batch_size.mean - 3.0).abs() < 1e-10);
        assert!((summary.empty_rate - 100.0 / 3.0).abs() < 1e-10);
    }

    #[test]
    fn test_summary_display() {
        let summary = MetricsSummary {
            total_cycles: 100,
            empty_cycles: 40,
            total_received: 200,
            total_delivered: 190,
            total_undelivered: 0,
            total_failed: 10,
            failure_rate: 5.0,
            empty_rate: 40.0,
            batch_size: StatsSummary {
                count: 60,
                min: 1.0,
                max: 10.0,
                mean: 3.3,
                std_dev: 1.5,
            },
            cycle_ms: StatsSummary::default(),
            channel_depth: StatsSummary::default(),
            handler_failures: HashMap::from([("socket".to_string(), 10)]),
        };

        let output = format!("{}", summary);
        assert!(output.contains("Poll cycles: 100"));
        assert!(output.contains("5.00%"));
        assert!(output.contains("socket: 10"));
        assert!(output.contains("Cycle time (ms): N/A"));
    }

    #[test]
    fn test_record_without_recorder() {
        // No global recorder installed: recording must be a no-op
        record_poll_cycle("input", &outcome(1, 1, 0), 0.5);
        record_message_dispatched("log", true);
        record_handler_failure("log", "io");
        record_channel_depth("input", 3);
    }
}
