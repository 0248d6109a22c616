//! 工作池指标收集模块
//!
//! 基于 DispatchReport 与生产者提交耗时收集和统计运行指标。

use dispatcher::{DispatchReport, WorkerOutcome};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};

/// 注册指标描述 (安装 Prometheus recorder 后调用)
pub fn describe_metrics() {
    describe_counter!(
        "workpool_requests_submitted_total",
        "Requests accepted by the queue"
    );
    describe_counter!(
        "workpool_requests_rejected_total",
        "Submissions refused because the queue was closed or full"
    );
    describe_counter!(
        "workpool_requests_processed_total",
        "Requests processed successfully, per worker"
    );
    describe_counter!(
        "workpool_requests_failed_total",
        "Requests whose processing failed, per worker"
    );
    describe_counter!(
        "workpool_requests_dead_lettered_total",
        "Failed requests forwarded to the dead-letter channel"
    );
    describe_counter!(
        "workpool_requests_abandoned_total",
        "Requests left in the queue when workers were cancelled"
    );
    describe_counter!(
        "workpool_requests_produced_total",
        "Requests created by the sample producer"
    );
    describe_gauge!("workpool_queue_depth", "Requests waiting in the queue");
    describe_gauge!("workpool_requests_in_flight", "Requests being processed");
    describe_histogram!(
        "workpool_processing_duration_ms",
        Unit::Milliseconds,
        "Time spent in the processor per request"
    );
    describe_histogram!(
        "workpool_submit_wait_ms",
        Unit::Milliseconds,
        "Time a submission waited for queue space"
    );
}

/// 从 DispatchReport 记录指标
///
/// 在工作池关闭后调用一次。
///
/// # Example
///
/// ```ignore
/// use observability::metrics::record_dispatch_report;
///
/// let report = handle.shutdown().await;
/// record_dispatch_report(&report);
/// ```
pub fn record_dispatch_report(report: &DispatchReport) {
    gauge!("workpool_pool_width").set(report.workers.len() as f64);
    gauge!("workpool_requests_abandoned_last_shutdown").set(report.abandoned as f64);
    histogram!("workpool_shutdown_duration_ms").record(report.elapsed.as_secs_f64() * 1000.0);

    for worker in &report.workers {
        let outcome = match worker.outcome {
            WorkerOutcome::Drained => "drained",
            WorkerOutcome::Cancelled => "cancelled",
            WorkerOutcome::Panicked(_) => "panicked",
            WorkerOutcome::TimedOut => "timed_out",
        };
        counter!("workpool_worker_exits_total", "outcome" => outcome).increment(1);
        gauge!(
            "workpool_worker_processed",
            "worker" => worker.worker_id.to_string()
        )
        .set(worker.processed as f64);
    }
}

/// 记录生产者生成的请求
pub fn record_request_produced() {
    counter!("workpool_requests_produced_total").increment(1);
}

/// 记录一次提交的等待时间 (背压)
pub fn record_submit_wait_ms(wait_ms: f64) {
    histogram!("workpool_submit_wait_ms").record(wait_ms);
}

/// 提交指标聚合器
///
/// 在内存中聚合生产者侧指标，便于统计和输出摘要。
#[derive(Debug, Clone, Default)]
pub struct SubmitMetricsAggregator {
    /// 提交成功数
    pub total_submitted: u64,

    /// 被拒绝的提交数 (队列已关闭)
    pub total_rejected: u64,

    /// 提交等待时间统计 (毫秒)
    pub wait_stats: RunningStats,
}

impl SubmitMetricsAggregator {
    /// 创建新的聚合器
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录一次成功提交
    pub fn record_submitted(&mut self, wait_ms: f64) {
        self.total_submitted += 1;
        self.wait_stats.push(wait_ms);
        record_submit_wait_ms(wait_ms);
    }

    /// 记录一次被拒绝的提交
    pub fn record_rejected(&mut self) {
        self.total_rejected += 1;
    }

    /// 生成摘要报告
    pub fn summary(&self) -> MetricsSummary {
        let attempts = self.total_submitted + self.total_rejected;
        MetricsSummary {
            total_submitted: self.total_submitted,
            total_rejected: self.total_rejected,
            reject_rate: if attempts > 0 {
                self.total_rejected as f64 / attempts as f64 * 100.0
            } else {
                0.0
            },
            submit_wait_ms: StatsSummary::from(&self.wait_stats),
        }
    }

    /// 重置统计
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// 指标摘要
#[derive(Debug, Clone, Default)]
pub struct MetricsSummary {
    pub total_submitted: u64,
    pub total_rejected: u64,
    pub reject_rate: f64,
    pub submit_wait_ms: StatsSummary,
}

impl std::fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Submit Metrics Summary ===")?;
        writeln!(f, "Submitted: {}", self.total_submitted)?;
        writeln!(
            f,
            "Rejected: {} ({:.2}%)",
            self.total_rejected, self.reject_rate
        )?;
        writeln!(f, "Submit wait (ms): {}", self.submit_wait_ms)?;
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

    /// 最小值
    pub fn min(&self) -> f64 {
        self.min
    }

    /// 最大值
    pub fn max(&self) -> f64 {
        self.max
    }
}
