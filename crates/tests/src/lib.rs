//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 合约快照测试
//! - 配置加载 -> 工作池 e2e 测试
//! - 关闭 / 取消语义验证

#[cfg(test)]
mod contract_tests {
    #[test]
    fn test_contracts_compile() {
        let _ = contracts::ConfigVersion::V1;
        let request = contracts::Request::new(0, "Request #0", "payload");
        assert_eq!(request.id(), 0);
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{ContractError, ErrorPolicy, Request, RequestProcessor, Response};
    use dispatcher::{
        start_dispatcher, DispatcherBuilder, DispatcherConfig, DispatcherError, EchoProcessor,
        WorkerOutcome,
    };
    use tokio::sync::mpsc;
    use tokio::time::{sleep, timeout};
    use tokio_util::sync::CancellationToken;

    /// Records the ids it processes, optionally sleeping per request
    struct RecordingProcessor {
        seen: Mutex<Vec<u64>>,
        active: AtomicUsize,
        peak: AtomicUsize,
        delay: Duration,
    }

    impl RecordingProcessor {
        fn new(delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                seen: Mutex::new(Vec::new()),
                active: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
                delay,
            })
        }

        fn seen(&self) -> Vec<u64> {
            self.seen.lock().unwrap().clone()
        }

        fn peak(&self) -> usize {
            self.peak.load(Ordering::SeqCst)
        }
    }

    impl RequestProcessor for RecordingProcessor {
        fn name(&self) -> &str {
            "recording"
        }

        async fn process(&self, request: &Request) -> Result<Response, ContractError> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            if !self.delay.is_zero() {
                sleep(self.delay).await;
            }
            self.seen.lock().unwrap().push(request.id());
            self.active.fetch_sub(1, Ordering::SeqCst);
            Ok(Response::new(request.content()).with_header(request.header()))
        }
    }

    fn sample(id: u64) -> Request {
        Request::new(
            id,
            format!("Request #{id}"),
            format!("Content: this is the content for Request #{id})"),
        )
    }

    /// End-to-end test: ids 0..9 over three workers
    ///
    /// 验证：
    /// 1. 每个请求恰好被处理一次
    /// 2. 并发度不超过池宽度
    #[tokio::test]
    async fn test_e2e_width_three_processes_each_request_once() {
        let processor = RecordingProcessor::new(Duration::from_millis(5));
        let handle = DispatcherBuilder::with_shared_processor(
            DispatcherConfig::new(3),
            Arc::clone(&processor),
        )
        .build()
        .unwrap()
        .spawn();

        for id in 0..10 {
            handle.submit(sample(id)).await.unwrap();
        }

        let report = handle.shutdown().await;

        let seen = processor.seen();
        assert_eq!(seen.len(), 10);
        let distinct: HashSet<u64> = seen.iter().copied().collect();
        assert_eq!(distinct, (0..10).collect::<HashSet<u64>>());
        assert!(processor.peak() <= 3);
        assert!(report.is_clean());
        assert_eq!(report.workers.len(), 3);
        assert_eq!(
            report.workers.iter().map(|w| w.processed).sum::<u64>(),
            10
        );
    }

    #[tokio::test]
    async fn test_e2e_single_worker_preserves_order() {
        let processor = RecordingProcessor::new(Duration::ZERO);
        let handle = DispatcherBuilder::with_shared_processor(
            DispatcherConfig::new(1).with_queue_capacity(4),
            Arc::clone(&processor),
        )
        .build()
        .unwrap()
        .spawn();

        for id in 0..10 {
            handle.submit(sample(id)).await.unwrap();
        }
        handle.shutdown().await;

        assert_eq!(processor.seen(), (0..10).collect::<Vec<u64>>());
    }

    #[tokio::test]
    async fn test_zero_pool_width_is_rejected() {
        let result = DispatcherBuilder::new(DispatcherConfig::new(0), EchoProcessor::new("echo"))
            .build();
        assert!(matches!(
            result,
            Err(DispatcherError::Configuration { .. })
        ));
    }

    #[tokio::test]
    async fn test_submit_after_shutdown_reports_request_id() {
        let handle = DispatcherBuilder::new(DispatcherConfig::new(2), EchoProcessor::new("echo"))
            .build()
            .unwrap()
            .spawn();
        let submitter = handle.submitter();

        handle.submit(sample(0)).await.unwrap();
        let report = handle.shutdown().await;
        assert_eq!(report.metrics.processed, 1);

        let err = submitter.submit(sample(99)).await.unwrap_err();
        assert!(matches!(err, DispatcherError::QueueClosed { request_id: 99 }));
        assert!(submitter.is_closed());
    }

    /// Concurrent producers sharing one pool
    #[tokio::test]
    async fn test_concurrent_producers_share_the_pool() {
        let processor = RecordingProcessor::new(Duration::from_millis(1));
        let handle = DispatcherBuilder::with_shared_processor(
            DispatcherConfig::new(4).with_queue_capacity(2),
            Arc::clone(&processor),
        )
        .build()
        .unwrap()
        .spawn();

        let producers = (0..3u64).map(|p| {
            let submitter = handle.submitter();
            tokio::spawn(async move {
                for i in 0..20u64 {
                    submitter.submit(sample(p * 100 + i)).await.unwrap();
                }
            })
        });
        for joined in futures::future::join_all(producers).await {
            joined.unwrap();
        }

        handle.wait_idle(Duration::from_secs(5)).await.unwrap();
        assert_eq!(processor.seen().len(), 60);

        let report = handle.shutdown().await;
        assert_eq!(report.metrics.submitted, 60);
        assert_eq!(report.metrics.processed, 60);
        assert_eq!(report.abandoned, 0);
    }

    #[tokio::test]
    async fn test_abort_accounts_for_every_request() {
        let processor = RecordingProcessor::new(Duration::from_millis(20));
        let handle = DispatcherBuilder::with_shared_processor(
            DispatcherConfig::new(2).with_queue_capacity(16),
            Arc::clone(&processor),
        )
        .build()
        .unwrap()
        .spawn();

        for id in 0..16 {
            handle.try_submit(sample(id)).unwrap();
        }
        sleep(Duration::from_millis(30)).await;

        let report = handle.abort().await;

        let completed = report.metrics.processed + report.metrics.failed;
        assert_eq!(completed + report.abandoned, 16);
        assert!(report.abandoned > 0);
        assert!(report
            .workers
            .iter()
            .all(|w| w.outcome == WorkerOutcome::Cancelled));
    }

    /// An externally cancelled pool refuses work instead of queueing it
    ///
    /// 验证：
    /// 1. 被阻塞的 submit 在取消后立即返回 QueueClosed
    /// 2. 取消后的 submit 不会被接受
    /// 3. 已接受的请求全部有去向
    #[tokio::test]
    async fn test_external_cancellation_closes_queue() {
        let token = CancellationToken::new();
        let processor = RecordingProcessor::new(Duration::from_millis(200));
        let handle = DispatcherBuilder::with_shared_processor(
            DispatcherConfig::new(1),
            Arc::clone(&processor),
        )
        .cancellation_token(token.clone())
        .build()
        .unwrap()
        .spawn();

        // Request 0 is in flight, request 1 fills the single slot
        handle.submit(sample(0)).await.unwrap();
        sleep(Duration::from_millis(20)).await;
        handle.submit(sample(1)).await.unwrap();

        let submitter = handle.submitter();
        let blocked = tokio::spawn(async move { submitter.submit(sample(2)).await });
        sleep(Duration::from_millis(20)).await;
        assert!(!blocked.is_finished());

        token.cancel();

        let result = timeout(Duration::from_secs(1), blocked)
            .await
            .expect("blocked submit must wake up on cancellation")
            .unwrap();
        assert!(matches!(
            result,
            Err(DispatcherError::QueueClosed { request_id: 2 })
        ));

        assert!(handle.is_closed());
        let err = timeout(Duration::from_secs(1), handle.submit(sample(3)))
            .await
            .expect("submit after cancellation must not block")
            .unwrap_err();
        assert!(matches!(err, DispatcherError::QueueClosed { request_id: 3 }));

        let report = handle.shutdown().await;
        assert_eq!(report.metrics.submitted, 2);
        assert_eq!(report.metrics.rejected, 2);
        assert_eq!(report.metrics.processed, 1);
        assert_eq!(report.abandoned, 1);
        assert_eq!(processor.seen(), vec![0]);
        assert_eq!(report.workers[0].outcome, WorkerOutcome::Cancelled);
    }

    #[tokio::test]
    async fn test_dead_letter_end_to_end() {
        let (tx, mut rx) = mpsc::channel(16);
        let processor = EchoProcessor::new("echo").with_max_payload_bytes(16);
        let config = DispatcherConfig::new(2).with_error_policy(ErrorPolicy::DeadLetter);
        let handle = DispatcherBuilder::new(config, processor)
            .dead_letter(tx)
            .build()
            .unwrap()
            .spawn();

        handle.submit(Request::new(1, "Request #1", "short")).await.unwrap();
        handle.submit(sample(2)).await.unwrap();
        let report = handle.shutdown().await;

        assert_eq!(report.metrics.processed, 1);
        assert_eq!(report.metrics.failed, 1);
        assert_eq!(report.metrics.dead_lettered, 1);

        let letter = rx.recv().await.unwrap();
        assert_eq!(letter.request.id(), 2);
        assert!(matches!(letter.error, ContractError::PayloadTooLarge { .. }));
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_config_file_to_running_pool() {
        let toml = r#"
            [dispatcher]
            pool_width = 2
            queue_capacity = 4

            [processor]
            transform = "uppercase"
        "#;
        let config = ConfigLoader::load_from_str(toml, ConfigFormat::Toml).unwrap();

        let processor = EchoProcessor::from_settings("echo", &config.processor);
        let handle = start_dispatcher(&config.dispatcher, processor).unwrap();
        assert_eq!(handle.pool_width(), 2);

        for id in 0..5 {
            handle.submit(sample(id)).await.unwrap();
        }
        let report = handle.shutdown().await;
        assert_eq!(report.metrics.processed, 5);
        assert!(report.is_clean());
    }

    #[tokio::test]
    async fn test_invalid_config_never_reaches_dispatcher() {
        let json = r#"{ "dispatcher": { "pool_width": 0 } }"#;
        let err = ConfigLoader::load_from_str(json, ConfigFormat::Json).unwrap_err();
        assert!(err.to_string().contains("pool_width"));
    }

    #[tokio::test]
    async fn test_shutdown_waits_for_backlog() {
        let processor = RecordingProcessor::new(Duration::from_millis(10));
        let config = DispatcherConfig::new(2)
            .with_queue_capacity(8)
            .with_drain_timeout(Duration::from_secs(5));
        let handle = DispatcherBuilder::with_shared_processor(config, Arc::clone(&processor))
            .build()
            .unwrap()
            .spawn();

        for id in 0..8 {
            handle.try_submit(sample(id)).unwrap();
        }
        let report = handle.shutdown().await;

        assert_eq!(processor.seen().len(), 8);
        assert_eq!(report.abandoned, 0);
        assert!(report
            .workers
            .iter()
            .all(|w| w.outcome == WorkerOutcome::Drained));
    }

    #[tokio::test]
    async fn test_metrics_recording_without_exporter() {
        let handle = DispatcherBuilder::new(DispatcherConfig::new(1), EchoProcessor::new("echo"))
            .build()
            .unwrap()
            .spawn();
        handle.submit(sample(0)).await.unwrap();
        let report = handle.shutdown().await;

        // No recorder installed: recording is a no-op and must not panic
        observability::record_dispatch_report(&report);
        observability::record_request_produced();
    }
}
