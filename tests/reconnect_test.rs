//! Reconnect-and-retry behaviour of the evaluator when the cache fails.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use freshcache::freshness::notification_key;
use freshcache::{
    CacheStore, Connector, Freshcache, FreshnessError, FreshnessEvaluator, MemoryStore,
    NotificationRecord, Result, RetryConfig, Timestamp, UpdateEvent,
};

/// Store whose reads always fail.
struct DownStore;

#[async_trait]
impl CacheStore for DownStore {
    fn name(&self) -> &str {
        "down"
    }

    async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>> {
        Err(FreshnessError::CacheUnavailable("connection refused".into()))
    }
}

/// Connector that hands out a dead store for the first `outage` connects,
/// then the healthy one. Counts every connect.
struct FlakyConnector {
    outage: u32,
    connects: AtomicU32,
    healthy: Arc<MemoryStore>,
}

impl FlakyConnector {
    fn new(outage: u32, healthy: Arc<MemoryStore>) -> Self {
        Self {
            outage,
            connects: AtomicU32::new(0),
            healthy,
        }
    }

    fn connect_count(&self) -> u32 {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for FlakyConnector {
    fn name(&self) -> &str {
        "flaky"
    }

    async fn connect(&self) -> Result<Arc<dyn CacheStore>> {
        let n = self.connects.fetch_add(1, Ordering::SeqCst);
        if n < self.outage {
            Ok(Arc::new(DownStore))
        } else {
            Ok(self.healthy.clone())
        }
    }
}

/// Connector whose setup (discovery) always fails.
struct UnreachableDiscovery {
    connects: AtomicU32,
}

#[async_trait]
impl Connector for UnreachableDiscovery {
    fn name(&self) -> &str {
        "unreachable"
    }

    async fn connect(&self) -> Result<Arc<dyn CacheStore>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        Err(FreshnessError::ConnectionSetup("discovery timed out".into()))
    }
}

fn no_delay(max_retries: u32) -> RetryConfig {
    RetryConfig::new()
        .max_retries(max_retries)
        .initial_delay(Duration::ZERO)
}

fn build(connector: Arc<dyn Connector>, retry: RetryConfig) -> FreshnessEvaluator {
    Freshcache::builder()
        .connector(connector)
        .retry(retry)
        .build()
        .unwrap()
}

fn seeded_store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    let record = NotificationRecord::new()
        .with_update(UpdateEvent::new(Timestamp::from_unix_secs(100).unwrap(), "A"))
        .with_last_check("B", Timestamp::from_unix_secs(50).unwrap());
    store.insert(notification_key("p"), record.to_vec().unwrap());
    store
}

#[tokio::test]
async fn always_failing_cache_reconnects_exactly_up_to_ceiling() {
    // Every handle is dead.
    let connector = Arc::new(FlakyConnector::new(u32::MAX, Arc::new(MemoryStore::new())));
    let evaluator = build(connector.clone(), no_delay(5));
    evaluator.connections().initialize().await.unwrap();
    let initial_connects = connector.connect_count();

    let err = evaluator.refresh_my_view("p", "B").await.unwrap_err();

    match err {
        FreshnessError::CacheExhausted { attempts, .. } => assert_eq!(attempts, 6),
        other => panic!("expected CacheExhausted, got {other:?}"),
    }
    assert_eq!(connector.connect_count() - initial_connects, 5);
}

#[tokio::test]
async fn recovers_after_transient_outage() {
    let connector = Arc::new(FlakyConnector::new(3, seeded_store()));
    let evaluator = build(connector.clone(), no_delay(5));
    evaluator.connections().initialize().await.unwrap();

    // Handles 1..=3 are dead; the 4th connect succeeds.
    assert!(evaluator.refresh_my_view("p", "B").await.unwrap());
    assert_eq!(connector.connect_count(), 4);
}

#[tokio::test]
async fn first_request_connects_lazily() {
    let connector = Arc::new(FlakyConnector::new(0, seeded_store()));
    let evaluator = build(connector.clone(), no_delay(5));

    assert!(!evaluator.connections().is_connected().await);
    assert!(evaluator.refresh_my_view("p", "B").await.unwrap());
    assert_eq!(connector.connect_count(), 1);
}

#[tokio::test]
async fn retry_budget_is_per_call() {
    let connector = Arc::new(FlakyConnector::new(u32::MAX, Arc::new(MemoryStore::new())));
    let evaluator = build(connector.clone(), no_delay(2));

    for _ in 0..4 {
        let err = evaluator.refresh_my_view("p", "B").await.unwrap_err();
        assert!(matches!(
            err,
            FreshnessError::CacheExhausted { attempts: 3, .. }
        ));
    }
    // One unbudgeted first connect, then 2 reconnects per call.
    assert_eq!(connector.connect_count(), 1 + 4 * 2);
}

#[tokio::test]
async fn earlier_failures_do_not_disable_later_calls() {
    // Outage long enough to exhaust three calls, then healthy.
    let connector = Arc::new(FlakyConnector::new(4, seeded_store()));
    let evaluator = build(connector.clone(), no_delay(1));

    // 1st call: first connect #1 (dead) -> reconnect #2 (dead) -> exhausted.
    assert!(evaluator.refresh_my_view("p", "B").await.is_err());
    // 2nd call: reconnect #3 (dead) -> exhausted.
    assert!(evaluator.refresh_my_view("p", "B").await.is_err());
    // 3rd call: reconnect #4 (dead) -> exhausted.
    assert!(evaluator.refresh_my_view("p", "B").await.is_err());
    // 4th call: reconnect #5 (healthy) -> answer.
    assert!(evaluator.refresh_my_view("p", "B").await.unwrap());
    assert_eq!(connector.connect_count(), 5);
}

#[tokio::test]
async fn failing_discovery_escalates_to_exhausted() {
    let connector = Arc::new(UnreachableDiscovery {
        connects: AtomicU32::new(0),
    });
    let evaluator = build(connector.clone(), no_delay(5));

    let err = evaluator.refresh_my_view("p", "B").await.unwrap_err();
    assert!(matches!(err, FreshnessError::CacheExhausted { .. }));
    // First connect plus 5 reconnects.
    assert_eq!(connector.connects.load(Ordering::SeqCst), 6);
}

#[tokio::test]
async fn disabled_retry_fails_on_first_error() {
    let connector = Arc::new(FlakyConnector::new(u32::MAX, Arc::new(MemoryStore::new())));
    let evaluator = build(connector.clone(), RetryConfig::disabled());
    evaluator.connections().initialize().await.unwrap();

    let err = evaluator.refresh_my_view("p", "B").await.unwrap_err();
    assert!(matches!(
        err,
        FreshnessError::CacheExhausted { attempts: 1, .. }
    ));
    assert_eq!(connector.connect_count(), 1);
}

#[tokio::test]
async fn disabled_retry_still_makes_first_connect() {
    let connector = Arc::new(FlakyConnector::new(0, seeded_store()));
    let evaluator = build(connector.clone(), RetryConfig::disabled());

    for _ in 0..3 {
        assert!(evaluator.refresh_my_view("p", "B").await.unwrap());
    }
    assert_eq!(connector.connect_count(), 1);
}

#[tokio::test]
async fn failed_first_connect_is_retried_by_next_call() {
    // Setup fails once, then discovery comes back.
    struct SetupOutage {
        connects: AtomicU32,
        healthy: Arc<MemoryStore>,
    }

    #[async_trait]
    impl Connector for SetupOutage {
        fn name(&self) -> &str {
            "setup-outage"
        }

        async fn connect(&self) -> Result<Arc<dyn CacheStore>> {
            if self.connects.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(FreshnessError::ConnectionSetup("discovery timed out".into()));
            }
            Ok(self.healthy.clone())
        }
    }

    let connector = Arc::new(SetupOutage {
        connects: AtomicU32::new(0),
        healthy: seeded_store(),
    });
    let evaluator = build(connector.clone(), RetryConfig::disabled());

    let err = evaluator.refresh_my_view("p", "B").await.unwrap_err();
    assert!(matches!(err, FreshnessError::CacheExhausted { attempts: 1, .. }));
    assert!(evaluator.refresh_my_view("p", "B").await.unwrap());
    assert_eq!(connector.connects.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn first_connect_has_no_backoff() {
    let connector = Arc::new(FlakyConnector::new(0, seeded_store()));
    let evaluator = build(
        connector,
        RetryConfig::new().initial_delay(Duration::from_secs(10)),
    );

    let started = tokio::time::Instant::now();
    assert!(evaluator.refresh_my_view("p", "B").await.unwrap());
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[tokio::test(start_paused = true)]
async fn backoff_delays_between_reconnects() {
    let connector = Arc::new(FlakyConnector::new(u32::MAX, Arc::new(MemoryStore::new())));
    let retry = RetryConfig::new()
        .max_retries(3)
        .initial_delay(Duration::from_millis(100))
        .max_delay(Duration::from_secs(10));
    let evaluator = build(connector, retry);

    let started = tokio::time::Instant::now();
    assert!(evaluator.refresh_my_view("p", "B").await.is_err());
    // 100 + 200 + 400
    assert!(started.elapsed() >= Duration::from_millis(700));
}

#[tokio::test]
async fn concurrent_failures_may_rebuild_concurrently() {
    let connector = Arc::new(FlakyConnector::new(2, seeded_store()));
    let evaluator = Arc::new(build(connector.clone(), no_delay(5)));

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let evaluator = evaluator.clone();
        tasks.push(tokio::spawn(async move {
            evaluator.refresh_my_view("p", "B").await
        }));
    }
    for task in tasks {
        assert!(task.await.unwrap().unwrap());
    }
}
