//! ---
//! sw_section: "03-persistence-logging"
//! sw_subsection: "module"
//! sw_type: "source"
//! sw_scope: "code"
//! sw_description: "Timing record persistence abstractions and storage bindings."
//! sw_version: "v0.0.0-prealpha"
//! sw_owner: "tbd"
//! ---
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use splitwatch_common::StoreConfig;
use splitwatch_metrics::new_registry;
use splitwatch_store::{
    DatabaseUrl, FallbackReason, FallbackStore, NewTimingRecord, Operation, PrimaryStore,
    RecordStore, RouterSettings, SharedStore, StoreContext, StoreError, StoreHealth,
    StoreMetrics, StoreRouter, FALLBACK_ID_BASE,
};

fn unreachable_config(dir: &tempfile::TempDir) -> StoreConfig {
    // A regular file where the database directory should be makes every
    // connect attempt fail with a transport error.
    let blocker = dir.path().join("not-a-directory");
    std::fs::write(&blocker, b"occupied").unwrap();
    StoreConfig {
        database_url: Some(format!("sqlite://{}", blocker.join("records.db").display())),
        database_url_env: "SPLITWATCH_TEST_UNSET_DATABASE_URL".into(),
        connect_retry_initial: Duration::from_millis(1),
        connect_retry_max: Duration::from_millis(2),
        connect_attempts: 2,
        ..StoreConfig::default()
    }
}

#[tokio::test]
async fn unreachable_primary_serves_from_fallback_and_forgets_on_restart() {
    let dir = tempfile::tempdir().unwrap();
    let config = unreachable_config(&dir);
    let metrics = StoreMetrics::new(new_registry()).unwrap();

    let context = StoreContext::start(&config, Some(metrics.clone())).unwrap();
    context.wait_for_probe().await;
    assert_eq!(context.router().health(), StoreHealth::Absent);

    let store = context.store();
    let created = store
        .create(NewTimingRecord::new(65_000).with_title("00:01:05.00"))
        .await
        .unwrap();
    assert_eq!(store.list(None).await.unwrap(), vec![created.clone()]);
    assert_eq!(store.get(created.id).await.unwrap(), Some(created));
    assert!(metrics.fallbacks(Operation::Create, FallbackReason::Absent) >= 1);
    context.shutdown().await;
    drop(context);

    // Simulated restart: a new context has an empty fallback.
    let restarted = StoreContext::start(&config, None).unwrap();
    restarted.wait_for_probe().await;
    assert!(restarted.store().list(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn negative_duration_rejected_by_every_store() {
    let primary: SharedStore = Arc::new(PrimaryStore::open(DatabaseUrl::Memory).unwrap());
    let fallback: SharedStore = Arc::new(FallbackStore::new());
    let router = StoreRouter::new(RouterSettings::default(), None);
    router.attach_primary(primary.clone());
    let router: SharedStore = Arc::new(router);

    for store in [&primary, &fallback, &router] {
        let err = store.create(NewTimingRecord::new(-1)).await.unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)), "{}", store.backend());
        assert!(store.list(None).await.unwrap().is_empty());
    }
}

#[tokio::test]
async fn deleting_missing_records_is_not_an_error() {
    let primary: SharedStore = Arc::new(PrimaryStore::open(DatabaseUrl::Memory).unwrap());
    let fallback: SharedStore = Arc::new(FallbackStore::new());
    for store in [primary, fallback] {
        assert!(!store.delete(12_345).await.unwrap());
        assert!(store.get(12_345).await.unwrap().is_none());
    }
}

async fn assert_unique_increasing_ids(store: SharedStore) {
    let inserts = (0..32).map(|n| {
        let store = store.clone();
        tokio::spawn(async move { store.create(NewTimingRecord::new(n * 10)).await })
    });
    let created: Vec<_> = join_all(inserts)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap())
        .collect();

    let ids: HashSet<i64> = created.iter().map(|record| record.id).collect();
    assert_eq!(ids.len(), created.len(), "{} handed out duplicate ids", store.backend());

    // Listing order is insertion order, so ids must be strictly increasing.
    let listed = store.list(None).await.unwrap();
    assert_eq!(listed.len(), created.len());
    assert!(listed.windows(2).all(|pair| pair[0].id < pair[1].id));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_creates_receive_unique_ids() {
    assert_unique_increasing_ids(Arc::new(FallbackStore::new())).await;
    assert_unique_increasing_ids(Arc::new(PrimaryStore::open(DatabaseUrl::Memory).unwrap())).await;
    assert_unique_increasing_ids(Arc::new(StoreRouter::new(RouterSettings::default(), None)))
        .await;
}

#[tokio::test]
async fn primary_lost_mid_session_degrades_to_fallback() {
    let dir = tempfile::tempdir().unwrap();
    let primary = PrimaryStore::open(DatabaseUrl::File(dir.path().join("records.db"))).unwrap();
    let router = StoreRouter::new(RouterSettings::default(), None);
    router.attach_primary(Arc::new(primary.clone()));

    let durable = router.create(NewTimingRecord::new(1_000)).await.unwrap();
    assert_eq!(router.health(), StoreHealth::Healthy);

    primary.close();
    let volatile = router.create(NewTimingRecord::new(2_000)).await.unwrap();
    assert_eq!(router.health(), StoreHealth::Unhealthy);
    assert_eq!(router.fallback().len(), 1);
    assert_eq!(volatile.id, FALLBACK_ID_BASE);
    assert_ne!(volatile.id, durable.id);

    let listed = router.list(None).await.unwrap();
    assert_eq!(listed, vec![volatile.clone()]);

    let reopened = PrimaryStore::open(DatabaseUrl::File(dir.path().join("records.db"))).unwrap();
    assert_eq!(reopened.list(None).await.unwrap(), vec![durable.clone()]);

    router.detach_primary();
    router.attach_primary(Arc::new(reopened.clone()));
    assert_eq!(
        router.list(None).await.unwrap(),
        vec![durable.clone(), volatile.clone()]
    );
    assert!(router.delete(volatile.id).await.unwrap());
    assert_eq!(reopened.get(durable.id).await.unwrap(), Some(durable));
}
