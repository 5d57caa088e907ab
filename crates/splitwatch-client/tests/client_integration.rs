//! ---
//! sw_section: "05-networking-external-interfaces"
//! sw_subsection: "module"
//! sw_type: "source"
//! sw_scope: "code"
//! sw_description: "HTTP client for the timing record API."
//! sw_version: "v0.0.0-prealpha"
//! sw_owner: "tbd"
//! ---
use std::sync::Arc;
use std::time::{Duration, Instant};

use splitwatch_api::{spawn_api_server, ApiServer, ApiState};
use splitwatch_client::{ApiClient, ClientError, RetryPolicy};
use splitwatch_common::VersionInfo;
use splitwatch_store::{FallbackStore, NewTimingRecord, RecordStore, StoreError};

async fn daemon() -> (ApiServer, ApiClient) {
    let state = Arc::new(ApiState::new(
        Arc::new(FallbackStore::new()),
        VersionInfo::current(),
    ));
    let server = spawn_api_server(state, "127.0.0.1:0".parse().unwrap(), None).unwrap();
    let client = ApiClient::new(&format!("http://{}", server.addr())).unwrap();
    (server, client)
}

fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        base_delay: Duration::from_millis(20),
        max_delay: Duration::from_millis(20),
        ..RetryPolicy::default()
    }
}

#[tokio::test]
async fn typed_calls_round_trip() {
    let (server, client) = daemon().await;

    let created = client
        .create_record(&NewTimingRecord::new(2_500).with_title("Intervals").with_user(7))
        .await
        .unwrap();
    assert_eq!(created.id, 1);
    assert_eq!(created.user_id, Some(7));

    assert_eq!(client.list_records(Some(7)).await.unwrap(), vec![created.clone()]);
    assert!(client.list_records(Some(8)).await.unwrap().is_empty());
    assert_eq!(client.get_record(created.id).await.unwrap(), Some(created.clone()));
    assert_eq!(client.get_record(99).await.unwrap(), None);

    assert!(client.delete_record(created.id).await.unwrap());
    assert!(!client.delete_record(created.id).await.unwrap());

    let status = client.status().await.unwrap();
    assert_eq!(status["storeBackend"], "fallback");

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn api_errors_carry_status_and_details_without_retry() {
    let (server, client) = daemon().await;
    let client = client.with_retry(fast_retry());

    let err = client
        .create_record(&NewTimingRecord::new(-5))
        .await
        .unwrap_err();
    match &err {
        ClientError::Api {
            status,
            message,
            details,
            url,
        } => {
            assert_eq!(*status, 400);
            assert_eq!(message, "Invalid record data");
            assert!(url.ends_with("/api/stopwatch-records"));
            assert!(details.as_ref().unwrap()["details"]["duration"].is_array());
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(matches!(StoreError::from(err), StoreError::Validation(_)));

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn store_contract_validates_before_sending() {
    let (server, client) = daemon().await;
    let store: Arc<dyn RecordStore> = Arc::new(client);

    let err = store.create(NewTimingRecord::new(-1)).await.unwrap_err();
    assert!(matches!(err, StoreError::Validation(_)));
    let record = store.create(NewTimingRecord::new(1)).await.unwrap();
    assert_eq!(store.list(None).await.unwrap(), vec![record]);

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn unreachable_daemon_is_retried_then_reported() {
    // Bind and release a port so nothing is listening on it.
    let addr = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap();
    let client = ApiClient::new(&format!("http://{addr}"))
        .unwrap()
        .with_retry(fast_retry());

    let started = Instant::now();
    let err = client.list_records(None).await.unwrap_err();
    assert!(err.is_network());
    // Three retries for a query, 20 ms apart.
    assert!(started.elapsed() >= Duration::from_millis(60));

    let started = Instant::now();
    let err = client.delete_record(1).await.unwrap_err();
    assert!(err.is_network());
    // Two retries for a mutation.
    assert!(started.elapsed() >= Duration::from_millis(40));

    let store_err = StoreError::from(err);
    assert!(store_err.is_transport());
}
