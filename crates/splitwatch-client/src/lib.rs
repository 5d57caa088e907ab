//! ---
//! sw_section: "05-networking-external-interfaces"
//! sw_subsection: "module"
//! sw_type: "source"
//! sw_scope: "code"
//! sw_description: "HTTP client for the timing record API."
//! sw_version: "v0.0.0-prealpha"
//! sw_owner: "tbd"
//! ---
//! Typed client for the splitwatch record API.
//!
//! [`ApiClient`] implements [`RecordStore`], so anything written against the
//! store contract (the stopwatch save action included) can run against a
//! remote daemon.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use splitwatch_store::{NewTimingRecord, RecordStore, StoreError, TimingRecord};
use tracing::{error, warn};
use url::Url;

mod error;
mod retry;

pub use error::ClientError;
pub use retry::{RequestKind, RetryPolicy};

/// Result alias for client calls.
pub type Result<T> = std::result::Result<T, ClientError>;

const RECORDS_PATH: &str = "api/stopwatch-records";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP client for `/api/stopwatch-records`.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base: Url,
    retry: RetryPolicy,
}

impl ApiClient {
    /// Client for the daemon at `base` (e.g. `http://127.0.0.1:5000`).
    pub fn new(base: &str) -> Result<Self> {
        let mut base = Url::parse(base)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|err| ClientError::Builder(err.to_string()))?;
        Ok(Self {
            http,
            base,
            retry: RetryPolicy::default(),
        })
    }

    /// Replace the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Base URL requests are resolved against.
    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// All records, or only those of `user_id`.
    pub async fn list_records(&self, user_id: Option<i64>) -> Result<Vec<TimingRecord>> {
        let mut url = self.base.join(RECORDS_PATH)?;
        if let Some(user_id) = user_id {
            url.query_pairs_mut()
                .append_pair("userId", &user_id.to_string());
        }
        let url = &url;
        self.with_retry_loop(RequestKind::Query, || async move {
            let response = self.send(Method::GET, url.clone(), None).await?;
            decode(response).await
        })
        .await
    }

    /// One record; `None` on 404.
    pub async fn get_record(&self, id: i64) -> Result<Option<TimingRecord>> {
        let url = self.base.join(&format!("{RECORDS_PATH}/{id}"))?;
        let url = &url;
        let outcome = self
            .with_retry_loop(RequestKind::Query, || async move {
                let response = self.send(Method::GET, url.clone(), None).await?;
                decode(response).await
            })
            .await;
        match outcome {
            Ok(record) => Ok(Some(record)),
            Err(err) if err.status() == Some(404) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Create a record; the server assigns id and timestamp.
    pub async fn create_record(&self, input: &NewTimingRecord) -> Result<TimingRecord> {
        let url = self.base.join(RECORDS_PATH)?;
        let body = serde_json::to_value(input).map_err(|err| ClientError::Decode {
            url: url.to_string(),
            message: err.to_string(),
        })?;
        let (url, body) = (&url, &body);
        self.with_retry_loop(RequestKind::Mutation, || async move {
            let response = self.send(Method::POST, url.clone(), Some(body)).await?;
            decode(response).await
        })
        .await
    }

    /// Delete a record; `false` on 404.
    pub async fn delete_record(&self, id: i64) -> Result<bool> {
        let url = self.base.join(&format!("{RECORDS_PATH}/{id}"))?;
        let url = &url;
        let outcome = self
            .with_retry_loop(RequestKind::Mutation, || async move {
                self.send(Method::DELETE, url.clone(), None).await.map(|_| ())
            })
            .await;
        match outcome {
            Ok(()) => Ok(true),
            Err(err) if err.status() == Some(404) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Daemon status document.
    pub async fn status(&self) -> Result<Value> {
        let url = self.base.join("api/status")?;
        let url = &url;
        self.with_retry_loop(RequestKind::Query, || async move {
            let response = self.send(Method::GET, url.clone(), None).await?;
            decode(response).await
        })
        .await
    }

    async fn with_retry_loop<T, F, Fut>(&self, kind: RequestKind, attempt: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut failures = 0;
        loop {
            match attempt().await {
                Ok(value) => return Ok(value),
                Err(err) if self.retry.should_retry(kind, failures, &err) => {
                    let delay = self.retry.delay_for(failures);
                    warn!(
                        error = %err,
                        failures,
                        retry_in_ms = delay.as_millis() as u64,
                        "request failed before reaching the api; retrying"
                    );
                    tokio::time::sleep(delay).await;
                    failures += 1;
                }
                Err(err) => {
                    if let ClientError::Api {
                        status,
                        url,
                        details,
                        ..
                    } = &err
                    {
                        if *status != StatusCode::NOT_FOUND.as_u16() {
                            error!(status, url = %url, details = ?details, "api error");
                        }
                    } else {
                        error!(error = %err, "api request failed");
                    }
                    return Err(err);
                }
            }
        }
    }

    async fn send(&self, method: Method, url: Url, body: Option<&Value>) -> Result<Response> {
        let mut request = self.http.request(method, url.clone());
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await.map_err(|err| ClientError::Network {
            url: url.to_string(),
            message: err.to_string(),
        })?;
        check_status(response).await
    }
}

async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let url = response.url().to_string();
    let text = response.text().await.unwrap_or_default();
    let details = serde_json::from_str::<Value>(&text).ok();
    let message = details
        .as_ref()
        .and_then(|body| {
            body.get("message")
                .or_else(|| body.get("error"))
                .and_then(Value::as_str)
                .map(str::to_owned)
        })
        .or_else(|| (!text.is_empty()).then(|| text.clone()))
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("error").to_owned());
    Err(ClientError::Api {
        status: status.as_u16(),
        url,
        message,
        details,
    })
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    let url = response.url().to_string();
    response.json::<T>().await.map_err(|err| ClientError::Decode {
        url,
        message: err.to_string(),
    })
}

#[async_trait]
impl RecordStore for ApiClient {
    fn backend(&self) -> &'static str {
        "remote"
    }

    async fn list(&self, user_id: Option<i64>) -> splitwatch_store::Result<Vec<TimingRecord>> {
        Ok(self.list_records(user_id).await?)
    }

    async fn get(&self, id: i64) -> splitwatch_store::Result<Option<TimingRecord>> {
        Ok(self.get_record(id).await?)
    }

    async fn create(&self, input: NewTimingRecord) -> splitwatch_store::Result<TimingRecord> {
        input.validate()?;
        Ok(self.create_record(&input).await?)
    }

    async fn delete(&self, id: i64) -> splitwatch_store::Result<bool> {
        self.delete_record(id).await.map_err(StoreError::from)
    }
}
