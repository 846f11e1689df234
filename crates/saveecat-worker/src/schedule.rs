//! Client for the CMS scheduling API.
//!
//! The dispatcher pulls pending jobs from `GET /api/engine/pending` and
//! reports progress to `POST /api/engine/logs`. Log delivery is best-effort:
//! a run never fails because the CMS would not take a log line.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::WorkerError;

/// One job the CMS wants run. `run_id` names the run row the CMS already
/// created when it enqueued the job; a descriptor without one asks the
/// worker to create the run itself.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingJob {
    #[serde(default)]
    pub run_id: Option<i64>,
    pub url: String,
    #[serde(default)]
    pub max_items: Option<i32>,
}

impl PendingJob {
    /// How the job is identified in logs and CMS log lines.
    #[must_use]
    pub fn log_tag(&self) -> String {
        match self.run_id {
            Some(id) => id.to_string(),
            None => self.url.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct PendingResponse {
    pending: Vec<PendingJob>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LogEntry<'a> {
    job_id: &'a str,
    level: &'a str,
    message: &'a str,
}

pub struct SchedulingClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl SchedulingClient {
    /// Creates a client for the CMS at `base_url`. Point `base_url` at a
    /// mock server in tests.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(
        base_url: &str,
        token: Option<&str>,
        user_agent: &str,
        timeout_secs: u64,
    ) -> Result<Self, WorkerError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.map(str::to_string),
        })
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Fetches the jobs currently waiting for a worker.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::Http`] on a network failure or
    /// [`WorkerError::UnexpectedStatus`] on a non-success response.
    pub async fn fetch_pending(&self) -> Result<Vec<PendingJob>, WorkerError> {
        let url = format!("{}/api/engine/pending", self.base_url);
        let response = self.authorize(self.client.get(&url)).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(WorkerError::UnexpectedStatus {
                url,
                status: status.as_u16(),
            });
        }
        let body: PendingResponse = response.json().await?;
        Ok(body.pending)
    }

    /// Posts one log line for `job_id`. Failures are swallowed after a
    /// debug-level note.
    pub async fn post_log(&self, job_id: &str, level: &str, message: &str) {
        let url = format!("{}/api/engine/logs", self.base_url);
        let entry = LogEntry {
            job_id,
            level,
            message,
        };
        let result = self
            .authorize(self.client.post(&url))
            .json(&entry)
            .send()
            .await;
        match result {
            Ok(response) if response.status().is_success() => {}
            Ok(response) => {
                tracing::debug!(job_id, status = %response.status(), "log delivery rejected");
            }
            Err(err) => {
                tracing::debug!(job_id, error = %err, "log delivery failed");
            }
        }
    }
}
