//! HTTP implementation of the engine client

use super::{CompletionRecord, EngineClient, EngineError, ImageRef};
use crate::workflow::Workflow;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);
const SUBMIT_TIMEOUT: Duration = Duration::from_secs(30);
const HISTORY_TIMEOUT: Duration = Duration::from_secs(10);
const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Largest response-body slice quoted back in error messages.
const BODY_PREVIEW: usize = 300;

/// Client for the engine's local HTTP API.
#[derive(Debug, Clone)]
pub struct HttpEngineClient {
    base_url: String,
    http: reqwest::Client,
}

impl HttpEngineClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

fn preview(body: &str) -> String {
    body.chars().take(BODY_PREVIEW).collect()
}

#[async_trait]
impl EngineClient for HttpEngineClient {
    async fn system_stats(&self) -> Result<(), EngineError> {
        let response = self
            .http
            .get(self.url("/system_stats"))
            .timeout(PROBE_TIMEOUT)
            .send()
            .await?;
        response.error_for_status()?;
        Ok(())
    }

    async fn submit(&self, workflow: &Workflow) -> Result<String, EngineError> {
        // Fresh session identifier per submission.
        let client_id = Uuid::new_v4().to_string();
        let payload = json!({ "prompt": workflow, "client_id": client_id });

        let response = self
            .http
            .post(self.url("/prompt"))
            .timeout(SUBMIT_TIMEOUT)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EngineError::Submission {
                status,
                body: preview(&body),
            });
        }

        let body: Value = response.json().await?;
        match body.get("prompt_id").and_then(Value::as_str) {
            Some(id) if !id.is_empty() => Ok(id.to_string()),
            _ => Err(EngineError::MissingPromptId(preview(&body.to_string()))),
        }
    }

    async fn history(&self, prompt_id: &str) -> Result<Option<CompletionRecord>, EngineError> {
        let response = self
            .http
            .get(self.url(&format!("/history/{prompt_id}")))
            .timeout(HISTORY_TIMEOUT)
            .send()
            .await?;

        if !response.status().is_success() {
            debug!("history for {prompt_id} returned status {}", response.status());
            return Ok(None);
        }

        // Completion shows up as the prompt id keying the history mapping.
        let mut history: BTreeMap<String, CompletionRecord> = response.json().await?;
        Ok(history.remove(prompt_id))
    }

    async fn view(&self, image: &ImageRef) -> Result<Vec<u8>, EngineError> {
        let response = self
            .http
            .get(self.url("/view"))
            .query(&[
                ("filename", image.filename.as_str()),
                ("subfolder", image.subfolder.as_str()),
                ("type", image.kind.as_str()),
            ])
            .timeout(FETCH_TIMEOUT)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(EngineError::Fetch {
                filename: image.filename.clone(),
                status,
            });
        }
        Ok(response.bytes().await?.to_vec())
    }
}
