//! Worker loop: the boundary with the hosting runtime's job source
//!
//! Jobs arrive one JSON document per stdin line and answers leave one JSON
//! document per stdout line. Job distribution, retries across workers, and
//! process supervision belong to the hosting runtime, not to this loop.

use crate::engine::EngineClient;
use crate::handler::{JobEnvelope, RequestHandler};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, warn};

/// Units of work admitted at once. The engine executes one pipeline at a
/// time, so the worker never reports capacity for more than one.
pub const CONCURRENCY: usize = 1;

/// One job pulled off the queue.
#[derive(Debug, Clone, Deserialize)]
pub struct JobRequest {
    #[serde(default)]
    pub id: Option<Value>,

    #[serde(default)]
    pub input: Value,
}

/// Answer for one job, echoing its id when the source supplied one.
#[derive(Debug, Serialize)]
pub struct JobResponse<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<&'a Value>,
    pub output: &'a JobEnvelope,
}

/// Pull jobs line by line and answer them strictly one at a time.
pub async fn serve<C: EngineClient>(handler: &RequestHandler<C>) -> Result<()> {
    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = tokio::io::stdout();
    let mut lines = stdin.lines();

    info!("worker loop started (concurrency {CONCURRENCY})");

    while let Some(line) = lines
        .next_line()
        .await
        .context("failed to read job line")?
    {
        if line.trim().is_empty() {
            continue;
        }

        let (id, envelope) = match serde_json::from_str::<JobRequest>(&line) {
            Ok(job) => (job.id.clone(), handler.handle(&job.input).await),
            Err(err) => {
                warn!("discarding malformed job line: {err}");
                (
                    None,
                    JobEnvelope::error(format!("malformed job request: {err}")),
                )
            }
        };

        let response = JobResponse {
            id: id.as_ref(),
            output: &envelope,
        };
        let mut encoded =
            serde_json::to_vec(&response).context("failed to encode job response")?;
        encoded.push(b'\n');
        stdout
            .write_all(&encoded)
            .await
            .context("failed to write job response")?;
        stdout.flush().await.context("failed to flush job response")?;
    }

    info!("job source closed, worker loop exiting");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_job_request_with_id_and_input() {
        let job: JobRequest =
            serde_json::from_str(r#"{"id": "job-1", "input": {"prompt": "a cat"}}"#).unwrap();
        assert_eq!(job.id, Some(json!("job-1")));
        assert_eq!(job.input["prompt"], json!("a cat"));
    }

    #[test]
    fn test_job_request_without_input_defaults_to_null() {
        let job: JobRequest = serde_json::from_str(r#"{"id": 7}"#).unwrap();
        assert_eq!(job.id, Some(json!(7)));
        assert!(job.input.is_null());
    }

    #[test]
    fn test_job_response_omits_missing_id() {
        let envelope = JobEnvelope::error("boom");
        let response = JobResponse {
            id: None,
            output: &envelope,
        };
        let value = serde_json::to_value(&response).unwrap();
        assert!(value.get("id").is_none());
        assert_eq!(value["output"]["error"], json!("boom"));
    }
}
