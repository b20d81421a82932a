//! Boundary with the rendering engine's local HTTP API

pub mod http;
pub mod poll;
pub mod types;

pub use http::HttpEngineClient;
pub use poll::{poll_completion, wait_ready, PollConfig};
pub use types::{CompletionRecord, EngineError, ImageRef, NodeOutputs};

use crate::workflow::Workflow;
use async_trait::async_trait;

/// Seam for the engine API - allows swapping the HTTP client for mocks.
#[async_trait]
pub trait EngineClient: Send + Sync {
    /// Liveness probe (`GET /system_stats`). Any success status means ready.
    async fn system_stats(&self) -> Result<(), EngineError>;

    /// Submit a workflow (`POST /prompt`) and return the job's prompt id.
    async fn submit(&self, workflow: &Workflow) -> Result<String, EngineError>;

    /// One history lookup; `None` while the job has no terminal record yet.
    async fn history(&self, prompt_id: &str) -> Result<Option<CompletionRecord>, EngineError>;

    /// Retrieve the raw bytes of one produced artifact (`GET /view`).
    async fn view(&self, image: &ImageRef) -> Result<Vec<u8>, EngineError>;
}
