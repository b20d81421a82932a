#![allow(dead_code)]
//! Scripted engine client and fixtures for deterministic, fast tests

use async_trait::async_trait;
use comfy_relay::engine::{CompletionRecord, EngineError, ImageRef};
use comfy_relay::workflow::Workflow;
use comfy_relay::{EngineClient, PollConfig, RenderDefaults, RequestHandler, TemplateStore};
use reqwest::StatusCode;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// The bundled reference template, loaded through the store's inline path.
pub const TEMPLATE_JSON: &str = include_str!("../../workflow_api.json");

/// Scripted submission outcome.
pub enum SubmitScript {
    Ok(String),
    HttpStatus(u16),
    MissingId(String),
}

/// One scripted history response; the last entry repeats forever.
pub enum HistoryStep {
    Pending,
    Flaky,
    Done(CompletionRecord),
}

/// Scripted artifact fetch outcome.
pub enum ViewScript {
    Ok(Vec<u8>),
    Fail(u16),
}

/// Mock engine that plays back scripted responses and counts every call.
#[derive(Clone)]
pub struct MockEngine {
    ready_after: usize,
    submit: Arc<SubmitScript>,
    history: Arc<Vec<HistoryStep>>,
    view: Arc<ViewScript>,
    stats_calls: Arc<AtomicUsize>,
    submit_calls: Arc<AtomicUsize>,
    history_calls: Arc<AtomicUsize>,
    view_calls: Arc<AtomicUsize>,
    last_workflow: Arc<Mutex<Option<Workflow>>>,
}

impl MockEngine {
    /// Happy-path engine: ready at once, submits as `abc123`, completes
    /// immediately with one `out.png` image, serves `PNGDATA` bytes.
    pub fn new() -> Self {
        Self {
            ready_after: 0,
            submit: Arc::new(SubmitScript::Ok("abc123".to_string())),
            history: Arc::new(vec![HistoryStep::Done(image_record("out.png"))]),
            view: Arc::new(ViewScript::Ok(b"PNGDATA".to_vec())),
            stats_calls: Arc::new(AtomicUsize::new(0)),
            submit_calls: Arc::new(AtomicUsize::new(0)),
            history_calls: Arc::new(AtomicUsize::new(0)),
            view_calls: Arc::new(AtomicUsize::new(0)),
            last_workflow: Arc::new(Mutex::new(None)),
        }
    }

    pub fn ready_after(mut self, calls: usize) -> Self {
        self.ready_after = calls;
        self
    }

    pub fn with_submit(mut self, script: SubmitScript) -> Self {
        self.submit = Arc::new(script);
        self
    }

    pub fn with_history(mut self, script: Vec<HistoryStep>) -> Self {
        self.history = Arc::new(script);
        self
    }

    pub fn with_view(mut self, script: ViewScript) -> Self {
        self.view = Arc::new(script);
        self
    }

    pub fn stats_calls(&self) -> usize {
        self.stats_calls.load(Ordering::SeqCst)
    }

    pub fn submit_calls(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
    }

    pub fn history_calls(&self) -> usize {
        self.history_calls.load(Ordering::SeqCst)
    }

    pub fn view_calls(&self) -> usize {
        self.view_calls.load(Ordering::SeqCst)
    }

    /// The workflow passed to the most recent submission.
    pub fn last_workflow(&self) -> Option<Workflow> {
        self.last_workflow.lock().unwrap().clone()
    }
}

#[async_trait]
impl EngineClient for MockEngine {
    async fn system_stats(&self) -> Result<(), EngineError> {
        let call = self.stats_calls.fetch_add(1, Ordering::SeqCst);
        if call >= self.ready_after {
            Ok(())
        } else {
            Err(EngineError::Transport(
                "connection refused (scripted)".to_string(),
            ))
        }
    }

    async fn submit(&self, workflow: &Workflow) -> Result<String, EngineError> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_workflow.lock().unwrap() = Some(workflow.clone());

        match &*self.submit {
            SubmitScript::Ok(prompt_id) => Ok(prompt_id.clone()),
            SubmitScript::HttpStatus(code) => Err(EngineError::Submission {
                status: StatusCode::from_u16(*code).unwrap(),
                body: "scripted failure".to_string(),
            }),
            SubmitScript::MissingId(body) => Err(EngineError::MissingPromptId(body.clone())),
        }
    }

    async fn history(&self, _prompt_id: &str) -> Result<Option<CompletionRecord>, EngineError> {
        let call = self.history_calls.fetch_add(1, Ordering::SeqCst);
        let step = self.history.get(call).or_else(|| self.history.last());
        match step {
            None | Some(HistoryStep::Pending) => Ok(None),
            Some(HistoryStep::Flaky) => Err(EngineError::Transport(
                "connection reset (scripted)".to_string(),
            )),
            Some(HistoryStep::Done(record)) => Ok(Some(record.clone())),
        }
    }

    async fn view(&self, image: &ImageRef) -> Result<Vec<u8>, EngineError> {
        self.view_calls.fetch_add(1, Ordering::SeqCst);
        match &*self.view {
            ViewScript::Ok(bytes) => Ok(bytes.clone()),
            ViewScript::Fail(code) => Err(EngineError::Fetch {
                filename: image.filename.clone(),
                status: StatusCode::from_u16(*code).unwrap(),
            }),
        }
    }
}

/// Completion record with a single image output under the save node.
pub fn image_record(filename: &str) -> CompletionRecord {
    serde_json::from_value(json!({
        "outputs": {
            "9": {
                "images": [
                    { "filename": filename, "subfolder": "", "type": "output" }
                ]
            }
        }
    }))
    .unwrap()
}

/// Completion record whose outputs carry no images at all.
pub fn imageless_record() -> CompletionRecord {
    serde_json::from_value(json!({
        "outputs": {
            "7": { "latents": [ { "filename": "x.latent" } ] }
        }
    }))
    .unwrap()
}

/// Store resolving the bundled reference template through the inline path.
pub fn test_store() -> TemplateStore {
    TemplateStore::new(Some(TEMPLATE_JSON.to_string()), "does-not-exist.json")
}

/// Millisecond-scale polling so timing tests stay fast.
pub fn fast_poll() -> PollConfig {
    PollConfig {
        interval: Duration::from_millis(5),
        timeout: Duration::from_millis(500),
    }
}

/// Handler wired to the given mock and the reference template.
pub fn handler_with(engine: MockEngine) -> RequestHandler<MockEngine> {
    RequestHandler::new(engine, test_store(), RenderDefaults::default()).with_poll(fast_poll())
}
