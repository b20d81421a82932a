//! Request orchestration: the single fault boundary for one job

use crate::config::RenderDefaults;
use crate::engine::{poll_completion, EngineClient, PollConfig};
use crate::workflow::{builder, GenerationParams, TemplateBindings, TemplateStore, Workflow};
use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::Serialize;
use serde_json::Value;
use tracing::{error, info, warn};

/// Error reported when the completion record carries no image output.
pub const NO_IMAGE_ERROR: &str = "No image generated by ComfyUI workflow";

/// Settings echoed back to the caller, read out of the materialized workflow
/// so resolved defaults are visible.
#[derive(Debug, Clone, Serialize)]
pub struct RenderMeta {
    pub seed: i64,
    pub width: u32,
    pub height: u32,
    pub steps: u32,
    pub cfg: f64,
    pub lora_name: String,
    pub filename: String,
}

impl RenderMeta {
    /// Best-effort readback. Caller-supplied override workflows may not
    /// resolve; every field then falls back to its documented default.
    pub fn read(workflow: &Workflow) -> Self {
        let bindings = TemplateBindings::resolve(workflow).ok();

        let (seed, width, height, steps, cfg, lora_name) = match &bindings {
            Some(b) => (
                workflow.input(&b.sampler, b.seed_input).and_then(Value::as_i64),
                workflow.input(&b.latent, "width").and_then(Value::as_u64),
                workflow.input(&b.latent, "height").and_then(Value::as_u64),
                workflow.input(&b.sampler, "steps").and_then(Value::as_u64),
                workflow.input(&b.sampler, "cfg").and_then(Value::as_f64),
                character_lora(workflow, b),
            ),
            None => (None, None, None, None, None, None),
        };

        Self {
            seed: seed.unwrap_or(-1),
            width: width.unwrap_or(1024) as u32,
            height: height.unwrap_or(1024) as u32,
            steps: steps.unwrap_or(10) as u32,
            cfg: cfg.unwrap_or(1.0),
            lora_name: lora_name.unwrap_or_else(|| "none".to_string()),
            filename: String::new(),
        }
    }
}

/// Character adapter actually in effect; a neutralized slot reports no LoRA.
fn character_lora(workflow: &Workflow, bindings: &TemplateBindings) -> Option<String> {
    let strength = workflow
        .input(&bindings.character_adapter, "strength_model")
        .and_then(Value::as_f64)
        .unwrap_or(0.0);
    if strength == 0.0 {
        return None;
    }
    workflow
        .input(&bindings.character_adapter, "lora_name")
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Response envelope: success carries the artifact, failure a single message.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum JobEnvelope {
    Success {
        image_base64: String,
        prompt_id: String,
        meta: RenderMeta,
    },
    Error {
        error: String,
    },
}

impl JobEnvelope {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            error: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}

/// Handles one generation request end to end.
pub struct RequestHandler<C> {
    client: C,
    store: TemplateStore,
    defaults: RenderDefaults,
    poll: PollConfig,
}

impl<C: EngineClient> RequestHandler<C> {
    pub fn new(client: C, store: TemplateStore, defaults: RenderDefaults) -> Self {
        Self {
            client,
            store,
            defaults,
            poll: PollConfig::default(),
        }
    }

    pub fn with_poll(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    /// Single fault boundary for a request. Every failure below is logged in
    /// full and converted to an error envelope; the worker never crashes on a
    /// per-request fault.
    pub async fn handle(&self, input: &Value) -> JobEnvelope {
        match self.run(input).await {
            Ok(envelope) => envelope,
            Err(err) => {
                error!("job failed: {err:?}");
                JobEnvelope::error(format!("{err:#}"))
            }
        }
    }

    async fn run(&self, input: &Value) -> Result<JobEnvelope> {
        let params: GenerationParams = if input.is_null() {
            GenerationParams::default()
        } else {
            serde_json::from_value(input.clone()).context("invalid job input")?
        };

        let lora = params.lora_name.as_deref().unwrap_or("none");
        let prompt_preview: String = params
            .prompt
            .as_deref()
            .unwrap_or("")
            .chars()
            .take(80)
            .collect();
        info!("job received: lora={lora}, prompt={prompt_preview:?}");

        let workflow = builder::materialize(&self.store, &params, &self.defaults)?;

        let mut meta = RenderMeta::read(&workflow);
        info!(
            "queuing: {}x{}, seed={}, steps={}, cfg={}, lora={}",
            meta.width, meta.height, meta.seed, meta.steps, meta.cfg, meta.lora_name
        );

        let prompt_id = self.client.submit(&workflow).await?;
        info!("submitted, prompt_id={prompt_id}, polling");

        let record = poll_completion(&self.client, &prompt_id, &self.poll).await?;

        let Some(image) = record.first_image() else {
            warn!("completion record for {prompt_id} carries no image output");
            return Ok(JobEnvelope::error(NO_IMAGE_ERROR));
        };

        info!("fetching artifact: {}", image.filename);
        let bytes = self.client.view(image).await?;

        meta.filename = image.filename.clone();
        let image_base64 = BASE64.encode(&bytes);
        info!(
            "done, artifact {} bytes ({} base64 chars)",
            bytes.len(),
            image_base64.len()
        );

        Ok(JobEnvelope::Success {
            image_base64,
            prompt_id,
            meta,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::testing::reference_workflow;
    use serde_json::json;

    fn materialized(params: serde_json::Value) -> Workflow {
        let template = reference_workflow();
        let bindings = TemplateBindings::resolve(&template).unwrap();
        let params: GenerationParams = serde_json::from_value(params).unwrap();
        builder::patch(&template, &bindings, &params, &RenderDefaults::default()).unwrap()
    }

    #[test]
    fn test_meta_reads_resolved_defaults() {
        let workflow = materialized(json!({ "seed": 7 }));
        let meta = RenderMeta::read(&workflow);

        assert_eq!(meta.seed, 7);
        assert_eq!(meta.width, 1024);
        assert_eq!(meta.height, 1024);
        assert_eq!(meta.steps, 10);
        assert_eq!(meta.cfg, 1.0);
        assert_eq!(meta.lora_name, "none");
    }

    #[test]
    fn test_meta_reports_active_character_lora() {
        let workflow = materialized(json!({
            "seed": 7,
            "lora_name": "style.safetensors",
            "lora_strength": 0.8
        }));
        let meta = RenderMeta::read(&workflow);

        assert_eq!(meta.lora_name, "style.safetensors");
    }

    #[test]
    fn test_meta_falls_back_on_unresolvable_workflow() {
        let workflow: Workflow =
            serde_json::from_value(json!({ "a": { "class_type": "X", "inputs": {} } })).unwrap();
        let meta = RenderMeta::read(&workflow);

        assert_eq!(meta.seed, -1);
        assert_eq!(meta.width, 1024);
        assert_eq!(meta.steps, 10);
        assert_eq!(meta.lora_name, "none");
    }

    #[test]
    fn test_error_envelope_has_single_field() {
        let envelope = JobEnvelope::error("boom");
        let value = serde_json::to_value(&envelope).unwrap();

        let object = value.as_object().unwrap();
        assert_eq!(object.len(), 1);
        assert_eq!(object["error"], json!("boom"));
    }

    #[test]
    fn test_success_envelope_shape() {
        let envelope = JobEnvelope::Success {
            image_base64: "QQ==".to_string(),
            prompt_id: "abc123".to_string(),
            meta: RenderMeta::read(&materialized(json!({ "seed": 7 }))),
        };
        let value = serde_json::to_value(&envelope).unwrap();

        assert_eq!(value["image_base64"], json!("QQ=="));
        assert_eq!(value["prompt_id"], json!("abc123"));
        assert_eq!(value["meta"]["seed"], json!(7));
        assert!(value.get("error").is_none());
    }
}
