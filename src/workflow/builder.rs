//! Materializes a submittable workflow from the template and request params

use super::template::{TemplateError, TemplateStore};
use super::{GenerationParams, TemplateBindings, Workflow};
use crate::config::RenderDefaults;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

/// Positive text applied when the request carries none.
pub const DEFAULT_PROMPT: &str = "a scenic mountain landscape, golden hour, highly detailed";

/// Negative text applied when the request carries none.
pub const DEFAULT_NEGATIVE_PROMPT: &str =
    "blur, oversharpening, poor composition, deformed, ugly, bad anatomy";

/// Character adapter strength when a LoRA is named without one.
pub const DEFAULT_LORA_STRENGTH: f64 = 1.0;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("invalid workflow override: {0}")]
    InvalidOverride(#[source] serde_json::Error),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error("workflow template has no node '{0}'")]
    MissingNode(String),
}

/// Produce the workflow for one request: either the caller's full override,
/// or a patched copy of the cached template.
pub fn materialize(
    store: &TemplateStore,
    params: &GenerationParams,
    defaults: &RenderDefaults,
) -> Result<Workflow, BuildError> {
    if let Some(raw) = params.workflow_override() {
        debug!("request carries a full workflow override, skipping template");
        return override_workflow(raw);
    }
    let loaded = store.load()?;
    patch(&loaded.workflow, &loaded.bindings, params, defaults)
}

/// Deserialize a caller-supplied workflow, given as an object or as text.
pub fn override_workflow(raw: &Value) -> Result<Workflow, BuildError> {
    match raw {
        Value::String(text) => serde_json::from_str(text).map_err(BuildError::InvalidOverride),
        other => serde_json::from_value(other.clone()).map_err(BuildError::InvalidOverride),
    }
}

/// Deep-copy the shared template and patch the bound fields. The template
/// itself is never mutated.
pub fn patch(
    template: &Workflow,
    bindings: &TemplateBindings,
    params: &GenerationParams,
    defaults: &RenderDefaults,
) -> Result<Workflow, BuildError> {
    let mut workflow = template.clone();

    let checkpoint = params
        .ckpt_name
        .clone()
        .unwrap_or_else(|| defaults.checkpoint.clone());
    node_mut(&mut workflow, &bindings.checkpoint)?.set_input("ckpt_name", checkpoint);

    let accel_name = params
        .dmd2_lora
        .clone()
        .unwrap_or_else(|| defaults.accel_adapter.clone());
    let accel_strength = params.dmd2_strength.unwrap_or(defaults.accel_strength);
    {
        let accel = node_mut(&mut workflow, &bindings.accel_adapter)?;
        accel.set_input("lora_name", accel_name.clone());
        accel.set_input("strength_model", accel_strength);
        accel.set_input("strength_clip", accel_strength);
    }

    // The character slot is neutralized at strength 0.0 when no LoRA is
    // requested; the engine still needs a loadable filename there.
    let character = node_mut(&mut workflow, &bindings.character_adapter)?;
    match params.lora_name.as_deref().filter(|name| !name.is_empty()) {
        Some(name) => {
            let strength = params.lora_strength.unwrap_or(DEFAULT_LORA_STRENGTH);
            character.set_input("lora_name", name);
            character.set_input("strength_model", strength);
            character.set_input("strength_clip", strength);
        }
        None => {
            character.set_input("lora_name", accel_name);
            character.set_input("strength_model", 0.0);
            character.set_input("strength_clip", 0.0);
        }
    }

    // The template's own dimensions are the default output size.
    if let Some(width) = params.width {
        node_mut(&mut workflow, &bindings.latent)?.set_input("width", width);
    }
    if let Some(height) = params.height {
        node_mut(&mut workflow, &bindings.latent)?.set_input("height", height);
    }

    let prompt = params
        .prompt
        .clone()
        .unwrap_or_else(|| DEFAULT_PROMPT.to_string());
    node_mut(&mut workflow, &bindings.positive)?.set_input("text", prompt);

    let negative = params
        .negative_prompt
        .clone()
        .unwrap_or_else(|| DEFAULT_NEGATIVE_PROMPT.to_string());
    node_mut(&mut workflow, &bindings.negative)?.set_input("text", negative);

    let seed = params.seed.filter(|seed| *seed > 0).unwrap_or_else(fresh_seed);
    {
        let sampler = node_mut(&mut workflow, &bindings.sampler)?;
        sampler.set_input(bindings.seed_input, seed);
        sampler.set_input("steps", params.effective_steps(defaults.steps));
        sampler.set_input("cfg", params.effective_cfg(defaults.cfg));
        sampler.set_input(
            "sampler_name",
            params
                .sampler_name
                .clone()
                .unwrap_or_else(|| defaults.sampler.clone()),
        );
        sampler.set_input(
            "scheduler",
            params
                .scheduler
                .clone()
                .unwrap_or_else(|| defaults.scheduler.clone()),
        );
    }

    node_mut(&mut workflow, &bindings.save)?.set_input("filename_prefix", job_prefix());

    Ok(workflow)
}

fn node_mut<'a>(
    workflow: &'a mut Workflow,
    id: &str,
) -> Result<&'a mut super::Node, BuildError> {
    workflow
        .node_mut(id)
        .ok_or_else(|| BuildError::MissingNode(id.to_string()))
}

/// Fresh unpredictable seed for unseeded requests. `rand::random` draws from
/// the thread-local CSPRNG; the u32 range keeps it non-negative as i64.
fn fresh_seed() -> i64 {
    i64::from(rand::random::<u32>())
}

/// Unique output prefix so concurrent or sequential jobs never collide in the
/// engine's storage.
fn job_prefix() -> String {
    let mut token = Uuid::new_v4().simple().to_string();
    token.truncate(8);
    format!("job_{token}")
}
