//! Recognized request parameters

use serde::Deserialize;
use serde_json::Value;

/// Options accepted on a generation request. Every field is optional; the
/// builder applies the configured defaults for anything absent. Field names
/// match the wire format of the job source, including the legacy short
/// aliases for step count and guidance scale.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GenerationParams {
    pub prompt: Option<String>,
    pub negative_prompt: Option<String>,

    /// Character LoRA filename; empty or absent neutralizes the adapter slot.
    pub lora_name: Option<String>,
    pub lora_strength: Option<f64>,

    pub width: Option<u32>,
    pub height: Option<u32>,

    pub num_inference_steps: Option<u32>,
    pub steps: Option<u32>,
    pub guidance_scale: Option<f64>,
    pub cfg: Option<f64>,

    /// Zero, negative, or absent requests a fresh random seed.
    pub seed: Option<i64>,

    pub sampler_name: Option<String>,
    pub scheduler: Option<String>,

    pub ckpt_name: Option<String>,
    pub dmd2_lora: Option<String>,
    pub dmd2_strength: Option<f64>,

    /// Full workflow override, as an object or serialized text. When present
    /// (and non-null) every other field above is ignored.
    pub workflow: Option<Value>,
}

impl GenerationParams {
    /// The canonical long name wins when both aliases are supplied.
    pub fn effective_steps(&self, default: u32) -> u32 {
        self.num_inference_steps.or(self.steps).unwrap_or(default)
    }

    /// The canonical long name wins when both aliases are supplied.
    pub fn effective_cfg(&self, default: f64) -> f64 {
        self.guidance_scale.or(self.cfg).unwrap_or(default)
    }

    pub fn workflow_override(&self) -> Option<&Value> {
        self.workflow.as_ref().filter(|value| !value.is_null())
    }
}
