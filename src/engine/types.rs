//! Engine API types and errors

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use thiserror::Error;

/// Error types for engine operations
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine request failed: {0}")]
    Transport(String),

    #[error("submission rejected with status {status}: {body}")]
    Submission {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("no prompt_id in submission response: {0}")]
    MissingPromptId(String),

    #[error("job {prompt_id} timed out after {elapsed_secs}s")]
    Timeout {
        prompt_id: String,
        elapsed_secs: u64,
    },

    #[error("artifact fetch for '{filename}' failed with status {status}")]
    Fetch {
        filename: String,
        status: reqwest::StatusCode,
    },
}

impl From<reqwest::Error> for EngineError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

/// Terminal history entry for one submitted job. Opaque until terminal; only
/// the output descriptors are interpreted here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompletionRecord {
    #[serde(default)]
    pub outputs: BTreeMap<String, NodeOutputs>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CompletionRecord {
    /// First image produced by any output node, in node-id order.
    pub fn first_image(&self) -> Option<&ImageRef> {
        self.outputs.values().find_map(|node| node.images.first())
    }
}

/// Outputs recorded for a single node.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeOutputs {
    #[serde(default)]
    pub images: Vec<ImageRef>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Descriptor of one stored artifact, as reported by the history endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    pub filename: String,

    #[serde(default)]
    pub subfolder: String,

    #[serde(rename = "type", default = "default_image_type")]
    pub kind: String,
}

fn default_image_type() -> String {
    "output".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_first_image_scans_nodes_in_order() {
        let record: CompletionRecord = serde_json::from_value(json!({
            "outputs": {
                "7": { "latents": [] },
                "9": { "images": [
                    { "filename": "a.png", "subfolder": "", "type": "output" },
                    { "filename": "b.png", "subfolder": "", "type": "output" }
                ]}
            },
            "status": { "completed": true }
        }))
        .unwrap();

        assert_eq!(record.first_image().unwrap().filename, "a.png");
    }

    #[test]
    fn test_first_image_none_without_image_outputs() {
        let record: CompletionRecord = serde_json::from_value(json!({
            "outputs": { "7": { "latents": [{ "filename": "x.latent" }] } }
        }))
        .unwrap();

        assert!(record.first_image().is_none());
    }

    #[test]
    fn test_image_ref_defaults() {
        let image: ImageRef = serde_json::from_value(json!({ "filename": "out.png" })).unwrap();
        assert_eq!(image.subfolder, "");
        assert_eq!(image.kind, "output");
    }
}
