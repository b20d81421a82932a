//! Schema bindings: logical patch targets resolved from the template graph
//!
//! The builder never addresses nodes by literal id. At load time the template
//! is inspected once and each logical role (checkpoint, adapters, latent size,
//! prompt texts, sampler, save) is bound to a concrete node id by walking the
//! graph edges. A template that cannot satisfy a role is a configuration
//! fault, not a per-request one.

use super::{NodeRef, Workflow};
use thiserror::Error;

const SAMPLER_TYPES: [&str; 2] = ["KSamplerAdvanced", "KSampler"];
const ADAPTER_TYPE: &str = "LoraLoader";
const CHECKPOINT_TYPE: &str = "CheckpointLoaderSimple";
const SAVE_TYPE: &str = "SaveImage";

/// Errors raised while resolving roles against a template.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BindingError {
    #[error("workflow template has no {role} node")]
    RoleNotFound { role: &'static str },

    #[error("input '{input}' of node '{node_id}' is not a graph edge")]
    NotAnEdge { node_id: String, input: String },

    #[error("node '{missing}' referenced by input '{input}' of node '{node_id}' does not exist")]
    DanglingEdge {
        node_id: String,
        input: String,
        missing: String,
    },
}

/// Node ids for every location the builder patches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateBindings {
    pub checkpoint: String,
    /// First adapter after the checkpoint; carries the acceleration LoRA.
    pub accel_adapter: String,
    /// Last adapter before the sampler; carries the per-request character LoRA.
    pub character_adapter: String,
    pub latent: String,
    pub positive: String,
    pub negative: String,
    pub sampler: String,
    /// Seed input name differs between sampler variants.
    pub seed_input: &'static str,
    pub save: String,
}

impl TemplateBindings {
    pub fn resolve(workflow: &Workflow) -> Result<Self, BindingError> {
        let (sampler_id, sampler) = workflow
            .nodes()
            .find(|(_, node)| SAMPLER_TYPES.contains(&node.class_type.as_str()))
            .ok_or(BindingError::RoleNotFound { role: "sampler" })?;
        let seed_input = if sampler.class_type == "KSamplerAdvanced" {
            "noise_seed"
        } else {
            "seed"
        };

        let positive = follow_edge(workflow, sampler_id, "positive")?;
        let negative = follow_edge(workflow, sampler_id, "negative")?;
        let latent = follow_edge(workflow, sampler_id, "latent_image")?;

        // Walk the model chain from the sampler back to the checkpoint,
        // collecting the adapter nodes in between.
        let mut adapters = Vec::new();
        let mut current = follow_edge(workflow, sampler_id, "model")?;
        let mut hops = 0;
        let checkpoint = loop {
            if hops > workflow.len() {
                return Err(BindingError::RoleNotFound { role: "checkpoint" });
            }
            hops += 1;
            match workflow.node(&current).map(|node| node.class_type.as_str()) {
                Some(ADAPTER_TYPE) => {
                    adapters.push(current.clone());
                    current = follow_edge(workflow, &current, "model")?;
                }
                Some(CHECKPOINT_TYPE) => break current,
                _ => return Err(BindingError::RoleNotFound { role: "checkpoint" }),
            }
        };
        // Checkpoint side first, matching the order the model flows through them.
        adapters.reverse();

        let mut adapters = adapters.into_iter();
        let accel_adapter = adapters.next().ok_or(BindingError::RoleNotFound {
            role: "acceleration adapter",
        })?;
        let character_adapter = adapters.last().ok_or(BindingError::RoleNotFound {
            role: "character adapter",
        })?;

        let save = workflow
            .nodes()
            .find(|(_, node)| node.class_type == SAVE_TYPE)
            .map(|(id, _)| id.clone())
            .ok_or(BindingError::RoleNotFound { role: "save image" })?;

        Ok(Self {
            checkpoint,
            accel_adapter,
            character_adapter,
            latent,
            positive,
            negative,
            sampler: sampler_id.clone(),
            seed_input,
            save,
        })
    }
}

/// Resolve one edge input to the id of an existing producer node.
fn follow_edge(workflow: &Workflow, node_id: &str, input: &str) -> Result<String, BindingError> {
    let value = workflow
        .input(node_id, input)
        .ok_or_else(|| BindingError::NotAnEdge {
            node_id: node_id.to_string(),
            input: input.to_string(),
        })?;
    let edge = NodeRef::from_value(value).ok_or_else(|| BindingError::NotAnEdge {
        node_id: node_id.to_string(),
        input: input.to_string(),
    })?;
    if workflow.node(&edge.node).is_none() {
        return Err(BindingError::DanglingEdge {
            node_id: node_id.to_string(),
            input: input.to_string(),
            missing: edge.node,
        });
    }
    Ok(edge.node)
}
