//! Workflow domain model - the graph-shaped job description the engine executes

pub mod bindings;
pub mod builder;
pub mod params;
pub mod template;

pub use bindings::{BindingError, TemplateBindings};
pub use builder::BuildError;
pub use params::GenerationParams;
pub use template::{LoadedTemplate, TemplateError, TemplateStore};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// A workflow maps node identifiers to node records. Edges between nodes live
/// inside each node's `inputs`; referential integrity is the engine's problem,
/// validated at submission time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Workflow(pub BTreeMap<String, Node>);

impl Workflow {
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.0.get(id)
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut Node> {
        self.0.get_mut(id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = (&String, &Node)> {
        self.0.iter()
    }

    /// Value of one input field on one node, if both exist.
    pub fn input(&self, id: &str, key: &str) -> Option<&Value> {
        self.node(id).and_then(|node| node.input(key))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One processing stage in the workflow graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Behavior selector understood by the engine (e.g. `KSamplerAdvanced`).
    pub class_type: String,

    /// Parameter name -> literal value or edge reference `["producer id", slot]`.
    #[serde(default)]
    pub inputs: Map<String, Value>,

    /// Fields the engine understands but this system never touches (`_meta` etc.).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Node {
    pub fn input(&self, key: &str) -> Option<&Value> {
        self.inputs.get(key)
    }

    pub fn set_input(&mut self, key: &str, value: impl Into<Value>) {
        self.inputs.insert(key.to_string(), value.into());
    }
}

/// Edge reference inside a node's inputs: `(producer node id, output slot)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeRef {
    pub node: String,
    pub slot: u64,
}

impl NodeRef {
    /// Parse a `["node id", slot]` JSON array; anything else is a literal.
    pub fn from_value(value: &Value) -> Option<Self> {
        let parts = value.as_array()?;
        if parts.len() != 2 {
            return None;
        }
        Some(Self {
            node: parts[0].as_str()?.to_string(),
            slot: parts[1].as_u64()?,
        })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::Workflow;

    /// The bundled reference template, shared by the module tests.
    pub fn reference_workflow() -> Workflow {
        serde_json::from_str(include_str!("../../workflow_api.json")).unwrap()
    }
}
