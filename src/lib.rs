//! comfy-relay - serverless job adapter for a local ComfyUI rendering engine

pub mod cli;
pub mod config;
pub mod engine;
pub mod handler;
pub mod runtime;
pub mod workflow;

// Re-export commonly used types
pub use config::{Config, RenderDefaults};
pub use engine::{CompletionRecord, EngineClient, EngineError, HttpEngineClient, PollConfig};
pub use handler::{JobEnvelope, RenderMeta, RequestHandler};
pub use workflow::{GenerationParams, TemplateBindings, TemplateStore, Workflow};
