//! Load-once store for the reference workflow template

use super::{BindingError, TemplateBindings, Workflow};
use crate::config::{Config, DEFAULT_TEMPLATE_PATH};
use once_cell::sync::OnceCell;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("no workflow template at {} and no usable WORKFLOW_JSON override", path.display())]
    NotFound { path: PathBuf },

    #[error("failed to read workflow template {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse workflow template from {origin}: {source}")]
    Parse {
        origin: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Binding(#[from] BindingError),
}

/// A parsed template together with its resolved schema bindings.
#[derive(Debug, Clone)]
pub struct LoadedTemplate {
    pub workflow: Workflow,
    pub bindings: TemplateBindings,
}

/// Loads the reference workflow at most once per process. The first
/// successful load wins; later calls return the cached value without
/// re-reading the source, even if it changed on disk.
#[derive(Debug)]
pub struct TemplateStore {
    override_spec: Option<String>,
    default_path: PathBuf,
    cell: OnceCell<LoadedTemplate>,
}

impl TemplateStore {
    pub fn new(override_spec: Option<String>, default_path: impl Into<PathBuf>) -> Self {
        Self {
            override_spec,
            default_path: default_path.into(),
            cell: OnceCell::new(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.workflow_override.clone(), DEFAULT_TEMPLATE_PATH)
    }

    pub fn load(&self) -> Result<&LoadedTemplate, TemplateError> {
        self.cell.get_or_try_init(|| self.load_uncached())
    }

    fn load_uncached(&self) -> Result<LoadedTemplate, TemplateError> {
        let (workflow, origin) = self.read_source()?;
        let bindings = TemplateBindings::resolve(&workflow)?;
        info!("loaded workflow template from {origin}");
        Ok(LoadedTemplate { workflow, bindings })
    }

    /// Resolution order: inline override document, override path, default path.
    fn read_source(&self) -> Result<(Workflow, String), TemplateError> {
        if let Some(spec) = &self.override_spec {
            if spec.trim_start().starts_with('{') {
                let origin = "inline WORKFLOW_JSON".to_string();
                return Ok((parse(spec, &origin)?, origin));
            }
            let path = Path::new(spec);
            if path.is_file() {
                let origin = format!("WORKFLOW_JSON path {}", path.display());
                return Ok((read_file(path)?, origin));
            }
        }
        if self.default_path.is_file() {
            let origin = self.default_path.display().to_string();
            return Ok((read_file(&self.default_path)?, origin));
        }
        Err(TemplateError::NotFound {
            path: self.default_path.clone(),
        })
    }
}

fn read_file(path: &Path) -> Result<Workflow, TemplateError> {
    let text = std::fs::read_to_string(path).map_err(|source| TemplateError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse(&text, &path.display().to_string())
}

fn parse(text: &str, origin: &str) -> Result<Workflow, TemplateError> {
    serde_json::from_str(text).map_err(|source| TemplateError::Parse {
        origin: origin.to_string(),
        source,
    })
}
