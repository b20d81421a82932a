//! Process configuration, read once from the environment at startup

use anyhow::{Context, Result};
use std::env;
use std::str::FromStr;

pub const DEFAULT_ENGINE_URL: &str = "http://127.0.0.1:8188";

/// Default template location when `WORKFLOW_JSON` does not resolve.
pub const DEFAULT_TEMPLATE_PATH: &str = "workflow_api.json";

/// Values applied when a request omits the corresponding parameter.
#[derive(Debug, Clone)]
pub struct RenderDefaults {
    pub checkpoint: String,
    pub accel_adapter: String,
    pub accel_strength: f64,
    pub steps: u32,
    pub cfg: f64,
    pub sampler: String,
    pub scheduler: String,
}

impl Default for RenderDefaults {
    fn default() -> Self {
        Self {
            checkpoint: "bigLust_v16.safetensors".to_string(),
            accel_adapter: "dmd2_sdxl_4step_lora.safetensors".to_string(),
            accel_strength: 0.7,
            steps: 10,
            cfg: 1.0,
            sampler: "lcm".to_string(),
            scheduler: "karras".to_string(),
        }
    }
}

/// Full process configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub engine_url: String,
    pub defaults: RenderDefaults,
    /// `WORKFLOW_JSON`: an inline template document or a path to one.
    pub workflow_override: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            engine_url: DEFAULT_ENGINE_URL.to_string(),
            defaults: RenderDefaults::default(),
            workflow_override: None,
        }
    }
}

impl Config {
    /// Read configuration from the process environment. Unset or empty
    /// variables fall back to the built-in defaults; a set-but-unparsable
    /// numeric variable is a deployment fault and fails startup.
    pub fn from_env() -> Result<Self> {
        let fallback = RenderDefaults::default();
        let defaults = RenderDefaults {
            checkpoint: env_string("CKPT_NAME", &fallback.checkpoint),
            accel_adapter: env_string("DMD2_LORA", &fallback.accel_adapter),
            accel_strength: env_parsed("DMD2_STRENGTH", fallback.accel_strength)?,
            steps: env_parsed("DEFAULT_STEPS", fallback.steps)?,
            cfg: env_parsed("DEFAULT_CFG", fallback.cfg)?,
            sampler: env_string("DEFAULT_SAMPLER", &fallback.sampler),
            scheduler: env_string("DEFAULT_SCHEDULER", &fallback.scheduler),
        };

        Ok(Self {
            engine_url: env_string("COMFY_URL", DEFAULT_ENGINE_URL),
            defaults,
            workflow_override: env::var("WORKFLOW_JSON")
                .ok()
                .filter(|value| !value.trim().is_empty()),
        })
    }
}

fn env_string(key: &str, default: &str) -> String {
    env::var(key)
        .ok()
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_parsed<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) if !raw.is_empty() => raw
            .parse::<T>()
            .with_context(|| format!("invalid value for {key}: {raw:?}")),
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_defaults() {
        let defaults = RenderDefaults::default();
        assert_eq!(defaults.steps, 10);
        assert_eq!(defaults.cfg, 1.0);
        assert_eq!(defaults.accel_strength, 0.7);
        assert_eq!(defaults.sampler, "lcm");
        assert_eq!(defaults.scheduler, "karras");
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.engine_url, DEFAULT_ENGINE_URL);
        assert!(config.workflow_override.is_none());
    }
}
