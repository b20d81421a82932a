//! CLI command definitions

use clap::Args;

/// Run the worker loop
#[derive(Debug, Args, Clone)]
pub struct ServeCommand {
    /// Seconds to wait for a job to complete before abandoning it
    #[arg(long, default_value_t = 600)]
    pub poll_timeout: u64,
}

/// One-shot generation request against the configured engine
#[derive(Debug, Args, Clone)]
pub struct GenerateCommand {
    /// Path to a JSON document with request parameters
    #[arg(short, long)]
    pub input: Option<String>,

    /// Positive prompt (overrides the one from --input)
    #[arg(short, long)]
    pub prompt: Option<String>,

    /// Write the decoded artifact bytes to this path
    #[arg(short, long)]
    pub output: Option<String>,

    /// Seconds to wait for completion
    #[arg(long, default_value_t = 600)]
    pub poll_timeout: u64,

    /// Print the full response envelope as JSON
    #[arg(long)]
    pub json: bool,
}

/// Wait until the engine is ready
#[derive(Debug, Args, Clone)]
pub struct WaitCommand {
    /// Seconds to wait before giving up
    #[arg(short, long, default_value_t = 180)]
    pub timeout: u64,
}

/// Validate a workflow template and show its resolved bindings
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Template path (defaults to the configured resolution order)
    #[arg(short, long)]
    pub file: Option<String>,

    /// Also print the parsed template as JSON
    #[arg(long)]
    pub json: bool,
}
