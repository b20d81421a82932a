//! Command-line interface

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};
use commands::{GenerateCommand, ServeCommand, ValidateCommand, WaitCommand};

/// Job adapter for a local ComfyUI rendering engine
#[derive(Debug, Parser, Clone)]
#[command(name = "comfy-relay")]
#[command(version = "0.1.0")]
#[command(about = "Job adapter for a local ComfyUI rendering engine", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available commands
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the worker loop (one job per stdin line)
    Serve(ServeCommand),

    /// Run a single generation request
    Generate(GenerateCommand),

    /// Wait until the engine is ready
    Wait(WaitCommand),

    /// Validate a workflow template
    Validate(ValidateCommand),
}

impl Cli {
    /// Parse CLI arguments from environment
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Parse CLI arguments from a slice
    pub fn try_parse_from<I, T>(itr: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(itr)
    }
}

use std::ffi::OsString;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_wait_with_timeout() {
        let cli = Cli::try_parse_from(["comfy-relay", "wait", "--timeout", "30"]).unwrap();
        match cli.command {
            Command::Wait(cmd) => assert_eq!(cmd.timeout, 30),
            _ => panic!("expected wait command"),
        }
    }

    #[test]
    fn test_parse_serve_defaults() {
        let cli = Cli::try_parse_from(["comfy-relay", "serve"]).unwrap();
        match cli.command {
            Command::Serve(cmd) => assert_eq!(cmd.poll_timeout, 600),
            _ => panic!("expected serve command"),
        }
    }

    #[test]
    fn test_verbose_is_global() {
        let cli = Cli::try_parse_from(["comfy-relay", "serve", "--verbose"]).unwrap();
        assert!(cli.verbose);
    }
}
