use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use comfy_relay::cli::commands::{GenerateCommand, ValidateCommand, WaitCommand};
use comfy_relay::cli::output::{create_spinner, style, CHECK, CROSS, INFO};
use comfy_relay::cli::{Cli, Command};
use comfy_relay::config::Config;
use comfy_relay::engine::{poll, wait_ready, HttpEngineClient, PollConfig};
use comfy_relay::handler::{JobEnvelope, RequestHandler};
use comfy_relay::runtime;
use comfy_relay::workflow::TemplateStore;
use std::time::Duration;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::from_args();

    // Initialize logging
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set logging subscriber")?;

    let config = Config::from_env().context("Failed to read configuration from environment")?;

    // Execute command
    match &cli.command {
        Command::Serve(cmd) => {
            let handler = build_handler(&config, cmd.poll_timeout);
            runtime::serve(&handler).await?;
        }
        Command::Generate(cmd) => run_generate(cmd, &config).await?,
        Command::Wait(cmd) => run_wait(cmd, &config).await,
        Command::Validate(cmd) => run_validate(cmd, &config)?,
    }

    Ok(())
}

fn build_handler(config: &Config, poll_timeout: u64) -> RequestHandler<HttpEngineClient> {
    let client = HttpEngineClient::new(&config.engine_url);
    let store = TemplateStore::from_config(config);
    let poll = PollConfig::with_timeout(Duration::from_secs(poll_timeout));
    RequestHandler::new(client, store, config.defaults.clone()).with_poll(poll)
}

async fn run_generate(cmd: &GenerateCommand, config: &Config) -> Result<()> {
    let mut input: serde_json::Value = match &cmd.input {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read input file {path}"))?;
            serde_json::from_str(&text).with_context(|| format!("Invalid JSON in {path}"))?
        }
        None => serde_json::json!({}),
    };
    let Some(fields) = input.as_object_mut() else {
        anyhow::bail!("input document must be a JSON object");
    };
    if let Some(prompt) = &cmd.prompt {
        fields.insert(
            "prompt".to_string(),
            serde_json::Value::String(prompt.clone()),
        );
    }

    let handler = build_handler(config, cmd.poll_timeout);

    let spinner = create_spinner("Rendering...");
    let envelope = handler.handle(&input).await;
    spinner.finish_and_clear();

    match &envelope {
        JobEnvelope::Success {
            image_base64,
            prompt_id,
            meta,
        } => {
            println!(
                "{} Job {} finished: {} ({}x{}, seed {})",
                CHECK,
                style(prompt_id).bold(),
                style(&meta.filename).cyan(),
                meta.width,
                meta.height,
                meta.seed
            );

            if let Some(path) = &cmd.output {
                let bytes = BASE64
                    .decode(image_base64)
                    .context("Failed to decode artifact from envelope")?;
                std::fs::write(path, &bytes)
                    .with_context(|| format!("Failed to write artifact to {path}"))?;
                println!("{} Wrote {} bytes to {}", INFO, bytes.len(), style(path).bold());
            }

            if cmd.json {
                println!("{}", serde_json::to_string_pretty(&envelope)?);
            }
            Ok(())
        }
        JobEnvelope::Error { error } => {
            println!("{} Generation failed: {}", CROSS, style(error).red());
            std::process::exit(1);
        }
    }
}

async fn run_wait(cmd: &WaitCommand, config: &Config) {
    let client = HttpEngineClient::new(&config.engine_url);
    println!(
        "{} Waiting for engine at {}...",
        INFO,
        style(&config.engine_url).bold()
    );

    let ready = wait_ready(
        &client,
        Duration::from_secs(cmd.timeout),
        poll::READY_INTERVAL,
    )
    .await;

    if ready {
        println!("{} Engine is ready", CHECK);
    } else {
        println!("{} Engine not ready after {}s", CROSS, cmd.timeout);
        std::process::exit(1);
    }
}

fn run_validate(cmd: &ValidateCommand, config: &Config) -> Result<()> {
    println!("{} Validating workflow template...", INFO);

    let store = match &cmd.file {
        Some(path) => TemplateStore::new(None, path),
        None => TemplateStore::from_config(config),
    };

    match store.load() {
        Ok(loaded) => {
            println!(
                "{} Workflow template is valid ({} nodes)",
                CHECK,
                style(loaded.workflow.len()).cyan()
            );
            let b = &loaded.bindings;
            println!("  checkpoint:        {}", style(&b.checkpoint).bold());
            println!("  accel adapter:     {}", style(&b.accel_adapter).bold());
            println!("  character adapter: {}", style(&b.character_adapter).bold());
            println!("  latent size:       {}", style(&b.latent).bold());
            println!("  positive text:     {}", style(&b.positive).bold());
            println!("  negative text:     {}", style(&b.negative).bold());
            println!(
                "  sampler:           {} (seed input '{}')",
                style(&b.sampler).bold(),
                b.seed_input
            );
            println!("  save image:        {}", style(&b.save).bold());

            if cmd.json {
                println!("\n{}", serde_json::to_string_pretty(&loaded.workflow)?);
            }
            Ok(())
        }
        Err(e) => {
            println!("{} Validation failed:", CROSS);
            println!("  {}", style(e).red());
            std::process::exit(1);
        }
    }
}
