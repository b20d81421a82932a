//! Readiness probing and completion polling

use super::{CompletionRecord, EngineClient, EngineError};
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::debug;

/// Interval between liveness probes.
pub const READY_INTERVAL: Duration = Duration::from_secs(1);

/// Interval between history lookups.
pub const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Default deadline for one job to reach a terminal record.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(600);

/// Timing knobs for completion polling.
#[derive(Debug, Clone)]
pub struct PollConfig {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: POLL_INTERVAL,
            timeout: DEFAULT_POLL_TIMEOUT,
        }
    }
}

impl PollConfig {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Self::default()
        }
    }
}

/// Wait until the liveness endpoint answers, or the timeout elapses.
/// Transport errors mean "not ready yet" and are never surfaced.
pub async fn wait_ready<C>(client: &C, timeout: Duration, interval: Duration) -> bool
where
    C: EngineClient + ?Sized,
{
    let start = Instant::now();
    while start.elapsed() < timeout {
        match client.system_stats().await {
            Ok(()) => {
                debug!("engine ready after {}s", start.elapsed().as_secs());
                return true;
            }
            Err(err) => debug!("engine not ready yet: {err}"),
        }
        sleep(interval).await;
    }
    false
}

/// Poll the history endpoint until a terminal record for `prompt_id`
/// appears. The deadline is wall-clock and re-checked each iteration;
/// transient transport faults are swallowed and retried.
pub async fn poll_completion<C>(
    client: &C,
    prompt_id: &str,
    config: &PollConfig,
) -> Result<CompletionRecord, EngineError>
where
    C: EngineClient + ?Sized,
{
    let start = Instant::now();
    while start.elapsed() < config.timeout {
        match client.history(prompt_id).await {
            Ok(Some(record)) => return Ok(record),
            Ok(None) => debug!("job {prompt_id} still running"),
            Err(err) => debug!("history poll failed, will retry: {err}"),
        }
        sleep(config.interval).await;
    }

    Err(EngineError::Timeout {
        prompt_id: prompt_id.to_string(),
        elapsed_secs: start.elapsed().as_secs(),
    })
}
