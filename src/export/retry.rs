use anyhow::{anyhow, Result};
use reqwest::{RequestBuilder, Response};
use std::time::Duration;
use tracing::warn;

pub(crate) const MAX_ATTEMPTS: u32 = 3;
const BACKOFF_STEP: Duration = Duration::from_secs(2);

/// Wait before the attempt following `attempt` (1-based).
pub(crate) fn backoff(attempt: u32) -> Duration {
    BACKOFF_STEP * attempt
}

/// Sends the request built by `build` with a fixed attempt cap and linearly
/// growing backoff. Transport errors and 5xx responses are retried; any other
/// response is returned as is.
pub(crate) async fn send_with_retry<F>(what: &str, build: F) -> Result<Response>
where
    F: Fn() -> RequestBuilder,
{
    let mut last_err = None;
    for attempt in 1..=MAX_ATTEMPTS {
        match build().send().await {
            Ok(resp) if !resp.status().is_server_error() => return Ok(resp),
            Ok(resp) => last_err = Some(anyhow!("{} returned {}", what, resp.status())),
            Err(e) => last_err = Some(anyhow!(e).context(format!("{} request failed", what))),
        }
        if attempt < MAX_ATTEMPTS {
            let wait = backoff(attempt);
            warn!(
                "{} failed, retrying in {}s (attempt {}/{})",
                what,
                wait.as_secs(),
                attempt,
                MAX_ATTEMPTS
            );
            tokio::time::sleep(wait).await;
        }
    }
    Err(last_err.unwrap_or_else(|| anyhow!("{} failed", what)))
}
