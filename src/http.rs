// Shared blocking HTTP helpers for the embedding, chat and web clients

use std::time::Duration;

use anyhow::{Result, anyhow};
use tracing::{debug, error, warn};

const EXPONENTIAL_BACKOFF_BASE: u64 = 2;
const BACKOFF_UNIT_MS: u64 = 1000;

/// Build a `ureq` agent with a global timeout
pub(crate) fn agent_with_timeout(timeout: Duration, user_agent: Option<&str>) -> ureq::Agent {
    let builder = ureq::Agent::config_builder().timeout_global(Some(timeout));
    match user_agent {
        Some(user_agent) => builder.user_agent(user_agent).build().into(),
        None => builder.build().into(),
    }
}

/// Run `request_fn` up to `attempts` times.
///
/// Server errors (5xx) and transport failures are retried with exponential backoff,
/// client errors (4xx) fail immediately.
pub(crate) fn request_with_retry<F>(
    target: &str,
    attempts: u32,
    mut request_fn: F,
) -> Result<String>
where
    F: FnMut() -> Result<String, ureq::Error>,
{
    let attempts = attempts.max(1);
    let mut last_error = None;

    for attempt in 1..=attempts {
        debug!("HTTP request attempt {}/{} to {}", attempt, attempts, target);

        match request_fn() {
            Ok(response_text) => {
                debug!("Request succeeded on attempt {}", attempt);
                return Ok(response_text);
            }
            Err(error) => {
                let should_retry = match &error {
                    ureq::Error::StatusCode(status) => {
                        if *status >= 500 {
                            warn!(
                                "Server error (status {}), attempt {}/{}",
                                status, attempt, attempts
                            );
                            true
                        } else {
                            warn!("Client error (status {}), not retrying", status);
                            return Err(anyhow!("Client error: HTTP {}", status));
                        }
                    }
                    ureq::Error::ConnectionFailed
                    | ureq::Error::HostNotFound
                    | ureq::Error::Timeout(_)
                    | ureq::Error::Io(_) => {
                        warn!(
                            "Transport error: {}, attempt {}/{}",
                            error, attempt, attempts
                        );
                        true
                    }
                    _ => {
                        warn!("Non-retryable error: {}", error);
                        false
                    }
                };

                if !should_retry {
                    return Err(anyhow!("Non-retryable error: {}", error));
                }

                last_error = Some(anyhow!("Request error: {}", error));

                if attempt < attempts {
                    let delay_ms = EXPONENTIAL_BACKOFF_BASE.pow(attempt - 1) * BACKOFF_UNIT_MS;
                    let delay = Duration::from_millis(delay_ms);
                    debug!("Waiting {:?} before retry", delay);
                    std::thread::sleep(delay);
                }
            }
        }
    }

    error!("All {} attempts failed for request to {}", attempts, target);

    Err(last_error.unwrap_or_else(|| anyhow!("Request failed after retries")))
}
