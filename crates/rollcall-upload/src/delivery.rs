use std::time::Duration;

use rollcall_core::DeliveryOptions;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::{AttemptError, DeliveryError};

/// Bounded retry with a fixed pause between attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub delay: Duration,
    /// Per-attempt request timeout.
    pub timeout: Duration,
    /// When false, a 4xx answer ends the loop without further attempts.
    pub retry_client_errors: bool,
}

impl RetryPolicy {
    pub fn from_options(options: &DeliveryOptions) -> Self {
        Self {
            max_attempts: options.max_retries.max(1),
            delay: options.retry_delay,
            timeout: options.timeout,
            retry_client_errors: options.retry_client_errors,
        }
    }
}

/// The JSON body sent to the collector: `metadata`'s fields plus `data`.
#[derive(Debug, Serialize)]
pub struct Envelope<'a, M, T> {
    #[serde(flatten)]
    pub metadata: &'a M,
    pub data: &'a [T],
}

/// A successful attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delivered {
    pub status: u16,
    /// 1-based number of the attempt that succeeded.
    pub attempt: u32,
}

/// POST `{...metadata, data: rows}` to `endpoint`, retrying failed attempts.
///
/// Transport errors and non-2xx answers both count as failed attempts.
pub async fn deliver<M, T>(
    client: &reqwest::Client,
    endpoint: &str,
    metadata: &M,
    rows: &[T],
    policy: &RetryPolicy,
) -> Result<Delivered, DeliveryError>
where
    M: Serialize + Sync,
    T: Serialize + Sync,
{
    let envelope = Envelope {
        metadata,
        data: rows,
    };
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        let error = match post_once(client, endpoint, &envelope, policy.timeout).await {
            Ok(status) => {
                info!(endpoint, status, attempt, records = rows.len(), "payload delivered");
                return Ok(Delivered { status, attempt });
            }
            Err(e) => e,
        };

        warn!(endpoint, attempt, max = max_attempts, error = %error, "delivery attempt failed");

        let give_up = attempt >= max_attempts
            || (!policy.retry_client_errors && error.is_client_error());
        if give_up {
            return Err(DeliveryError {
                attempts: attempt,
                source: error,
            });
        }
        tokio::time::sleep(policy.delay).await;
    }
}

async fn post_once<B: Serialize + ?Sized>(
    client: &reqwest::Client,
    endpoint: &str,
    body: &B,
    timeout: Duration,
) -> Result<u16, AttemptError> {
    let resp = client
        .post(endpoint)
        .timeout(timeout)
        .json(body)
        .send()
        .await?;
    let status = resp.status();
    if status.is_success() {
        Ok(status.as_u16())
    } else {
        Err(AttemptError::Status {
            status: status.as_u16(),
        })
    }
}
