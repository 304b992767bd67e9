//! Shared outbound HTTP plumbing: per-client rate limiting, exponential
//! retry on transient failures and status classification.

use backoff::{future::retry, ExponentialBackoffBuilder};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::{RequestBuilder, Response, StatusCode};
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::{Capability, CapabilityError};

pub(crate) struct Transport {
    client: reqwest::Client,
    limiter: Arc<DefaultDirectRateLimiter>,
    capability: Capability,
    max_retries: u32,
}

impl Transport {
    pub(crate) fn new(
        capability: Capability,
        timeout_secs: u64,
        requests_per_second: u32,
        max_retries: u32,
    ) -> Result<Self, CapabilityError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(concat!("papertrail/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| CapabilityError::unavailable(capability, format!("HTTP client: {}", e)))?;

        let rps = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);

        Ok(Self {
            client,
            limiter: Arc::new(RateLimiter::direct(Quota::per_second(rps))),
            capability,
            max_retries,
        })
    }

    pub(crate) fn capability(&self) -> Capability {
        self.capability
    }

    /// Send the request produced by `build`, retrying transient failures.
    ///
    /// A non-success status becomes an error; 404 maps to `NotFound` with
    /// `reference` as its subject.
    pub(crate) async fn send<F>(&self, reference: &str, build: F) -> Result<Response, CapabilityError>
    where
        F: Fn(&reqwest::Client) -> RequestBuilder,
    {
        let policy = ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(250))
            .with_max_interval(Duration::from_secs(8))
            .with_max_elapsed_time(Some(Duration::from_secs(60)))
            .build();
        let attempts = AtomicU32::new(0);

        let client = &self.client;
        let limiter = &self.limiter;
        let attempts = &attempts;
        let build = &build;
        let capability = self.capability;
        let max_retries = self.max_retries;

        retry(policy, || async move {
            limiter.until_ready().await;
            let attempt = attempts.fetch_add(1, Ordering::Relaxed);

            let outcome = match build(client).send().await {
                Ok(response) => classify(capability, reference, response).await,
                Err(e) => Err(CapabilityError::unavailable(capability, e.to_string())),
            };

            match outcome {
                Ok(response) => Ok(response),
                Err(e) if e.is_transient() && attempt < max_retries => {
                    tracing::warn!(
                        capability = %capability,
                        attempt = attempt + 1,
                        max_retries = max_retries,
                        error = %e,
                        "Capability request failed, retrying"
                    );
                    Err(backoff::Error::transient(e))
                }
                Err(e) => Err(backoff::Error::permanent(e)),
            }
        })
        .await
    }

    /// Send and decode a JSON body
    pub(crate) async fn send_json<T, F>(&self, reference: &str, build: F) -> Result<T, CapabilityError>
    where
        T: serde::de::DeserializeOwned,
        F: Fn(&reqwest::Client) -> RequestBuilder,
    {
        let response = self.send(reference, build).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| CapabilityError::malformed(self.capability, e.to_string()))
    }
}

async fn classify(
    capability: Capability,
    reference: &str,
    response: Response,
) -> Result<Response, CapabilityError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    match status {
        StatusCode::TOO_MANY_REQUESTS => Err(CapabilityError::RateLimited { capability }),
        StatusCode::NOT_FOUND => Err(CapabilityError::NotFound {
            capability,
            reference: reference.to_string(),
        }),
        s if s.is_server_error() => Err(CapabilityError::unavailable(
            capability,
            format!("upstream status {}", s),
        )),
        s => {
            let body = response.text().await.unwrap_or_default();
            Err(CapabilityError::malformed(
                capability,
                format!("rejected with status {}: {}", s, truncate(&body, 200)),
            ))
        }
    }
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "hé");
        assert_eq!(truncate("abc", 10), "abc");
    }

    #[test]
    fn test_zero_rate_is_clamped() {
        let transport = Transport::new(Capability::Search, 5, 0, 1);
        assert!(transport.is_ok());
    }
}
