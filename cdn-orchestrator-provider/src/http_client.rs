//! Generic HTTP execution
//!
//! Sends an already-signed [`reqwest::Request`], maps transport failures to
//! [`ProviderError`] and retries transient ones. Signing stays with the caller:
//! the retry loop asks for a freshly built and signed request on every attempt.

use reqwest::{Client, Request};
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::error::{ProviderError, Result};
use crate::utils::log_sanitizer::truncate_for_log;

/// HTTP tool function set
pub struct HttpUtils;

impl HttpUtils {
    /// Send one request and return `(status, body)`.
    ///
    /// - timeout → [`ProviderError::Timeout`]
    /// - other send failures → [`ProviderError::NetworkError`]
    /// - HTTP 429 → [`ProviderError::RateLimited`]
    /// - HTTP 502/503/504 → [`ProviderError::HttpStatus`] (retryable)
    ///
    /// Other statuses are returned as-is for envelope decoding.
    pub async fn execute_request(
        client: &Client,
        request: Request,
        provider_name: &str,
    ) -> Result<(u16, String)> {
        log::debug!("[{provider_name}] {} {}", request.method(), request.url());

        let response = client.execute(request).await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout {
                    provider: provider_name.to_string(),
                    detail: e.to_string(),
                }
            } else {
                ProviderError::NetworkError {
                    provider: provider_name.to_string(),
                    detail: e.to_string(),
                }
            }
        })?;

        let status_code = response.status().as_u16();
        log::debug!("[{provider_name}] Response Status: {status_code}");

        // Extract Retry-After header (before consuming response body)
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());

        if status_code == 429 {
            let body = response.text().await.unwrap_or_default();
            log::warn!("[{provider_name}] Rate limited (HTTP 429), retry_after={retry_after:?}");
            return Err(ProviderError::RateLimited {
                provider: provider_name.to_string(),
                retry_after,
                raw_message: Some(truncate_for_log(&body)),
            });
        }

        if matches!(status_code, 502..=504) {
            let body = response.text().await.unwrap_or_default();
            log::warn!("[{provider_name}] Gateway error (HTTP {status_code})");
            return Err(ProviderError::HttpStatus {
                provider: provider_name.to_string(),
                status: status_code,
                body: truncate_for_log(&body),
            });
        }

        let response_text = response
            .text()
            .await
            .map_err(|e| ProviderError::NetworkError {
                provider: provider_name.to_string(),
                detail: format!("Failed to read response body: {e}"),
            })?;

        log::debug!(
            "[{provider_name}] Response Body: {}",
            truncate_for_log(&response_text)
        );

        Ok((status_code, response_text))
    }

    /// Parse a JSON body, mapping failures to [`ProviderError::ParseError`].
    pub fn parse_json<T>(response_text: &str, provider_name: &str) -> Result<T>
    where
        T: DeserializeOwned,
    {
        serde_json::from_str(response_text).map_err(|e| {
            log::error!("[{provider_name}] JSON parse failed: {e}");
            log::error!(
                "[{provider_name}] Raw response: {}",
                truncate_for_log(response_text)
            );
            ProviderError::ParseError {
                provider: provider_name.to_string(),
                detail: e.to_string(),
            }
        })
    }

    /// Run `build` and send its request, retrying transient failures.
    ///
    /// `build` receives the attempt number (0-based) and must return a fully
    /// signed request; it is called again for every retry so each attempt
    /// carries a fresh timestamp and signature. Errors from `build` itself are
    /// returned immediately.
    ///
    /// # Retry strategy
    /// - Only [`ProviderError::is_retryable`] errors are retried
    /// - Exponential backoff: 100ms, 200ms, 400ms, ... (maximum 10 seconds)
    /// - `Retry-After` on HTTP 429 is honoured (maximum 30 seconds)
    pub async fn execute_with_retry<F>(
        client: &Client,
        provider_name: &str,
        max_retries: u32,
        mut build: F,
    ) -> Result<(u16, String)>
    where
        F: FnMut(u32) -> Result<Request>,
    {
        let mut attempt = 0;
        loop {
            let request = build(attempt)?;
            match Self::execute_request(client, request, provider_name).await {
                Ok(resp) => return Ok(resp),
                Err(e) if attempt < max_retries && e.is_retryable() => {
                    let delay = retry_delay(&e, attempt);
                    log::warn!(
                        "[{}] Request failed (attempt {}/{}), retrying in {:.1}s: {}",
                        provider_name,
                        attempt + 1,
                        max_retries + 1,
                        delay.as_secs_f32(),
                        e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// `Retry-After` (capped at 30s) for rate limiting, exponential backoff otherwise.
fn retry_delay(error: &ProviderError, attempt: u32) -> Duration {
    if let ProviderError::RateLimited {
        retry_after: Some(secs),
        ..
    } = error
    {
        Duration::from_secs((*secs).min(30))
    } else {
        backoff_delay(attempt)
    }
}

/// 100ms, 200ms, 400ms, 800ms, 1.6s, ... capped at 10 seconds.
fn backoff_delay(attempt: u32) -> Duration {
    let capped_attempt = attempt.min(20); // Prevent 2^attempt from overflowing
    let delay_ms = 100_u64.saturating_mul(1_u64 << capped_attempt);
    Duration::from_millis(delay_ms.min(10_000))
}
