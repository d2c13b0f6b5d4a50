// providers/ - Upstream AI services
//
// Each provider is a thin blocking client over one upstream API: one
// request per user action, no retry loop. A 429 maps to RateLimited
// and fails fast so the caller can fall back instead of stalling
// against a throttle.

pub mod gemini;
pub mod meshy;
pub mod midas;
pub mod pollinations;
pub mod stability;

use std::time::Duration;

use reqwest::blocking::{Client, Response};
use reqwest::{header, StatusCode};

use crate::error::{ReliefError, Result};

/// Suggested wait when the upstream gives no Retry-After header.
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

pub(crate) fn http_client(timeout: Duration) -> Result<Client> {
    Ok(Client::builder().timeout(timeout).build()?)
}

/// Map a non-success upstream response into the error taxonomy.
pub(crate) fn upstream_error(provider: &'static str, response: Response) -> ReliefError {
    let status = response.status();
    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after_secs = response
            .headers()
            .get(header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
        return ReliefError::RateLimited {
            provider,
            retry_after_secs,
        };
    }
    let message = response.text().unwrap_or_else(|e| e.to_string());
    ReliefError::Upstream {
        provider,
        status: Some(status.as_u16()),
        message,
    }
}

/// GET a URL and materialize the body bytes.
pub(crate) fn fetch_bytes(client: &Client, url: &str, provider: &'static str) -> Result<Vec<u8>> {
    let response = client.get(url).send()?;
    if !response.status().is_success() {
        return Err(upstream_error(provider, response));
    }
    Ok(response.bytes()?.to_vec())
}
