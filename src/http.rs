//! HTTP plumbing shared by the NetBox and DigitalOcean clients.

use reqwest::{Client, RequestBuilder, Response, header};
use serde::de::DeserializeOwned;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, trace};

use crate::error::ApiError;
use crate::planner::RetryPolicy;
use crate::resource::System;

/// User agent sent with every request.
const USER_AGENT: &str = concat!("netbox-do-sync/", env!("CARGO_PKG_VERSION"));

/// Builds an HTTP client with a per-call timeout.
pub fn build_client(system: System, timeout: Duration) -> Result<Client, ApiError> {
    Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| ApiError::Network {
            system,
            message: format!("Failed to create HTTP client: {e}"),
        })
}

/// Sends a request and maps unsuccessful statuses to errors.
pub async fn send(system: System, request: RequestBuilder) -> Result<Response, ApiError> {
    let response = request
        .header(header::ACCEPT, "application/json")
        .send()
        .await
        .map_err(|e| ApiError::from_transport(system, &e))?;

    let status = response.status();
    trace!("{system} responded {status} for {}", response.url());

    if status.is_success() {
        return Ok(response);
    }

    let retry_after = response
        .headers()
        .get(header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse().ok());
    let url = response.url().to_string();
    let body = response.text().await.unwrap_or_default();
    let body = if body.is_empty() { url } else { body };

    Err(ApiError::from_status(system, status.as_u16(), body, retry_after))
}

/// Decodes a JSON response body.
pub async fn json<T: DeserializeOwned>(system: System, response: Response) -> Result<T, ApiError> {
    response
        .json()
        .await
        .map_err(|e| ApiError::invalid(system, format!("Failed to parse response: {e}")))
}

/// Runs an idempotent call, retrying transient failures.
pub async fn with_retry<T, F, Fut>(
    system: System,
    policy: &RetryPolicy,
    mut call: F,
) -> Result<T, ApiError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match call().await {
            Err(e) if e.is_transient() && attempt < max_attempts => {
                let delay = policy.delay_for(attempt, &e);
                debug!("{system} read failed (attempt {attempt}/{max_attempts}), retrying in {delay:?}: {e}");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            result => return result,
        }
    }
}
