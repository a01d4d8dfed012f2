//! JSON fetching from package indexes.

use std::time::Duration;

use reqwest::blocking::Client;
use serde::de::DeserializeOwned;

use crate::error::{RepositoryError, RepositoryInitializationError};

const MAX_RETRIES: u32 = 3;
const RETRY_DELAY: Duration = Duration::from_millis(500);

/// Build a blocking client for index requests.
pub fn build_client(timeout: Duration) -> Result<Client, RepositoryInitializationError> {
    Client::builder()
        .timeout(timeout)
        .user_agent(concat!("reqpin/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| RepositoryInitializationError::Client {
            message: e.to_string(),
        })
}

/// Fetch and decode a JSON document, retrying server errors and timeouts.
///
/// Returns `Ok(None)` for 404 (not published on this index).
pub fn fetch_json<T: DeserializeOwned>(client: &Client, url: &str) -> Result<Option<T>, RepositoryError> {
    let network = |message: String| RepositoryError::Network {
        url: url.to_string(),
        message,
    };
    let mut last_err = String::new();

    for attempt in 0..MAX_RETRIES {
        if attempt > 0 {
            tracing::debug!("retrying {url} (attempt {})", attempt + 1);
            std::thread::sleep(RETRY_DELAY * attempt);
        }

        match client.get(url).send() {
            Ok(resp) => {
                let status = resp.status();
                if status == reqwest::StatusCode::NOT_FOUND {
                    return Ok(None);
                }
                if status.is_server_error() {
                    last_err = format!("HTTP {status}");
                    continue;
                }
                if !status.is_success() {
                    return Err(network(format!("HTTP {status}")));
                }
                let body = resp
                    .json::<T>()
                    .map_err(|e| network(format!("invalid response: {e}")))?;
                return Ok(Some(body));
            }
            Err(e) if e.is_timeout() || e.is_connect() => {
                last_err = e.to_string();
                continue;
            }
            Err(e) => return Err(network(e.to_string())),
        }
    }

    Err(network(format!("failed after {MAX_RETRIES} attempts: {last_err}")))
}
