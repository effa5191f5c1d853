use std::time::Duration;

use crate::error::{ClientError, Result};

pub const HEALTH_PATH: &str = "/health";
pub const GLOBAL_MODEL_PATH: &str = "/api/get-global-model";
pub const CURRENT_ROUND_PATH: &str = "/api/get-current-round";
pub const SEND_LOCAL_MODEL_PATH: &str = "/api/send-local-model";

/// Builds the shared HTTP client. Every request it issues is bounded by `timeout`.
///
/// # Errors
/// Returns `ClientError::InvalidConfig` if the client cannot be constructed.
pub fn client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ClientError::InvalidConfig(format!("cannot build http client: {e}")))
}

/// Builds the client used for streamed transfers.
///
/// `timeout` bounds connecting and each individual read rather than the whole
/// transfer, so a large model that keeps flowing is never cut off.
///
/// # Errors
/// Returns `ClientError::InvalidConfig` if the client cannot be constructed.
pub fn streaming_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(timeout)
        .read_timeout(timeout)
        .build()
        .map_err(|e| ClientError::InvalidConfig(format!("cannot build http client: {e}")))
}

/// Joins a collaborator base url and an endpoint path.
pub fn endpoint(base: &str, path: &str) -> String {
    format!("{}{path}", base.trim_end_matches('/'))
}
