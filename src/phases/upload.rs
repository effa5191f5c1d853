use log::debug;
use reqwest::multipart::{Form, Part};

use super::Reporter;
use crate::{
    error::PhaseError,
    http::{self, SEND_LOCAL_MODEL_PATH},
};

/// Fields of a single model upload, besides the weights themselves.
#[derive(Debug, Clone, Copy)]
pub struct UploadRequest<'a> {
    pub client_id: &'a str,
    pub round: u64,
    pub server_url: &'a str,
    pub dataset_size: u64,
}

impl UploadRequest<'_> {
    /// Name the weights file is submitted under.
    pub fn file_name(&self) -> String {
        format!("{}_round{}.pth", self.client_id, self.round)
    }
}

/// Hands the locally trained weights to the local training backend, which
/// forwards them to the aggregation server.
#[derive(Debug, Clone)]
pub struct Uploader {
    http: reqwest::Client,
    backend_url: String,
}

impl Uploader {
    /// Creates a new `Uploader`.
    ///
    /// # Arguments
    /// * `http` - The shared http client.
    /// * `backend_url` - Base url of the local training backend.
    pub fn new(http: reqwest::Client, backend_url: String) -> Self {
        Self { http, backend_url }
    }

    /// Uploads the local model as a multipart submission.
    ///
    /// # Arguments
    /// * `request` - Identity, round and dataset fields of the submission.
    /// * `weights` - The serialized model weights.
    /// * `reporter` - Where the outcome is reported.
    ///
    /// # Returns
    /// Whether the backend accepted the upload. Failures are logged, never propagated.
    pub async fn upload_local_model<R: Reporter>(
        &self,
        request: UploadRequest<'_>,
        weights: Vec<u8>,
        reporter: &R,
    ) -> bool {
        reporter.info("Uploading local model weights...");

        match self.send(request, weights).await {
            Ok(()) => {
                reporter.success("Local model uploaded successfully!");
                true
            }
            Err(e) => {
                reporter.error(format!("Upload failed: {e}"));
                false
            }
        }
    }

    async fn send(&self, request: UploadRequest<'_>, weights: Vec<u8>) -> Result<(), PhaseError> {
        let size = weights.len();
        let file = Part::bytes(weights)
            .file_name(request.file_name())
            .mime_str("application/octet-stream")?;

        let form = Form::new()
            .part("file", file)
            .text("client_id", request.client_id.to_string())
            .text("dataset_size", request.dataset_size.to_string())
            .text("cur_round", request.round.to_string())
            .text("federated_server_url", request.server_url.to_string());

        let url = http::endpoint(&self.backend_url, SEND_LOCAL_MODEL_PATH);
        debug!(bytes = size, round = request.round; "posting local model");
        let response = self.http.post(url).multipart(form).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(PhaseError::Response(status));
        }

        response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| PhaseError::Body(e.to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_name_carries_client_and_round() {
        let request = UploadRequest {
            client_id: "client_1",
            round: 3,
            server_url: "http://127.0.0.1:8000",
            dataset_size: 56,
        };
        assert_eq!(request.file_name(), "client_1_round3.pth");
    }
}
