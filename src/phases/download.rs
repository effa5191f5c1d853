use std::{
    ffi::OsString,
    path::{Path, PathBuf},
};

use futures::StreamExt;
use log::debug;
use tokio::{fs, io::AsyncWriteExt};

use super::{Progress, Reporter};
use crate::{
    error::PhaseError,
    http::{self, GLOBAL_MODEL_PATH},
};

/// Pulls the shared global model from the aggregation server.
#[derive(Debug, Clone)]
pub struct Downloader {
    http: reqwest::Client,
    model_path: Option<PathBuf>,
}

impl Downloader {
    /// Creates a new `Downloader`.
    ///
    /// # Arguments
    /// * `http` - The shared http client.
    /// * `model_path` - Where to persist the downloaded artifact, if anywhere.
    pub fn new(http: reqwest::Client, model_path: Option<PathBuf>) -> Self {
        Self { http, model_path }
    }

    /// Downloads the global model, logging percentage progress as chunks arrive.
    ///
    /// # Arguments
    /// * `server_url` - Base url of the aggregation server.
    /// * `reporter` - Where progress and the outcome are reported.
    ///
    /// # Returns
    /// Whether the download succeeded. Failures are logged, never propagated.
    pub async fn download_global_model<R: Reporter>(&self, server_url: &str, reporter: &R) -> bool {
        reporter.info(format!("Downloading global model from {server_url}..."));

        match self.fetch(server_url, reporter).await {
            Ok(received) => {
                debug!(bytes = received; "global model received");
                reporter.success("Global model downloaded successfully!");
                true
            }
            Err(e) => {
                reporter.error(format!("Download failed: {e}"));
                false
            }
        }
    }

    async fn fetch<R: Reporter>(&self, server_url: &str, reporter: &R) -> Result<u64, PhaseError> {
        let url = http::endpoint(server_url, GLOBAL_MODEL_PATH);
        let response = self.http.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(PhaseError::Response(status));
        }

        let mut progress = Progress::new(response.content_length());
        let mut sink = match &self.model_path {
            Some(path) => Some(PartFile::create(path).await?),
            None => None,
        };

        let mut chunks = response.bytes_stream();
        while let Some(chunk) = chunks.next().await {
            let chunk = chunk?;

            if let Some(part) = sink.as_mut() {
                part.file.write_all(&chunk).await?;
            }

            if let Some(percent) = progress.advance(chunk.len()) {
                reporter.info(format!("Download progress: {percent}%"));
            }
        }

        if let Some(part) = sink {
            part.commit().await?;
        }

        Ok(progress.received())
    }
}

/// A download in progress, written next to its destination.
///
/// The destination is only replaced by `commit`; a part file that is dropped
/// uncommitted is removed and the previous model stays in place.
struct PartFile {
    file: fs::File,
    part: PathBuf,
    dest: PathBuf,
    committed: bool,
}

impl PartFile {
    async fn create(dest: &Path) -> Result<Self, PhaseError> {
        if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        let part = part_path(dest);
        let file = fs::File::create(&part).await?;
        Ok(Self {
            file,
            part,
            dest: dest.to_path_buf(),
            committed: false,
        })
    }

    async fn commit(mut self) -> Result<(), PhaseError> {
        self.file.flush().await?;
        self.file.sync_all().await?;
        fs::rename(&self.part, &self.dest).await?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for PartFile {
    fn drop(&mut self) {
        if !self.committed {
            let _ = std::fs::remove_file(&self.part);
        }
    }
}

fn part_path(dest: &Path) -> PathBuf {
    let mut name = OsString::from(dest.as_os_str());
    name.push(".part");
    PathBuf::from(name)
}
