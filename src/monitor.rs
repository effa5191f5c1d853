use std::time::Duration;

use log::{debug, info};
use reqwest::StatusCode;
use tokio::{
    sync::watch,
    time::{self, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use crate::{
    http::{self, GLOBAL_MODEL_PATH, HEALTH_PATH},
    state::{ClientIdentity, ConnectionStatus},
};

/// Periodically probes both collaborators and publishes their reachability.
///
/// The monitor is the only writer of [`ConnectionStatus`]. It never gates
/// round execution.
pub struct ConnectionMonitor {
    http: reqwest::Client,
    backend_url: String,
    identity: watch::Receiver<ClientIdentity>,
    interval: Duration,
    status: watch::Sender<ConnectionStatus>,
}

impl ConnectionMonitor {
    /// Creates a new `ConnectionMonitor`.
    ///
    /// # Arguments
    /// * `http` - The http client used for probes.
    /// * `backend_url` - Base url of the local training backend.
    /// * `identity` - Live view of the client identity, read for the server url on every probe.
    /// * `interval` - Time between probes.
    pub fn new(
        http: reqwest::Client,
        backend_url: String,
        identity: watch::Receiver<ClientIdentity>,
        interval: Duration,
    ) -> Self {
        let (status, _) = watch::channel(ConnectionStatus::default());
        Self {
            http,
            backend_url,
            identity,
            interval,
            status,
        }
    }

    /// Subscribes to status updates. Must be called before [`ConnectionMonitor::run`]
    /// takes ownership of the monitor.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.subscribe()
    }

    /// The most recently published status.
    pub fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    /// Probes both collaborators once and publishes the result.
    ///
    /// # Returns
    /// The freshly computed status.
    pub async fn probe(&self) -> ConnectionStatus {
        let server_url = self.identity.borrow().server_url.clone();

        let (local_backend, server) =
            tokio::join!(self.probe_backend(), self.probe_server(&server_url));

        let status = ConnectionStatus {
            local_backend,
            server,
        };
        debug!(local_backend = local_backend, server = server; "connection probe");

        self.status.send_replace(status);
        status
    }

    /// Probes on a fixed interval until `shutdown` is cancelled. The first probe
    /// runs immediately.
    ///
    /// # Arguments
    /// * `shutdown` - Cancelling this token stops the loop.
    pub async fn run(self, shutdown: CancellationToken) {
        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!("connection monitor started, probing every {:?}", self.interval);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = self.probe() => {}
            }
        }

        info!("connection monitor stopped");
    }

    async fn probe_backend(&self) -> bool {
        let url = http::endpoint(&self.backend_url, HEALTH_PATH);
        match self.http.get(url).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!("local backend probe failed: {e}");
                false
            }
        }
    }

    async fn probe_server(&self, server_url: &str) -> bool {
        let url = http::endpoint(server_url, GLOBAL_MODEL_PATH);
        match self.http.head(url).send().await {
            Ok(response) => server_answered(response.status()),
            Err(e) => {
                debug!("aggregation server probe failed: {e}");
                false
            }
        }
    }
}

/// A "not found" still means the server process answered, it just has no model yet.
fn server_answered(status: StatusCode) -> bool {
    status.is_success() || status == StatusCode::NOT_FOUND
}
