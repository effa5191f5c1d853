pub mod config;
pub mod error;
pub mod http;
pub mod monitor;
mod orchestrator;
pub mod phases;
pub mod state;

pub use config::ClientConfig;
pub use error::{ClientError, PhaseError};
pub use monitor::ConnectionMonitor;
pub use orchestrator::{RoundOrchestrator, RoundOutcome};

/// Builds a round orchestrator and a connection monitor wired to its identity.
///
/// The monitor is returned idle; spawn [`ConnectionMonitor::run`] to start probing.
///
/// # Errors
/// Returns a `ClientError` if the configuration is invalid.
pub fn connect(
    config: &ClientConfig,
) -> Result<(RoundOrchestrator, ConnectionMonitor), ClientError> {
    log::info!(
        "client {} using server {} and backend {}",
        config.client_id,
        config.server_url,
        config.backend_url
    );

    let orchestrator = RoundOrchestrator::new(config)?;
    let monitor = ConnectionMonitor::new(
        http::client(config.request_timeout())?,
        config.backend_url.trim().to_string(),
        orchestrator.identity(),
        config.probe_interval(),
    );

    Ok((orchestrator, monitor))
}
