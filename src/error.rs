use std::{error::Error, fmt, io};

use reqwest::StatusCode;

/// The client's result type.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors surfaced by the round orchestrator to its caller.
#[derive(Debug)]
pub enum ClientError {
    /// `run_round` was invoked while another round was active.
    RoundInProgress,
    /// `reset_client` was invoked while a round was active.
    ResetRejected,
    /// The client identity or server url was edited while a round was active.
    IdentityLocked,
    /// Invalid configuration, caught before any request is issued.
    InvalidConfig(String),
    /// Syncing the round counter from the aggregation server failed.
    Sync(PhaseError),
    /// A round ran or the client was reset while the sync request was in flight.
    SyncSuperseded,
}

impl ClientError {
    /// Whether this error comes from the single-round guard.
    pub fn is_concurrency(&self) -> bool {
        matches!(
            self,
            Self::RoundInProgress
                | Self::ResetRejected
                | Self::IdentityLocked
                | Self::SyncSuperseded
        )
    }
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RoundInProgress => write!(f, "round already in progress"),
            Self::ResetRejected => write!(f, "reset rejected: round in progress"),
            Self::IdentityLocked => write!(f, "identity change rejected: round in progress"),
            Self::InvalidConfig(msg) => write!(f, "invalid config: {msg}"),
            Self::Sync(e) => write!(f, "round sync failed: {e}"),
            Self::SyncSuperseded => {
                write!(f, "round sync discarded: client state changed meanwhile")
            }
        }
    }
}

impl Error for ClientError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sync(e) => Some(e),
            _ => None,
        }
    }
}

/// Failures inside a phase executor or a collaborator request.
///
/// These never escape a phase executor: they are turned into a failed outcome
/// plus an error entry in the activity log.
#[derive(Debug)]
pub enum PhaseError {
    /// The collaborator could not be reached, refused the connection or timed out.
    Transport(reqwest::Error),
    /// The collaborator answered with a non-success status.
    Response(StatusCode),
    /// The collaborator answered but the body could not be parsed.
    Body(String),
    /// Local file handling failed.
    Io(io::Error),
    /// The local trainer reported a failure.
    Training(String),
}

impl fmt::Display for PhaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(e) if e.is_timeout() => write!(f, "request timed out"),
            Self::Transport(e) if e.is_connect() => write!(f, "connection failed: {e}"),
            Self::Transport(e) => write!(f, "transport error: {e}"),
            Self::Response(status) => write!(f, "server responded with {status}"),
            Self::Body(msg) => write!(f, "invalid response body: {msg}"),
            Self::Io(e) => write!(f, "io error: {e}"),
            Self::Training(msg) => write!(f, "training error: {msg}"),
        }
    }
}

impl Error for PhaseError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Transport(e) => Some(e),
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for PhaseError {
    fn from(value: reqwest::Error) -> Self {
        Self::Transport(value)
    }
}

impl From<io::Error> for PhaseError {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}
