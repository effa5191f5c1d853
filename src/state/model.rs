use std::fmt;

use chrono::{DateTime, Local};

/// Lifecycle of a federated round.
///
/// `Idle` is both the initial state and the state every round ends in,
/// whether it completed or failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RoundStatus {
    #[default]
    Idle,
    Downloading,
    Training,
    Uploading,
}

impl RoundStatus {
    pub fn is_idle(self) -> bool {
        self == Self::Idle
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Downloading => "downloading",
            Self::Training => "training",
            Self::Uploading => "uploading",
        }
    }
}

impl fmt::Display for RoundStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Latest metrics reported by the local trainer.
///
/// Overwritten after every epoch, never accumulated.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TrainingMetrics {
    pub train_loss: f64,
    pub val_loss: f64,
    pub val_dice: f64,
    pub epoch: usize,
}

/// Severity class of an activity log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Success,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Info => "info",
            Self::Success => "success",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

/// A single operator-visible event. Immutable once created.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    message: String,
    severity: Severity,
    timestamp: DateTime<Local>,
}

impl LogEntry {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            severity,
            timestamp: Local::now(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn timestamp(&self) -> DateTime<Local> {
        self.timestamp
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}",
            self.timestamp.format("%H:%M:%S"),
            self.message
        )
    }
}

/// Reachability of the two collaborators, recomputed wholesale on every probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConnectionStatus {
    pub local_backend: bool,
    pub server: bool,
}

/// Who this client is and which aggregation server it talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity {
    pub client_id: String,
    pub server_url: String,
}

/// One completed epoch, kept in memory for the history view.
#[derive(Debug, Clone, PartialEq)]
pub struct EpochRecord {
    pub timestamp: DateTime<Local>,
    pub round: u64,
    pub metrics: TrainingMetrics,
}

/// Full snapshot handed to presentation layers.
#[derive(Debug, Clone)]
pub struct ClientView {
    pub status: RoundStatus,
    pub round: u64,
    pub metrics: TrainingMetrics,
    pub identity: ClientIdentity,
    pub logs: Vec<LogEntry>,
    pub history: Vec<EpochRecord>,
}
