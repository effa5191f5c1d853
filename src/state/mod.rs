mod activity;
mod model;

pub use activity::ActivityLog;
pub use model::{
    ClientIdentity, ClientView, ConnectionStatus, EpochRecord, LogEntry, RoundStatus, Severity,
    TrainingMetrics,
};

/// First round number, both at start-up and after a reset.
pub const FIRST_ROUND: u64 = 1;

/// Mutable state owned by the round orchestrator.
///
/// Nothing outside the orchestrator writes to it; presentation layers read
/// [`ClientView`] snapshots instead.
#[derive(Debug)]
pub(crate) struct ClientState {
    pub status: RoundStatus,
    pub round: u64,
    pub metrics: TrainingMetrics,
    pub log: ActivityLog,
    pub history: Vec<EpochRecord>,
    /// Bumped whenever a round starts or the client is reset.
    pub generation: u64,
}

impl ClientState {
    pub fn new() -> Self {
        Self {
            status: RoundStatus::Idle,
            round: FIRST_ROUND,
            metrics: TrainingMetrics::default(),
            log: ActivityLog::new(),
            history: Vec::new(),
            generation: 0,
        }
    }

    /// Builds a snapshot for rendering.
    pub fn view(&self, identity: ClientIdentity) -> ClientView {
        ClientView {
            status: self.status,
            round: self.round,
            metrics: self.metrics,
            identity,
            logs: self.log.entries().to_vec(),
            history: self.history.clone(),
        }
    }
}
