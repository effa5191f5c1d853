mod download;
mod progress;
mod train;
mod upload;

use std::fmt;

pub use download::Downloader;
pub use progress::Progress;
pub use train::{EpochMetrics, LocalTrainer, SimulatedTrainer, TrainExecutor};
pub use upload::{UploadRequest, Uploader};

use crate::state::{Severity, TrainingMetrics};

/// The three phases of a round, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Download,
    Train,
    Upload,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Download => "download",
            Self::Train => "train",
            Self::Upload => "upload",
        };
        f.write_str(s)
    }
}

/// Upward channel from a phase executor to whoever owns the round state.
///
/// Executors never read or write the round status; everything they have to
/// say goes through this trait.
pub trait Reporter: Send + Sync {
    /// Records an operator-visible event.
    fn log(&self, severity: Severity, message: String);

    /// Replaces the current training metrics.
    fn metrics(&self, metrics: TrainingMetrics);

    fn info(&self, message: impl Into<String>)
    where
        Self: Sized,
    {
        self.log(Severity::Info, message.into());
    }

    fn success(&self, message: impl Into<String>)
    where
        Self: Sized,
    {
        self.log(Severity::Success, message.into());
    }

    fn error(&self, message: impl Into<String>)
    where
        Self: Sized,
    {
        self.log(Severity::Error, message.into());
    }
}
