use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use rand::{rngs::StdRng, Rng, SeedableRng};
use tokio::sync::Mutex;

use super::Reporter;
use crate::{error::PhaseError, state::TrainingMetrics};

/// Metrics produced by a single local epoch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochMetrics {
    pub train_loss: f64,
    pub val_loss: f64,
    pub val_dice: f64,
}

impl EpochMetrics {
    pub fn new(train_loss: f64, val_loss: f64, val_dice: f64) -> Self {
        Self {
            train_loss,
            val_loss,
            val_dice,
        }
    }
}

/// Runs local training one epoch at a time.
///
/// A real implementation would drive a training process and read its
/// checkpoint metrics; the round orchestrator only sees this interface.
#[async_trait]
pub trait LocalTrainer: Send {
    /// Runs a single epoch and reports its metrics.
    ///
    /// # Arguments
    /// * `round` - The round this epoch belongs to.
    /// * `epoch` - 1-based epoch index.
    /// * `total` - Number of epochs in this round.
    async fn run_epoch(
        &mut self,
        round: u64,
        epoch: usize,
        total: usize,
    ) -> Result<EpochMetrics, PhaseError>;

    /// Serialized weights to upload once training for `round` is done.
    fn weights(&self, round: u64) -> Vec<u8>;
}

/// Stand-in trainer: sleeps for a fixed delay and draws plausible metrics.
pub struct SimulatedTrainer {
    delay: Duration,
    rng: StdRng,
}

impl SimulatedTrainer {
    /// Creates a new `SimulatedTrainer`.
    ///
    /// # Arguments
    /// * `delay` - How long each epoch takes.
    /// * `seed` - Optional seed for reproducible metrics.
    pub fn new(delay: Duration, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        Self { delay, rng }
    }

    fn draw(&mut self, low: f64, span: f64) -> f64 {
        let value = low + self.rng.random::<f64>() * span;
        (value * 10_000.0).round() / 10_000.0
    }
}

#[async_trait]
impl LocalTrainer for SimulatedTrainer {
    async fn run_epoch(
        &mut self,
        _round: u64,
        _epoch: usize,
        _total: usize,
    ) -> Result<EpochMetrics, PhaseError> {
        tokio::time::sleep(self.delay).await;

        let train_loss = self.draw(0.3, 0.5);
        let val_loss = self.draw(0.35, 0.4);
        let val_dice = self.draw(0.75, 0.2);
        Ok(EpochMetrics::new(train_loss, val_loss, val_dice))
    }

    fn weights(&self, round: u64) -> Vec<u8> {
        format!("simulated model weights (round {round})").into_bytes()
    }
}

/// Runs the train phase: `epochs` sequential epochs on the local trainer.
pub struct TrainExecutor {
    trainer: Mutex<Box<dyn LocalTrainer>>,
}

impl TrainExecutor {
    pub fn new(trainer: Box<dyn LocalTrainer>) -> Self {
        Self {
            trainer: Mutex::new(trainer),
        }
    }

    /// Trains the local model for `epochs` epochs, strictly in order.
    ///
    /// Metrics are overwritten and a success entry is logged after each epoch.
    ///
    /// # Arguments
    /// * `round` - The round being trained.
    /// * `epochs` - Number of epochs to run.
    /// * `reporter` - Where metrics and log entries are reported.
    ///
    /// # Returns
    /// Whether every epoch completed.
    pub async fn train_local_model<R: Reporter>(
        &self,
        round: u64,
        epochs: usize,
        reporter: &R,
    ) -> bool {
        reporter.info(format!("Starting local training for Round {round}..."));
        let mut trainer = self.trainer.lock().await;

        for epoch in 1..=epochs {
            let m = match trainer.run_epoch(round, epoch, epochs).await {
                Ok(m) => m,
                Err(e) => {
                    reporter.error(format!("Training failed at epoch {epoch}/{epochs}: {e}"));
                    return false;
                }
            };

            debug!(round = round, epoch = epoch; "epoch finished");
            reporter.metrics(TrainingMetrics {
                train_loss: m.train_loss,
                val_loss: m.val_loss,
                val_dice: m.val_dice,
                epoch,
            });
            reporter.success(format!(
                "Epoch {epoch}/{epochs} - Train Loss: {:.4}, Val Loss: {:.4}, Val Dice: {:.4}",
                m.train_loss, m.val_loss, m.val_dice
            ));
        }

        reporter.success("Local training completed!");
        true
    }

    /// Weights produced by the last training run for `round`.
    pub async fn weights(&self, round: u64) -> Vec<u8> {
        self.trainer.lock().await.weights(round)
    }
}
