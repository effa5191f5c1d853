use std::num::NonZeroUsize;

use log::{info, warn};
use parking_lot::Mutex;
use serde::Deserialize;
use tokio::sync::watch;

use crate::{
    config::{self, ClientConfig},
    error::{ClientError, PhaseError, Result},
    http::{self, CURRENT_ROUND_PATH},
    phases::{
        Downloader, LocalTrainer, Phase, Reporter, SimulatedTrainer, TrainExecutor, UploadRequest,
        Uploader,
    },
    state::{
        ClientIdentity, ClientState, ClientView, EpochRecord, RoundStatus, Severity,
        TrainingMetrics, FIRST_ROUND,
    },
};

/// How a round that was allowed to start ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundOutcome {
    /// All three phases succeeded; the counter now points at the next round.
    Completed { round: u64 },
    /// A phase failed; the counter was left unchanged.
    Failed { round: u64, phase: Phase },
}

#[derive(Debug, Deserialize)]
struct CurrentRound {
    current_round: u64,
}

/// Drives download → train → upload, one round at a time.
///
/// Owns the round status, round counter, metrics and activity log. Everything
/// else reads them through [`RoundOrchestrator::view`], using
/// [`RoundOrchestrator::subscribe`] to learn when they changed.
pub struct RoundOrchestrator {
    state: Mutex<ClientState>,
    identity: watch::Sender<ClientIdentity>,
    revision: watch::Sender<u64>,
    http: reqwest::Client,
    downloader: Downloader,
    trainer: TrainExecutor,
    uploader: Uploader,
    epochs: NonZeroUsize,
    dataset_size: u64,
}

impl RoundOrchestrator {
    /// Creates an orchestrator backed by the simulated trainer.
    ///
    /// # Errors
    /// Returns `ClientError::InvalidConfig` if the configuration is invalid.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let trainer = SimulatedTrainer::new(config.epoch_delay(), None);
        Self::with_trainer(config, Box::new(trainer))
    }

    /// Creates an orchestrator backed by the given trainer.
    ///
    /// # Arguments
    /// * `config` - The client configuration.
    /// * `trainer` - Runs the local epochs and supplies the weights to upload.
    ///
    /// # Errors
    /// Returns `ClientError::InvalidConfig` if the configuration is invalid.
    pub fn with_trainer(config: &ClientConfig, trainer: Box<dyn LocalTrainer>) -> Result<Self> {
        config.validate()?;
        let http = http::client(config.request_timeout())?;

        let identity = ClientIdentity {
            client_id: config.client_id.trim().to_string(),
            server_url: config.server_url.trim().to_string(),
        };

        let (revision, _) = watch::channel(0);
        let (identity, _) = watch::channel(identity);

        Ok(Self {
            state: Mutex::new(ClientState::new()),
            identity,
            revision,
            downloader: Downloader::new(
                http::streaming_client(config.request_timeout())?,
                config.model_path.clone(),
            ),
            trainer: TrainExecutor::new(trainer),
            uploader: Uploader::new(http.clone(), config.backend_url.trim().to_string()),
            http,
            epochs: config.epochs,
            dataset_size: config.dataset_size,
        })
    }

    /// Runs one full round.
    ///
    /// # Returns
    /// How the round ended. A failed phase is not an error: it is logged, the
    /// client goes back to idle and the same round can be retried.
    ///
    /// # Errors
    /// Returns `ClientError::RoundInProgress` if another round is active. The
    /// rejection is logged and the active round is not disturbed.
    pub async fn run_round(&self) -> Result<RoundOutcome> {
        let (round, identity) = self.begin_round()?;
        let mut guard = RoundGuard::new(self, round);
        let reporter = RoundReporter {
            orchestrator: self,
            round,
        };

        if !self
            .downloader
            .download_global_model(&identity.server_url, &reporter)
            .await
        {
            return Ok(guard.fail(Phase::Download));
        }

        self.transition(RoundStatus::Training);
        if !self
            .trainer
            .train_local_model(round, self.epochs.get(), &reporter)
            .await
        {
            return Ok(guard.fail(Phase::Train));
        }

        let weights = self.trainer.weights(round).await;
        self.transition(RoundStatus::Uploading);
        let request = UploadRequest {
            client_id: &identity.client_id,
            round,
            server_url: &identity.server_url,
            dataset_size: self.dataset_size,
        };

        if !self
            .uploader
            .upload_local_model(request, weights, &reporter)
            .await
        {
            return Ok(guard.fail(Phase::Upload));
        }

        Ok(guard.complete())
    }

    /// Resets the counter, metrics, history and log.
    ///
    /// # Errors
    /// Returns `ClientError::ResetRejected` if a round is active.
    pub fn reset_client(&self) -> Result<()> {
        self.update(|state| {
            if !state.status.is_idle() {
                return Err(reject(state, ClientError::ResetRejected));
            }

            state.round = FIRST_ROUND;
            state.generation += 1;
            state.metrics = TrainingMetrics::default();
            state.history.clear();
            state.log.clear();
            state.log.push(Severity::Info, "Client reset successfully");
            Ok(())
        })
    }

    /// Changes the client identifier.
    ///
    /// # Errors
    /// Returns `ClientError::InvalidConfig` if `client_id` is blank and
    /// `ClientError::IdentityLocked` if a round is active.
    pub fn set_client_id(&self, client_id: &str) -> Result<()> {
        let client_id = non_blank("client_id", client_id)?;
        self.edit_identity(|identity| identity.client_id = client_id)
    }

    /// Changes the aggregation server url. The next monitor probe uses it.
    ///
    /// # Errors
    /// Returns `ClientError::InvalidConfig` if `server_url` is not an http(s)
    /// url and `ClientError::IdentityLocked` if a round is active.
    pub fn set_server_url(&self, server_url: &str) -> Result<()> {
        let server_url = non_blank("server_url", server_url)?;
        config::check_url("server_url", &server_url)?;
        self.edit_identity(|identity| identity.server_url = server_url)
    }

    /// Sets the round counter to the aggregation server's current round.
    ///
    /// # Returns
    /// The round the counter now points at.
    ///
    /// # Errors
    /// Returns `ClientError::RoundInProgress` if a round is active, before or
    /// after the request, `ClientError::SyncSuperseded` if a round ran or the
    /// client was reset while the request was in flight, and
    /// `ClientError::Sync` if the server could not provide a valid round.
    pub async fn sync_round(&self) -> Result<u64> {
        let (generation, server_url) = self.update(|state| {
            if !state.status.is_idle() {
                return Err(reject(state, ClientError::RoundInProgress));
            }
            Ok((state.generation, self.identity.borrow().server_url.clone()))
        })?;

        let fetched = self.fetch_current_round(&server_url).await;

        self.update(|state| {
            if !state.status.is_idle() {
                return Err(reject(state, ClientError::RoundInProgress));
            }
            if state.generation != generation {
                return Err(reject(state, ClientError::SyncSuperseded));
            }

            match fetched {
                Ok(round) => {
                    state.round = round;
                    state
                        .log
                        .push(Severity::Info, format!("Synced with server: Round {round}"));
                    Ok(round)
                }
                Err(e) => {
                    let err = ClientError::Sync(e);
                    state.log.push(Severity::Error, err.to_string());
                    Err(err)
                }
            }
        })
    }

    /// Snapshot of the current state.
    pub fn view(&self) -> ClientView {
        let state = self.state.lock();
        state.view(self.identity.borrow().clone())
    }

    /// Subscribes to state revisions, bumped after every change.
    ///
    /// Call [`RoundOrchestrator::view`] on change for the new snapshot.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    /// Subscribes to identity changes.
    pub fn identity(&self) -> watch::Receiver<ClientIdentity> {
        self.identity.subscribe()
    }

    pub fn status(&self) -> RoundStatus {
        self.state.lock().status
    }

    pub fn round(&self) -> u64 {
        self.state.lock().round
    }

    /// Checks for idle and enters `Downloading` in a single critical section.
    fn begin_round(&self) -> Result<(u64, ClientIdentity)> {
        self.update(|state| {
            if !state.status.is_idle() {
                return Err(reject(state, ClientError::RoundInProgress));
            }

            state.status = RoundStatus::Downloading;
            state.generation += 1;
            let round = state.round;
            state
                .log
                .push(Severity::Info, format!("===== Starting Round {round} ====="));
            Ok((round, self.identity.borrow().clone()))
        })
    }

    fn transition(&self, status: RoundStatus) {
        self.update(|state| state.status = status);
    }

    fn edit_identity(&self, edit: impl FnOnce(&mut ClientIdentity)) -> Result<()> {
        self.update(|state| {
            if !state.status.is_idle() {
                return Err(reject(state, ClientError::IdentityLocked));
            }

            self.identity.send_modify(edit);
            let identity = self.identity.borrow().clone();
            state.log.push(
                Severity::Info,
                format!(
                    "Client {} targeting server {}",
                    identity.client_id, identity.server_url
                ),
            );
            Ok(())
        })
    }

    async fn fetch_current_round(&self, server_url: &str) -> std::result::Result<u64, PhaseError> {
        let url = http::endpoint(server_url, CURRENT_ROUND_PATH);
        let response = self.http.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(PhaseError::Response(status));
        }

        let body: CurrentRound = response
            .json()
            .await
            .map_err(|e| PhaseError::Body(e.to_string()))?;

        if body.current_round < FIRST_ROUND {
            return Err(PhaseError::Body(format!(
                "current_round must be at least {FIRST_ROUND}, got {}",
                body.current_round
            )));
        }

        Ok(body.current_round)
    }

    /// Applies `f` under the state lock and bumps the revision.
    fn update<T>(&self, f: impl FnOnce(&mut ClientState) -> T) -> T {
        let mut state = self.state.lock();
        let ret = f(&mut state);
        self.revision.send_modify(|rev| *rev = rev.wrapping_add(1));
        ret
    }
}

/// Logs a guard rejection and hands the error back.
fn reject(state: &mut ClientState, err: ClientError) -> ClientError {
    state.log.push(Severity::Error, err.to_string());
    err
}

fn non_blank(field: &str, value: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ClientError::InvalidConfig(format!("{field} must not be empty")));
    }
    Ok(value.to_string())
}

/// Reports phase progress into the orchestrator's state.
struct RoundReporter<'a> {
    orchestrator: &'a RoundOrchestrator,
    round: u64,
}

impl Reporter for RoundReporter<'_> {
    fn log(&self, severity: Severity, message: String) {
        self.orchestrator.update(|state| {
            state.log.push(severity, message);
        });
    }

    fn metrics(&self, metrics: TrainingMetrics) {
        let round = self.round;
        self.orchestrator.update(|state| {
            state.metrics = metrics;
            state.history.push(EpochRecord {
                timestamp: chrono::Local::now(),
                round,
                metrics,
            });
        });
    }
}

/// Returns the orchestrator to idle however the round ends, including when
/// the `run_round` future is dropped mid-phase.
struct RoundGuard<'a> {
    orchestrator: &'a RoundOrchestrator,
    round: u64,
    finished: bool,
}

impl<'a> RoundGuard<'a> {
    fn new(orchestrator: &'a RoundOrchestrator, round: u64) -> Self {
        Self {
            orchestrator,
            round,
            finished: false,
        }
    }

    fn fail(&mut self, phase: Phase) -> RoundOutcome {
        let round = self.round;
        self.finished = true;
        warn!(round = round; "round aborted during {phase} phase");
        self.orchestrator
            .update(|state| state.status = RoundStatus::Idle);
        RoundOutcome::Failed { round, phase }
    }

    fn complete(&mut self) -> RoundOutcome {
        let round = self.round;
        self.finished = true;
        self.orchestrator.update(|state| {
            state.log.push(
                Severity::Success,
                format!("===== Round {round} Completed ====="),
            );
            state.status = RoundStatus::Idle;
            state.round = round + 1;
        });
        info!(round = round; "round completed");
        RoundOutcome::Completed { round }
    }
}

impl Drop for RoundGuard<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }

        let round = self.round;
        self.orchestrator.update(|state| {
            state.log.push(
                Severity::Error,
                format!("Round {round} interrupted before completion"),
            );
            state.status = RoundStatus::Idle;
        });
    }
}
