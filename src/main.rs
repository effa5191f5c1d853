use std::{env, path::PathBuf};

use fl_client::{ClientConfig, RoundOrchestrator, RoundOutcome};
use log::{info, warn};
use tokio::signal;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let path = env::args().nth(1).map(PathBuf::from);
    let config = ClientConfig::load(path.as_deref())?;
    let (orchestrator, monitor) = fl_client::connect(&config)?;

    let shutdown = CancellationToken::new();
    let monitor_task = tokio::spawn(monitor.run(shutdown.clone()));

    match orchestrator.sync_round().await {
        Ok(round) => info!("starting at round {round}"),
        Err(e) => warn!("{e}, starting at round {}", orchestrator.round()),
    }

    tokio::select! {
        ret = run_rounds(&orchestrator, config.rounds) => ret?,
        _ = signal::ctrl_c() => info!("received ctrl-c, shutting down"),
    }

    shutdown.cancel();
    monitor_task.await?;

    let view = orchestrator.view();
    info!(
        "next round {}, last epoch {}: train_loss={:.4} val_loss={:.4} val_dice={:.4}",
        view.round,
        view.metrics.epoch,
        view.metrics.train_loss,
        view.metrics.val_loss,
        view.metrics.val_dice
    );

    Ok(())
}

/// Runs up to `rounds` rounds, stopping at the first failed one.
async fn run_rounds(orchestrator: &RoundOrchestrator, rounds: usize) -> anyhow::Result<()> {
    for _ in 0..rounds {
        match orchestrator.run_round().await? {
            RoundOutcome::Completed { round } => info!("round {round} done"),
            RoundOutcome::Failed { round, phase } => {
                warn!("round {round} failed during {phase}, stopping");
                break;
            }
        }
    }

    Ok(())
}
