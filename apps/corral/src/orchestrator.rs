//! # Orchestrator
//!
//! Long-running loop of `corral run`. On every tick the resources store is
//! checkpointed. The loop stops when the core's interrupt latch delivers an
//! interrupt, then flushes every live resource through `Corral::shutdown`.
//!
//! Ctrl-C never stops the loop directly: it is forwarded to
//! `InterruptLatch::raise`, so a store write in flight finishes before the
//! stop request is seen.

use crate::config::OrchestratorConfig;
use corral_core::{Corral, CorralResult, InterruptLatch};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Outcome of one orchestrator run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    pub ticks: u64,
    /// Resources flushed at shutdown.
    pub flushed: usize,
}

#[derive(Debug)]
pub struct Orchestrator {
    corral: Arc<Corral>,
    tick: Duration,
    stop: watch::Receiver<bool>,
}

impl Orchestrator {
    /// Build an orchestrator and hook it to the context's interrupt latch.
    ///
    /// Replaces any handler previously registered on the latch.
    pub fn new(corral: Arc<Corral>, config: &OrchestratorConfig) -> Self {
        let (tx, stop) = watch::channel(false);
        corral.interrupts().set_handler(move || {
            // The receiver is gone once the loop has returned.
            let _ = tx.send(true);
        });
        Self {
            corral,
            tick: config.tick(),
            stop,
        }
    }

    /// Forward Ctrl-C to the interrupt latch, from a background task.
    pub fn forward_ctrl_c(&self) {
        let latch: Arc<InterruptLatch> = Arc::clone(self.corral.interrupts());
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("interrupt received");
                    latch.raise();
                }
                Err(e) => warn!("cannot listen for Ctrl-C: {}", e),
            }
        });
    }

    /// Run until an interrupt is delivered, then shut the context down.
    pub async fn run(self) -> CorralResult<RunReport> {
        let Self {
            corral,
            tick,
            mut stop,
        } = self;
        let mut interval = tokio::time::interval(tick);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut ticks = 0u64;

        info!(tick_ms = tick.as_millis() as u64, "orchestrator started");
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    checkpoint(&corral)?;
                    ticks += 1;
                }
                changed = stop.changed() => {
                    if changed.is_err() || *stop.borrow() {
                        break;
                    }
                }
            }
        }

        let flushed = corral.knowledge().len();
        corral.shutdown()?;
        info!(ticks, flushed, "orchestrator stopped");
        Ok(RunReport { ticks, flushed })
    }
}

/// Commit whatever the resources store still holds.
fn checkpoint(corral: &Corral) -> CorralResult<()> {
    corral.resources().commit()?;
    debug!(
        resources = corral.knowledge().len(),
        commits = corral.resources().commit_count(),
        "checkpoint"
    );
    Ok(())
}
