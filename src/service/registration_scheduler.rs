use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::store::{StoreError, TournamentStore};

/// Periodically closes registration for tournaments whose start date has
/// passed.
pub struct RegistrationScheduler {
    tournaments: Arc<dyn TournamentStore>,
    interval: Duration,
}

/// Owns the running sweep task.
pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Signals the loop and waits for the in-flight sweep to finish.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            warn!(error = %e, "Registration scheduler task ended abnormally");
        }
    }
}

impl RegistrationScheduler {
    pub fn new(tournaments: Arc<dyn TournamentStore>, interval: Duration) -> Self {
        Self { tournaments, interval }
    }

    /// One pass. Returns how many tournaments were closed by this pass.
    pub async fn sweep(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        self.tournaments.start_due_tournaments(now).await
    }

    /// Spawns the sweep loop. The first pass runs immediately.
    pub fn start(self) -> SchedulerHandle {
        let (shutdown, mut shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            info!(interval_secs = self.interval.as_secs(), "Registration scheduler started");
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match self.sweep(Utc::now()).await {
                            Ok(0) => debug!("No tournaments due to start"),
                            Ok(closed) => info!(closed, "Closed registration for started tournaments"),
                            // the next tick retries
                            Err(e) => warn!(error = %e, "Registration sweep failed"),
                        }
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }

            info!("Registration scheduler stopped");
        });

        SchedulerHandle { shutdown, task }
    }
}
