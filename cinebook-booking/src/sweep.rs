use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};
use uuid::Uuid;

use cinebook_core::{CoreResult, SeatRepository};

use crate::release::{release_holds, HoldPolicy, ReleaseJob, ReleaseOutcome};

/// Periodic pass that frees holds whose own release job never ran,
/// e.g. after a restart or exhausted retries.
pub struct HoldSweeper {
    repo: Arc<dyn SeatRepository>,
    policy: HoldPolicy,
    interval: Duration,
}

impl HoldSweeper {
    pub fn new(repo: Arc<dyn SeatRepository>, policy: HoldPolicy, interval: Duration) -> Self {
        Self { repo, policy, interval }
    }

    pub async fn sweep_once(&self) -> CoreResult<ReleaseOutcome> {
        self.sweep_at(Utc::now()).await
    }

    async fn sweep_at(&self, now: DateTime<Utc>) -> CoreResult<ReleaseOutcome> {
        let cutoff = now
            .checked_sub_signed(self.policy.ttl_delta())
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        let held = self.repo.find_expired_holds(cutoff).await?;
        let mut by_showtime: BTreeMap<Uuid, Vec<Uuid>> = BTreeMap::new();
        for h in held {
            by_showtime.entry(h.showtime_id).or_default().push(h.seat_id);
        }

        // A failing showtime must not starve the ones after it.
        let mut total = ReleaseOutcome::default();
        for (showtime_id, seat_ids) in by_showtime {
            let job = ReleaseJob { showtime_id, seat_ids, placed_at: cutoff };
            match release_holds(self.repo.as_ref(), &job).await {
                Ok(outcome) => total.merge(outcome),
                Err(e) => error!("Sweep of showtime {} failed: {}", showtime_id, e),
            }
        }
        Ok(total)
    }

    pub async fn run(self) {
        info!("Hold sweeper started, interval {:?}", self.interval);
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            match self.sweep_once().await {
                Ok(outcome) if outcome.released > 0 => {
                    info!("Sweep released {} orphaned seat hold(s)", outcome.released)
                }
                Ok(_) => debug!("Sweep found no orphaned holds"),
                Err(e) => error!("Hold sweep failed: {}", e),
            }
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }
}
