use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use cinebook_core::{CoreResult, SeatRepository, SeatTransaction};

/// How long holds last and how hard the release job tries to clear them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HoldPolicy {
    pub ttl: Duration,
    pub max_retries: u32,
    pub retry_backoff: Duration,
}

impl HoldPolicy {
    pub fn ttl_delta(&self) -> TimeDelta {
        TimeDelta::from_std(self.ttl).unwrap_or(TimeDelta::MAX)
    }

    /// Delay before retry number `attempt` (0-based), doubling each time.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        self.retry_backoff.saturating_mul(2u32.saturating_pow(attempt))
    }
}

impl Default for HoldPolicy {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(600),
            max_retries: 3,
            retry_backoff: Duration::from_millis(500),
        }
    }
}

/// Payload of one deferred release: the exact seat set of a reservation batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseJob {
    pub showtime_id: Uuid,
    pub seat_ids: Vec<Uuid>,
    /// Only holds placed at or before this instant are released.
    pub placed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReleaseOutcome {
    pub released: usize,
    pub skipped: usize,
}

impl ReleaseOutcome {
    pub fn merge(&mut self, other: ReleaseOutcome) {
        self.released += other.released;
        self.skipped += other.skipped;
    }
}

/// Re-check every seat of `job` under its row lock and put expired, unbooked
/// holds back on sale. Safe to run any number of times.
pub async fn release_holds(repo: &dyn SeatRepository, job: &ReleaseJob) -> CoreResult<ReleaseOutcome> {
    let mut tx = repo.begin().await?;

    match release_in_tx(tx.as_mut(), job).await {
        Ok(outcome) => {
            tx.commit().await?;
            Ok(outcome)
        }
        Err(e) => {
            if let Err(rb) = tx.rollback().await {
                warn!("Rollback of release for showtime {} failed: {}", job.showtime_id, rb);
            }
            Err(e)
        }
    }
}

async fn release_in_tx(tx: &mut dyn SeatTransaction, job: &ReleaseJob) -> CoreResult<ReleaseOutcome> {
    let mut outcome = ReleaseOutcome::default();

    let mut seat_ids = job.seat_ids.clone();
    seat_ids.sort();

    for seat_id in seat_ids {
        // Seats that vanished since the hold was placed are not our concern.
        let Some(mut seat) = tx.lock_seat(seat_id, job.showtime_id).await? else {
            outcome.skipped += 1;
            continue;
        };

        if seat.release_if_held_since(job.placed_at) {
            tx.save_seat(&seat).await?;
            outcome.released += 1;
        } else {
            outcome.skipped += 1;
        }
    }

    Ok(outcome)
}

/// Fires one detached release per reservation batch once its hold runs out.
#[derive(Clone)]
pub struct ReleaseScheduler {
    repo: Arc<dyn SeatRepository>,
    policy: HoldPolicy,
}

impl ReleaseScheduler {
    pub fn new(repo: Arc<dyn SeatRepository>, policy: HoldPolicy) -> Self {
        Self { repo, policy }
    }

    pub fn policy(&self) -> &HoldPolicy {
        &self.policy
    }

    /// Spawn the release for `job`. It waits out the hold without holding any
    /// transaction and cannot be cancelled; dropping the handle detaches it.
    pub fn schedule(&self, job: ReleaseJob) -> JoinHandle<CoreResult<ReleaseOutcome>> {
        let repo = self.repo.clone();
        let policy = self.policy.clone();

        tokio::spawn(async move {
            tokio::time::sleep(policy.ttl).await;
            release_with_retry(repo.as_ref(), &job, &policy).await
        })
    }
}

pub(crate) async fn release_with_retry(
    repo: &dyn SeatRepository,
    job: &ReleaseJob,
    policy: &HoldPolicy,
) -> CoreResult<ReleaseOutcome> {
    let mut attempt = 0;

    loop {
        match release_holds(repo, job).await {
            Ok(outcome) => {
                if outcome.released > 0 {
                    info!(
                        "Released {} expired seat hold(s) for showtime {}",
                        outcome.released, job.showtime_id
                    );
                }
                return Ok(outcome);
            }
            Err(e) if attempt < policy.max_retries => {
                let delay = policy.backoff_for(attempt);
                warn!(
                    "Seat release for showtime {} failed (attempt {}), retrying in {:?}: {}",
                    job.showtime_id,
                    attempt + 1,
                    delay,
                    e
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                error!(
                    "Giving up releasing seats {:?} for showtime {} after {} attempts: {}",
                    job.seat_ids,
                    job.showtime_id,
                    attempt + 1,
                    e
                );
                return Err(e);
            }
        }
    }
}
