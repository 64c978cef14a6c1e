use super::Engine;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};

use crate::{
    api::{ExpiryAPI, SweepReport},
    auth::{Platform, User},
    error::Error,
    store::{RideFilter, Snapshot, Write},
};

#[derive(Debug, PartialEq, Eq)]
pub(super) enum Expiry {
    Expired,
    Skipped,
}

#[async_trait]
impl ExpiryAPI for Engine {
    #[tracing::instrument(skip(self, user))]
    async fn expire_stale_rides(
        &self,
        user: User,
        now: DateTime<Utc>,
    ) -> Result<SweepReport, Error> {
        self.authorize(user.clone(), "expire_rides", Platform::default())?;

        let snapshots = self.store.scan(&RideFilter::stale_open(now)).await?;
        let timeout = self.settings.sweep_record_timeout;

        let mut report = SweepReport {
            scanned: snapshots.len(),
            ..SweepReport::default()
        };

        let concurrency = self.settings.sweep_concurrency.max(1);

        // the per-record timeout starts when a ride is picked up, not at scan time
        let outcomes: Vec<_> = stream::iter(snapshots)
            .map(move |snapshot| {
                let ride_id = snapshot.ride.id;

                async move {
                    let outcome =
                        tokio::time::timeout(timeout, self.expire_ride(snapshot, now)).await;
                    (ride_id, outcome)
                }
            })
            .buffer_unordered(concurrency)
            .collect()
            .await;

        for (ride_id, outcome) in outcomes {
            match outcome {
                Ok(Ok(Expiry::Expired)) => report.expired += 1,
                Ok(Ok(Expiry::Skipped)) => report.skipped += 1,
                Ok(Err(err)) => {
                    tracing::warn!(%ride_id, "failed to expire ride: {}", err);
                    report.failed += 1;
                }
                Err(_) => {
                    tracing::warn!(%ride_id, ?timeout, "timed out expiring ride");
                    report.failed += 1;
                }
            }
        }

        tracing::info!(
            scanned = report.scanned,
            expired = report.expired,
            skipped = report.skipped,
            failed = report.failed,
            "expired stale rides"
        );

        Ok(report)
    }
}

impl Engine {
    /// One guarded write against the version the sweep scanned. A ride that
    /// moved on in the meantime is left alone, never retried.
    #[tracing::instrument(skip(self, snapshot), fields(ride_id = %snapshot.ride.id))]
    pub(super) async fn expire_ride(
        &self,
        snapshot: Snapshot,
        now: DateTime<Utc>,
    ) -> Result<Expiry, Error> {
        let mut ride = snapshot.ride.clone();

        if ride.expire(now).is_err() {
            tracing::debug!(status = snapshot.ride.status.name(), "ride no longer expirable");
            return Ok(Expiry::Skipped);
        }

        ride.check_transition_from(&snapshot.ride)?;

        match self.store.conditional_update(snapshot.version, &ride).await? {
            Write::Committed(_) => Ok(Expiry::Expired),
            Write::VersionMismatch => {
                tracing::debug!("ride changed since scan, skipping");
                Ok(Expiry::Skipped)
            }
        }
    }
}
