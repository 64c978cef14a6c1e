use std::time::Duration;

use rand::Rng;
use uuid::Uuid;

use super::Engine;

use crate::{
    entities::Ride,
    error::Error,
    store::{Snapshot, Write},
};

impl Engine {
    /// Seat-allocation protocol: read the ride, let `apply` compute its
    /// successor, validate it and write it back guarded by the version that was
    /// read. A lost race restarts the cycle from a fresh read, at most
    /// `retry_budget` times.
    ///
    /// Errors returned by `apply` are business outcomes and end the cycle
    /// immediately.
    #[tracing::instrument(skip(self, apply))]
    pub(super) async fn transition<F>(&self, id: Uuid, mut apply: F) -> Result<Ride, Error>
    where
        F: FnMut(&mut Ride) -> Result<(), Error> + Send,
    {
        let budget = self.settings.retry_budget;

        for attempt in 0..budget {
            let Snapshot { version, ride } = self.store.get(id).await?;

            let mut next = ride.clone();
            apply(&mut next)?;
            next.check_transition_from(&ride)?;

            match self.store.conditional_update(version, &next).await? {
                Write::Committed(committed) => return Ok(committed.ride),
                Write::VersionMismatch => {
                    tracing::debug!(attempt, version, "lost race on ride, retrying");

                    if attempt + 1 < budget {
                        self.backoff(attempt).await;
                    }
                }
            }
        }

        tracing::warn!(budget, "retry budget exhausted");

        Err(Error::contention_error())
    }

    async fn backoff(&self, attempt: u32) {
        let ceiling = self.settings.retry_backoff.as_micros() as u64 * u64::from(attempt + 1);

        if ceiling == 0 {
            tokio::task::yield_now().await;
            return;
        }

        let pause = {
            let mut rng = rand::thread_rng();
            rng.gen_range(0..=ceiling)
        };

        tokio::time::sleep(Duration::from_micros(pause)).await;
    }
}
