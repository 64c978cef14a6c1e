use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{RideFilter, RideStore, Snapshot, Version, Write};
use crate::entities::Ride;
use crate::error::Error;

/// Process-local store for development and tests.
#[derive(Default)]
pub struct MemoryRideStore {
    rides: RwLock<HashMap<Uuid, Snapshot>>,
}

impl MemoryRideStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RideStore for MemoryRideStore {
    #[tracing::instrument(skip(self, ride), fields(ride_id = %ride.id))]
    async fn insert(&self, ride: &Ride) -> Result<Snapshot, Error> {
        let mut rides = self.rides.write().await;

        if rides.contains_key(&ride.id) {
            return Err(Error::invalid_input_error());
        }

        let snapshot = Snapshot {
            version: 1,
            ride: ride.clone(),
        };
        rides.insert(ride.id, snapshot.clone());

        Ok(snapshot)
    }

    async fn get(&self, id: Uuid) -> Result<Snapshot, Error> {
        self.rides
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(Error::not_found_error)
    }

    #[tracing::instrument(skip(self, ride), fields(ride_id = %ride.id))]
    async fn conditional_update(&self, expected: Version, ride: &Ride) -> Result<Write, Error> {
        let mut rides = self.rides.write().await;

        let current = rides.get_mut(&ride.id).ok_or_else(Error::not_found_error)?;

        if current.version != expected {
            return Ok(Write::VersionMismatch);
        }

        current.version += 1;
        current.ride = ride.clone();

        Ok(Write::Committed(current.clone()))
    }

    async fn scan(&self, filter: &RideFilter) -> Result<Vec<Snapshot>, Error> {
        let rides = self.rides.read().await;

        let mut snapshots: Vec<Snapshot> = rides
            .values()
            .filter(|snapshot| filter.matches(&snapshot.ride))
            .cloned()
            .collect();
        snapshots.sort_by_key(|snapshot| snapshot.ride.scheduled_at);

        Ok(snapshots)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use tokio_test::{assert_err, assert_ok};

    use super::*;
    use crate::entities::{sample_offer, RideStatus};

    fn ride_at(hours: i64) -> Ride {
        Ride::offer(Uuid::new_v4(), sample_offer(2, Utc::now() + Duration::hours(hours))).unwrap()
    }

    #[tokio::test]
    async fn stale_version_is_rejected() {
        let store = MemoryRideStore::new();
        let ride = ride_at(1);
        let inserted = assert_ok!(store.insert(&ride).await);

        let mut first = inserted.ride.clone();
        first.book(Uuid::new_v4()).unwrap();
        let committed = match assert_ok!(store.conditional_update(inserted.version, &first).await) {
            Write::Committed(snapshot) => snapshot,
            Write::VersionMismatch => panic!("first writer must win"),
        };
        assert_eq!(committed.version, inserted.version + 1);

        let mut second = inserted.ride.clone();
        second.book(Uuid::new_v4()).unwrap();
        let outcome = assert_ok!(store.conditional_update(inserted.version, &second).await);
        assert!(matches!(outcome, Write::VersionMismatch));

        let current = assert_ok!(store.get(ride.id).await);
        assert_eq!(current.ride, first);
    }

    #[tokio::test]
    async fn unknown_rides_are_not_found() {
        let store = MemoryRideStore::new();
        let ride = ride_at(1);

        let err = assert_err!(store.get(ride.id).await);
        assert!(err.is_not_found_error());

        let err = assert_err!(store.conditional_update(1, &ride).await);
        assert!(err.is_not_found_error());
    }

    #[tokio::test]
    async fn scan_applies_filter() {
        let store = MemoryRideStore::new();
        let now = Utc::now();

        let past = ride_at(-3);
        let future = ride_at(3);
        let mut past_booked = ride_at(-2);
        let passenger = Uuid::new_v4();
        past_booked.book(passenger).unwrap();
        past_booked.book(Uuid::new_v4()).unwrap();

        for ride in [&past, &future, &past_booked] {
            store.insert(ride).await.unwrap();
        }

        let stale = store.scan(&RideFilter::stale_open(now)).await.unwrap();
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].ride.id, past.id);

        let booked = store.scan(&RideFilter::booked_by(passenger)).await.unwrap();
        assert_eq!(booked.len(), 1);
        assert_eq!(booked[0].ride.status, RideStatus::Booked);

        let offered = store
            .scan(&RideFilter::offered_by(future.driver_id))
            .await
            .unwrap();
        assert_eq!(offered.len(), 1);

        let everything = store.scan(&RideFilter::default()).await.unwrap();
        assert_eq!(everything.len(), 3);
    }
}
