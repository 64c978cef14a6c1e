//! Keyed ride storage with compare-and-swap updates.
//!
//! Every stored ride carries a version that the store bumps on each committed
//! write. A writer reads a [`Snapshot`], computes the successor ride and hands
//! both back to [`RideStore::conditional_update`]; the write only lands if no
//! other writer committed in between.

mod memory;
mod postgres;

pub use memory::MemoryRideStore;
pub use postgres::PgRideStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::entities::Ride;
use crate::error::Error;

pub type Version = i64;

#[derive(Clone, Debug)]
pub struct Snapshot {
    pub version: Version,
    pub ride: Ride,
}

#[derive(Debug)]
pub enum Write {
    Committed(Snapshot),
    VersionMismatch,
}

/// Predicate for [`RideStore::scan`]. Unset fields match everything.
#[derive(Clone, Debug, Default)]
pub struct RideFilter {
    pub status: Option<&'static str>,
    pub scheduled_before: Option<DateTime<Utc>>,
    pub driver_id: Option<Uuid>,
    pub passenger_id: Option<Uuid>,
}

impl RideFilter {
    pub fn stale_open(now: DateTime<Utc>) -> Self {
        Self {
            status: Some(crate::entities::RideStatus::OPEN),
            scheduled_before: Some(now),
            ..Self::default()
        }
    }

    pub fn offered_by(driver_id: Uuid) -> Self {
        Self {
            driver_id: Some(driver_id),
            ..Self::default()
        }
    }

    pub fn booked_by(passenger_id: Uuid) -> Self {
        Self {
            passenger_id: Some(passenger_id),
            ..Self::default()
        }
    }

    pub fn matches(&self, ride: &Ride) -> bool {
        self.status.map_or(true, |name| ride.status.name() == name)
            && self
                .scheduled_before
                .map_or(true, |before| ride.scheduled_at < before)
            && self.driver_id.map_or(true, |id| ride.driver_id == id)
            && self.passenger_id.map_or(true, |id| ride.has_passenger(id))
    }
}

#[async_trait]
pub trait RideStore: Send + Sync {
    async fn insert(&self, ride: &Ride) -> Result<Snapshot, Error>;

    /// Fails with a not-found error for unknown ids.
    async fn get(&self, id: Uuid) -> Result<Snapshot, Error>;

    /// Replaces the stored ride only if its version still equals `expected`.
    async fn conditional_update(&self, expected: Version, ride: &Ride) -> Result<Write, Error>;

    async fn scan(&self, filter: &RideFilter) -> Result<Vec<Snapshot>, Error>;
}
