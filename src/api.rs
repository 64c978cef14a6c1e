use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::User;
use crate::entities::{Ride, RideOffer};
use crate::error::Error;

#[async_trait]
pub trait RideAPI {
    async fn offer_ride(&self, user: User, offer: RideOffer) -> Result<Ride, Error>;
    async fn find_ride(&self, user: User, id: Uuid) -> Result<Ride, Error>;
    async fn list_rides(&self, user: User) -> Result<UserRides, Error>;
    async fn book_ride(&self, user: User, id: Uuid) -> Result<Ride, Error>;
    async fn cancel_booking(&self, user: User, id: Uuid) -> Result<Ride, Error>;
    async fn cancel_ride(&self, user: User, id: Uuid) -> Result<Ride, Error>;
    async fn start_ride(&self, user: User, id: Uuid) -> Result<Ride, Error>;
    async fn complete_ride(&self, user: User, id: Uuid) -> Result<Ride, Error>;
}

#[async_trait]
pub trait ExpiryAPI {
    /// Cancels every open ride scheduled before `now`. Per-ride failures are
    /// counted in the report rather than returned.
    async fn expire_stale_rides(&self, user: User, now: DateTime<Utc>)
        -> Result<SweepReport, Error>;
}

pub trait API: RideAPI + ExpiryAPI {}

pub type DynAPI = Arc<dyn API + Send + Sync>;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct UserRides {
    pub offered: Vec<Ride>,
    pub booked: Vec<Ride>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    pub scanned: usize,
    pub expired: usize,
    pub skipped: usize,
    pub failed: usize,
}
