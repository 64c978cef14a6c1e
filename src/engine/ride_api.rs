use super::Engine;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::{
    api::{RideAPI, UserRides},
    auth::{Platform, User},
    entities::{Ride, RideOffer},
    error::Error,
    store::RideFilter,
};

#[async_trait]
impl RideAPI for Engine {
    #[tracing::instrument(skip(self))]
    async fn offer_ride(&self, user: User, offer: RideOffer) -> Result<Ride, Error> {
        self.authorize(user.clone(), "offer_ride", Platform::default())?;

        let ride = Ride::offer(user.id, offer)?;
        let snapshot = self.store.insert(&ride).await?;

        tracing::info!(ride_id = %ride.id, seats = ride.total_seats, "ride offered");

        Ok(snapshot.ride)
    }

    #[tracing::instrument(skip(self))]
    async fn find_ride(&self, user: User, id: Uuid) -> Result<Ride, Error> {
        let snapshot = self.store.get(id).await?;

        self.authorize(user.clone(), "read", snapshot.ride.clone())?;

        Ok(snapshot.ride)
    }

    #[tracing::instrument(skip(self))]
    async fn list_rides(&self, user: User) -> Result<UserRides, Error> {
        let offered = self.store.scan(&RideFilter::offered_by(user.id)).await?;
        let booked = self.store.scan(&RideFilter::booked_by(user.id)).await?;

        Ok(UserRides {
            offered: offered.into_iter().map(|snapshot| snapshot.ride).collect(),
            booked: booked.into_iter().map(|snapshot| snapshot.ride).collect(),
        })
    }

    #[tracing::instrument(skip(self))]
    async fn book_ride(&self, user: User, id: Uuid) -> Result<Ride, Error> {
        let ride = self
            .transition(id, |ride| {
                self.authorize(user.clone(), "book", ride.clone())?;
                ride.book(user.id)
            })
            .await?;

        tracing::info!(
            seats_available = ride.seats_available,
            status = ride.status.name(),
            "ride booked"
        );

        Ok(ride)
    }

    #[tracing::instrument(skip(self))]
    async fn cancel_booking(&self, user: User, id: Uuid) -> Result<Ride, Error> {
        let ride = self
            .transition(id, |ride| ride.cancel_booking(user.id))
            .await?;

        tracing::info!(
            seats_available = ride.seats_available,
            status = ride.status.name(),
            "booking cancelled"
        );

        Ok(ride)
    }

    #[tracing::instrument(skip(self))]
    async fn cancel_ride(&self, user: User, id: Uuid) -> Result<Ride, Error> {
        let now = Utc::now();

        let ride = self
            .transition(id, |ride| {
                self.authorize_owner(user.clone(), "cancel", ride.clone())?;
                ride.cancel(now)
            })
            .await?;

        tracing::info!(passengers = ride.passengers.len(), "ride cancelled by driver");

        Ok(ride)
    }

    #[tracing::instrument(skip(self))]
    async fn start_ride(&self, user: User, id: Uuid) -> Result<Ride, Error> {
        let now = Utc::now();

        self.transition(id, |ride| {
            self.authorize_owner(user.clone(), "start", ride.clone())?;
            ride.start(now)
        })
        .await
    }

    #[tracing::instrument(skip(self))]
    async fn complete_ride(&self, user: User, id: Uuid) -> Result<Ride, Error> {
        let now = Utc::now();

        self.transition(id, |ride| {
            self.authorize_owner(user.clone(), "complete", ride.clone())?;
            ride.complete(now)
        })
        .await
    }
}
