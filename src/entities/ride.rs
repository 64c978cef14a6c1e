use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use oso::PolarClass;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::Location;
use crate::error::Error;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Ride {
    pub id: Uuid,
    pub driver_id: Uuid,
    pub pickup: Location,
    pub dropoff: Location,
    pub price: f64,
    pub scheduled_at: DateTime<Utc>,
    pub total_seats: u32,
    pub seats_available: u32,
    pub passengers: BTreeSet<Uuid>,
    pub status: Status,
    pub created_at: DateTime<Utc>,
}

/// What a driver submits when offering a ride.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RideOffer {
    pub pickup: Location,
    pub dropoff: Location,
    pub price: f64,
    pub seats: u32,
    #[serde(alias = "date")]
    pub scheduled_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum Status {
    Open,
    Booked,
    Ongoing {
        started_at: DateTime<Utc>,
    },
    Completed {
        completed_at: DateTime<Utc>,
    },
    Cancelled {
        reason: CancellationReason,
        cancelled_at: DateTime<Utc>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancellationReason {
    Driver,
    Expired,
}

impl Status {
    pub const OPEN: &'static str = "open";
    pub const BOOKED: &'static str = "booked";
    pub const ONGOING: &'static str = "ongoing";
    pub const COMPLETED: &'static str = "completed";
    pub const CANCELLED: &'static str = "cancelled";

    pub fn name(&self) -> &'static str {
        match self {
            Self::Open => Self::OPEN,
            Self::Booked => Self::BOOKED,
            Self::Ongoing { .. } => Self::ONGOING,
            Self::Completed { .. } => Self::COMPLETED,
            Self::Cancelled { .. } => Self::CANCELLED,
        }
    }

    /// No seat or booking mutation is permitted once a ride is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Ongoing { .. } | Self::Completed { .. } | Self::Cancelled { .. }
        )
    }

    /// Edges of the lifecycle graph. `Open -> Open` covers seat changes that
    /// leave the ride bookable.
    pub fn can_transition_to(&self, next: &Status) -> bool {
        match (self, next) {
            (Self::Open, Self::Open | Self::Booked | Self::Cancelled { .. }) => true,
            (Self::Booked, Self::Open | Self::Ongoing { .. }) => true,
            (
                Self::Booked,
                Self::Cancelled {
                    reason: CancellationReason::Driver,
                    ..
                },
            ) => true,
            (Self::Ongoing { .. }, Self::Completed { .. }) => true,
            _ => false,
        }
    }
}

impl Ride {
    #[tracing::instrument]
    pub fn offer(driver_id: Uuid, offer: RideOffer) -> Result<Self, Error> {
        if offer.seats == 0 || !(offer.price.is_finite() && offer.price > 0.0) {
            return Err(Error::invalid_input_error());
        }

        if !offer.pickup.is_valid() || !offer.dropoff.is_valid() {
            return Err(Error::invalid_input_error());
        }

        Ok(Self {
            id: Uuid::new_v4(),
            driver_id,
            pickup: offer.pickup,
            dropoff: offer.dropoff,
            price: offer.price,
            scheduled_at: offer.scheduled_at,
            total_seats: offer.seats,
            seats_available: offer.seats,
            passengers: BTreeSet::new(),
            status: Status::Open,
            created_at: Utc::now(),
        })
    }

    pub fn is_open(&self) -> bool {
        self.status == Status::Open
    }

    pub fn is_full(&self) -> bool {
        self.status == Status::Booked
    }

    pub fn is_driven_by(&self, user_id: Uuid) -> bool {
        self.driver_id == user_id
    }

    pub fn has_passenger(&self, passenger_id: Uuid) -> bool {
        self.passengers.contains(&passenger_id)
    }

    fn in_booking_phase(&self) -> bool {
        matches!(self.status, Status::Open | Status::Booked)
    }

    #[tracing::instrument(skip(self), fields(ride_id = %self.id))]
    pub fn book(&mut self, passenger_id: Uuid) -> Result<(), Error> {
        if self.in_booking_phase() && self.has_passenger(passenger_id) {
            return Err(Error::already_booked_error());
        }

        // a booked ride has no seats left, whoever asks
        if self.is_full() {
            return Err(Error::no_capacity_error());
        }

        if !self.is_open() {
            return Err(Error::invalid_state_error());
        }

        let seats_available = self
            .seats_available
            .checked_sub(1)
            .ok_or_else(Error::no_capacity_error)?;

        self.passengers.insert(passenger_id);
        self.seats_available = seats_available;

        if seats_available == 0 {
            self.status = Status::Booked;
        }

        Ok(())
    }

    #[tracing::instrument(skip(self), fields(ride_id = %self.id))]
    pub fn cancel_booking(&mut self, passenger_id: Uuid) -> Result<(), Error> {
        if !self.in_booking_phase() {
            return Err(Error::invalid_state_error());
        }

        if !self.passengers.remove(&passenger_id) {
            return Err(Error::not_a_passenger_error());
        }

        self.seats_available += 1;
        self.status = Status::Open;

        Ok(())
    }

    /// Driver-initiated cancellation. Seats and passengers stay as they were so
    /// the record shows who had booked.
    #[tracing::instrument(skip(self), fields(ride_id = %self.id))]
    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<(), Error> {
        if !self.in_booking_phase() {
            return Err(Error::invalid_state_error());
        }

        self.status = Status::Cancelled {
            reason: CancellationReason::Driver,
            cancelled_at: now,
        };

        Ok(())
    }

    /// Only open rides whose scheduled time has passed can expire. Booked rides
    /// keep their passengers' commitment.
    #[tracing::instrument(skip(self), fields(ride_id = %self.id))]
    pub fn expire(&mut self, now: DateTime<Utc>) -> Result<(), Error> {
        if !self.is_open() || self.scheduled_at >= now {
            return Err(Error::invalid_state_error());
        }

        self.status = Status::Cancelled {
            reason: CancellationReason::Expired,
            cancelled_at: now,
        };

        Ok(())
    }

    #[tracing::instrument(skip(self), fields(ride_id = %self.id))]
    pub fn start(&mut self, now: DateTime<Utc>) -> Result<(), Error> {
        match self.status {
            Status::Booked => {
                self.status = Status::Ongoing { started_at: now };
                Ok(())
            }
            _ => Err(Error::invalid_state_error()),
        }
    }

    #[tracing::instrument(skip(self), fields(ride_id = %self.id))]
    pub fn complete(&mut self, now: DateTime<Utc>) -> Result<(), Error> {
        match self.status {
            Status::Ongoing { .. } => {
                self.status = Status::Completed { completed_at: now };
                Ok(())
            }
            _ => Err(Error::invalid_state_error()),
        }
    }

    /// Checks the seat/passenger/status invariants of a single snapshot.
    pub fn check_invariants(&self) -> Result<(), Error> {
        let occupied = self.passengers.len() as u64;

        if occupied + u64::from(self.seats_available) != u64::from(self.total_seats) {
            tracing::error!(ride_id = %self.id, "seat count does not match passengers");
            return Err(Error::unexpected_error());
        }

        if self.in_booking_phase() && self.is_full() != (self.seats_available == 0) {
            tracing::error!(ride_id = %self.id, status = self.status.name(), "status disagrees with seat count");
            return Err(Error::unexpected_error());
        }

        Ok(())
    }

    /// Validates `self` as the successor of `previous`: identity and offer terms
    /// are immutable, the status edge must exist and the invariants must hold.
    pub fn check_transition_from(&self, previous: &Ride) -> Result<(), Error> {
        let immutable_unchanged = self.id == previous.id
            && self.driver_id == previous.driver_id
            && self.pickup == previous.pickup
            && self.dropoff == previous.dropoff
            && self.price == previous.price
            && self.scheduled_at == previous.scheduled_at
            && self.total_seats == previous.total_seats
            && self.created_at == previous.created_at;

        if !immutable_unchanged {
            tracing::error!(ride_id = %self.id, "immutable ride field modified");
            return Err(Error::unexpected_error());
        }

        if !previous.status.can_transition_to(&self.status) {
            tracing::error!(
                ride_id = %self.id,
                from = previous.status.name(),
                to = self.status.name(),
                "illegal status transition"
            );
            return Err(Error::unexpected_error());
        }

        self.check_invariants()
    }
}

impl PolarClass for Ride {
    fn get_polar_class_builder() -> oso::ClassBuilder<Ride> {
        oso::Class::builder()
            .name("Ride")
            .add_attribute_getter("id", |recv: &Ride| recv.id)
            .add_attribute_getter("driver_id", |recv: &Ride| recv.driver_id)
            .add_attribute_getter("status", |recv: &Ride| recv.status.name().to_string())
            .add_method("is_driven_by", Ride::is_driven_by)
            .add_method("has_passenger", Ride::has_passenger)
    }

    fn get_polar_class() -> oso::Class {
        let builder = Ride::get_polar_class_builder();
        builder.build()
    }
}

#[cfg(test)]
pub(crate) fn sample_offer(seats: u32, scheduled_at: DateTime<Utc>) -> RideOffer {
    RideOffer {
        pickup: Location::new(29.6516, -82.3248, "Gainesville, FL"),
        dropoff: Location::new(28.5383, -81.3792, "Orlando, FL"),
        price: 25.5,
        seats,
        scheduled_at,
    }
}
