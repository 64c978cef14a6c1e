mod location;
mod ride;

pub use location::Location;
pub use ride::{CancellationReason, Ride, RideOffer, Status as RideStatus};

#[cfg(test)]
pub(crate) use ride::sample_offer;
