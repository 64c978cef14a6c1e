use oso::{Oso, PolarClass};

use crate::auth::{Platform, User};
use crate::entities::Ride;
use crate::error::Error;

pub fn new() -> Result<Oso, Error> {
    let mut o = Oso::new();

    o.register_class(Platform::get_polar_class())?;
    o.register_class(User::get_polar_class())?;
    o.register_class(Ride::get_polar_class())?;

    o.load_str(include_str!("rules.polar"))?;

    Ok(o)
}

#[cfg(test)]
fn test_ride(driver_id: uuid::Uuid) -> Ride {
    use chrono::{Duration, Utc};

    Ride::offer(
        driver_id,
        crate::entities::sample_offer(2, Utc::now() + Duration::hours(1)),
    )
    .unwrap()
}

#[test]
fn platform_system_role_test() {
    use uuid::Uuid;

    let authorizor = new().unwrap();

    let unprivileged = User::new(Uuid::new_v4());
    let system = User::new_system_user();

    let result = authorizor.is_allowed(unprivileged.clone(), "expire_rides", Platform::default());
    assert_eq!(result.unwrap(), false);

    let result = authorizor.is_allowed(system.clone(), "expire_rides", Platform::default());
    assert_eq!(result.unwrap(), true);

    let result = authorizor.is_allowed(unprivileged.clone(), "offer_ride", Platform::default());
    assert_eq!(result.unwrap(), true);
}

#[test]
fn ride_driver_role_test() {
    use uuid::Uuid;

    let authorizor = new().unwrap();

    let driver = User::new(Uuid::new_v4());
    let ride = test_ride(driver.id);

    for action in ["read", "cancel", "start", "complete"] {
        let result = authorizor.is_allowed(driver.clone(), action, ride.clone());
        assert_eq!(result.unwrap(), true, "{}", action);
    }
}

#[test]
fn ride_stranger_role_test() {
    use uuid::Uuid;

    let authorizor = new().unwrap();

    let stranger = User::new(Uuid::new_v4());
    let system = User::new_system_user();
    let ride = test_ride(Uuid::new_v4());

    let result = authorizor.is_allowed(stranger.clone(), "read", ride.clone());
    assert_eq!(result.unwrap(), true);

    let result = authorizor.is_allowed(stranger.clone(), "book", ride.clone());
    assert_eq!(result.unwrap(), true);

    for action in ["cancel", "start", "complete"] {
        let result = authorizor.is_allowed(stranger.clone(), action, ride.clone());
        assert_eq!(result.unwrap(), false, "{}", action);

        // the system role does not own rides either
        let result = authorizor.is_allowed(system.clone(), action, ride.clone());
        assert_eq!(result.unwrap(), false, "{}", action);
    }
}

#[test]
fn ride_passenger_role_test() {
    use uuid::Uuid;

    let authorizor = new().unwrap();

    let passenger = User::new(Uuid::new_v4());
    let mut ride = test_ride(Uuid::new_v4());
    ride.book(passenger.id).unwrap();

    let result = authorizor.is_allowed(passenger.clone(), "cancel", ride.clone());
    assert_eq!(result.unwrap(), false);

    let result = authorizor.is_allowed(passenger.clone(), "read", ride.clone());
    assert_eq!(result.unwrap(), true);
}
