mod expiry_api;
mod helpers;
mod ride_api;


use std::sync::Arc;
use std::time::Duration;

use oso::Oso;

use crate::{api::API, auth::authorizor, error::Error, store::RideStore};

/// Tuning for the seat-allocation protocol and the expiry sweep.
#[derive(Clone, Debug)]
pub struct Settings {
    /// Read-compute-write attempts before a transition gives up with a
    /// contention error.
    pub retry_budget: u32,
    /// Upper bound of the randomized pause after the first lost race; it grows
    /// linearly with each further attempt.
    pub retry_backoff: Duration,
    pub sweep_record_timeout: Duration,
    /// Rides a sweep expires at once; keep it at or below the store's
    /// connection count.
    pub sweep_concurrency: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            retry_budget: 5,
            retry_backoff: Duration::from_millis(10),
            sweep_record_timeout: Duration::from_secs(2),
            sweep_concurrency: 4,
        }
    }
}

pub struct Engine {
    store: Arc<dyn RideStore>,
    authorizor: Oso,
    settings: Settings,
}

impl Engine {
    #[tracing::instrument(name = "Engine::new", skip_all)]
    pub fn new(store: Arc<dyn RideStore>, settings: Settings) -> Result<Self, Error> {
        Ok(Self {
            store,
            authorizor: authorizor::new()?,
            settings,
        })
    }
}

impl Engine {
    pub fn authorize<Actor, Action, Resource>(
        &self,
        actor: Actor,
        action: Action,
        resource: Resource,
    ) -> Result<(), Error>
    where
        Actor: oso::ToPolar,
        Action: oso::ToPolar,
        Resource: oso::ToPolar,
    {
        if self.authorizor.is_allowed(actor, action, resource)? {
            return Ok(());
        }

        Err(Error::unauthorized_error())
    }

    /// Like [`Engine::authorize`] for actions reserved to the ride's driver.
    pub fn authorize_owner<Actor, Action, Resource>(
        &self,
        actor: Actor,
        action: Action,
        resource: Resource,
    ) -> Result<(), Error>
    where
        Actor: oso::ToPolar,
        Action: oso::ToPolar,
        Resource: oso::ToPolar,
    {
        self.authorize(actor, action, resource).map_err(|err| {
            if err.is_unauthorized_error() {
                Error::not_owner_error()
            } else {
                err
            }
        })
    }
}

impl API for Engine {}
