use std::env;
use std::sync::Arc;

use vectura::api::DynAPI;
use vectura::config::{Config, StoreKind};
use vectura::engine::Engine;
use vectura::error::Error;
use vectura::server;
use vectura::store::{MemoryRideStore, PgRideStore, RideStore};
use vectura::sweeper::Sweeper;

#[tokio::main]
async fn main() -> Result<(), Error> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = Config::from_env()?;

    let store: Arc<dyn RideStore> = match config.store {
        StoreKind::Postgres => {
            let url = config
                .database_url
                .as_deref()
                .ok_or(env::VarError::NotPresent)?;

            Arc::new(PgRideStore::connect(url, config.database_max_connections).await?)
        }
        StoreKind::Memory => {
            tracing::warn!("using in-memory ride store, rides are lost on exit");
            Arc::new(MemoryRideStore::new())
        }
    };

    let api: DynAPI = Arc::new(Engine::new(store, config.engine_settings())?);

    let sweeper = Sweeper::new(api.clone(), config.sweep_interval).start();

    let result = server::serve(api, config.bind_addr, async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for shutdown signal: {}", err);
        }
        tracing::info!("shutting down");
    })
    .await;

    sweeper.stop().await;

    result
}
