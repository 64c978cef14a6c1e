use std::time::Duration;

use chrono::Utc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::api::DynAPI;
use crate::auth::User;

/// Periodically expires stale open rides through the engine.
pub struct Sweeper {
    api: DynAPI,
    interval: Duration,
    user: User,
}

pub struct SweeperHandle {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl Sweeper {
    pub fn new(api: DynAPI, interval: Duration) -> Self {
        Self {
            api,
            interval,
            user: User::new_system_user(),
        }
    }

    /// Spawns the sweep loop. The first sweep runs immediately.
    pub fn start(self) -> SweeperHandle {
        let (shutdown, mut stopped) = oneshot::channel();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            tracing::info!(interval = ?self.interval, "sweeper started");

            loop {
                tokio::select! {
                    _ = &mut stopped => break,
                    _ = ticker.tick() => self.sweep().await,
                }
            }

            tracing::info!("sweeper stopped");
        });

        SweeperHandle { shutdown, task }
    }

    #[tracing::instrument(name = "Sweeper::sweep", skip(self))]
    async fn sweep(&self) {
        if let Err(err) = self
            .api
            .expire_stale_rides(self.user.clone(), Utc::now())
            .await
        {
            tracing::error!("sweep failed: {}", err);
        }
    }
}

impl SweeperHandle {
    /// Signals the loop and waits for an in-flight sweep to finish.
    pub async fn stop(self) {
        let _ = self.shutdown.send(());

        if let Err(err) = self.task.await {
            tracing::error!("sweeper task ended abnormally: {}", err);
        }
    }
}
