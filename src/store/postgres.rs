use async_trait::async_trait;
use sqlx::{
    postgres::{PgPoolOptions, PgRow},
    types::Json,
    Executor, Pool, Postgres, QueryBuilder, Row,
};
use uuid::Uuid;

use super::{RideFilter, RideStore, Snapshot, Version, Write};
use crate::entities::Ride;
use crate::error::Error;

/// Rides live in a single table: the full record as JSONB next to the columns
/// the store filters and guards on.
pub struct PgRideStore {
    pool: Pool<Postgres>,
}

impl PgRideStore {
    pub async fn connect(db_uri: &str, max_connections: u32) -> Result<Self, Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(db_uri)
            .await?;

        Self::new(pool).await
    }

    #[tracing::instrument(name = "PgRideStore::new", skip_all)]
    pub async fn new(pool: Pool<Postgres>) -> Result<Self, Error> {
        // TODO: move this to migrations
        pool.execute(
            "CREATE TABLE IF NOT EXISTS rides (
                id UUID PRIMARY KEY,
                version BIGINT NOT NULL,
                status VARCHAR NOT NULL,
                driver_id UUID NOT NULL,
                scheduled_at TIMESTAMPTZ NOT NULL,
                data JSONB NOT NULL
            )",
        )
        .await?;
        pool.execute(
            "CREATE INDEX IF NOT EXISTS rides_status_scheduled_at_idx ON rides (status, scheduled_at)",
        )
        .await?;
        pool.execute("CREATE INDEX IF NOT EXISTS rides_driver_id_idx ON rides (driver_id)")
            .await?;

        Ok(Self { pool })
    }
}

fn snapshot_from_row(row: &PgRow) -> Result<Snapshot, Error> {
    let version: i64 = row.try_get("version")?;
    let Json(ride): Json<Ride> = row.try_get("data")?;

    Ok(Snapshot { version, ride })
}

#[async_trait]
impl RideStore for PgRideStore {
    #[tracing::instrument(skip(self, ride), fields(ride_id = %ride.id))]
    async fn insert(&self, ride: &Ride) -> Result<Snapshot, Error> {
        let mut conn = self.pool.acquire().await?;

        conn.execute(
            sqlx::query(
                "INSERT INTO rides (id, version, status, driver_id, scheduled_at, data) VALUES ($1, 1, $2, $3, $4, $5)",
            )
            .bind(&ride.id)
            .bind(ride.status.name())
            .bind(&ride.driver_id)
            .bind(&ride.scheduled_at)
            .bind(Json(ride)),
        )
        .await?;

        Ok(Snapshot {
            version: 1,
            ride: ride.clone(),
        })
    }

    #[tracing::instrument(skip(self))]
    async fn get(&self, id: Uuid) -> Result<Snapshot, Error> {
        let mut conn = self.pool.acquire().await?;

        let row = conn
            .fetch_optional(sqlx::query("SELECT version, data FROM rides WHERE id = $1").bind(&id))
            .await?
            .ok_or_else(Error::not_found_error)?;

        snapshot_from_row(&row)
    }

    #[tracing::instrument(skip(self, ride), fields(ride_id = %ride.id))]
    async fn conditional_update(&self, expected: Version, ride: &Ride) -> Result<Write, Error> {
        let mut conn = self.pool.acquire().await?;

        let maybe_row = conn
            .fetch_optional(
                sqlx::query(
                    "UPDATE rides SET version = version + 1, status = $3, data = $4 WHERE id = $1 AND version = $2 RETURNING version",
                )
                .bind(&ride.id)
                .bind(expected)
                .bind(ride.status.name())
                .bind(Json(ride)),
            )
            .await?;

        if let Some(row) = maybe_row {
            let version: i64 = row.try_get("version")?;

            return Ok(Write::Committed(Snapshot {
                version,
                ride: ride.clone(),
            }));
        }

        // nothing matched: either the version moved on or the ride is gone
        conn.fetch_optional(sqlx::query("SELECT 1 FROM rides WHERE id = $1").bind(&ride.id))
            .await?
            .ok_or_else(Error::not_found_error)?;

        Ok(Write::VersionMismatch)
    }

    #[tracing::instrument(skip(self))]
    async fn scan(&self, filter: &RideFilter) -> Result<Vec<Snapshot>, Error> {
        let mut query = QueryBuilder::<Postgres>::new("SELECT version, data FROM rides WHERE TRUE");

        if let Some(status) = filter.status {
            query.push(" AND status = ").push_bind(status);
        }

        if let Some(before) = filter.scheduled_before {
            query.push(" AND scheduled_at < ").push_bind(before);
        }

        if let Some(driver_id) = filter.driver_id {
            query.push(" AND driver_id = ").push_bind(driver_id);
        }

        if let Some(passenger_id) = filter.passenger_id {
            query
                .push(" AND jsonb_exists(data->'passengers', ")
                .push_bind(passenger_id.to_string())
                .push(")");
        }

        query.push(" ORDER BY scheduled_at ASC");

        let mut conn = self.pool.acquire().await?;
        let rows = conn.fetch_all(query.build()).await?;

        rows.iter().map(snapshot_from_row).collect()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;
    use crate::entities::sample_offer;

    async fn connect() -> Option<PgRideStore> {
        let url = std::env::var("DATABASE_URL").ok()?;

        Some(PgRideStore::connect(&url, 2).await.unwrap())
    }

    fn ride() -> Ride {
        Ride::offer(Uuid::new_v4(), sample_offer(2, Utc::now() + Duration::hours(1))).unwrap()
    }

    #[tokio::test]
    #[ignore = "needs a Postgres database in DATABASE_URL"]
    async fn stale_version_is_rejected() {
        let store = match connect().await {
            Some(store) => store,
            None => return,
        };

        let inserted = store.insert(&ride()).await.unwrap();
        assert_eq!(inserted.version, 1);

        let passenger = Uuid::new_v4();
        let mut booked = inserted.ride.clone();
        booked.book(passenger).unwrap();

        let committed = match store.conditional_update(1, &booked).await.unwrap() {
            Write::Committed(snapshot) => snapshot,
            Write::VersionMismatch => panic!("first write should land"),
        };
        assert_eq!(committed.version, 2);

        let mut late = inserted.ride.clone();
        late.book(Uuid::new_v4()).unwrap();
        assert!(matches!(
            store.conditional_update(1, &late).await.unwrap(),
            Write::VersionMismatch
        ));

        let current = store.get(booked.id).await.unwrap();
        assert_eq!(current.version, 2);
        assert_eq!(current.ride, booked);

        let missing = store.conditional_update(1, &ride()).await.unwrap_err();
        assert!(missing.is_not_found_error());
    }

    #[tokio::test]
    #[ignore = "needs a Postgres database in DATABASE_URL"]
    async fn scan_finds_rides_by_passenger() {
        let store = match connect().await {
            Some(store) => store,
            None => return,
        };

        let passenger = Uuid::new_v4();
        let mut booked = ride();
        booked.book(passenger).unwrap();
        store.insert(&booked).await.unwrap();
        store.insert(&ride()).await.unwrap();

        let found = store.scan(&RideFilter::booked_by(passenger)).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].ride.id, booked.id);

        let offered = store
            .scan(&RideFilter::offered_by(booked.driver_id))
            .await
            .unwrap();
        assert_eq!(offered.len(), 1);
    }
}
