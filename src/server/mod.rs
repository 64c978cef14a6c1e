mod handlers;
mod identity;

pub use identity::{USER_ID_HEADER, USER_ROLES_HEADER};

use std::future::Future;
use std::net::SocketAddr;

use axum::{
    extract::Extension,
    routing::{get, patch, post},
    Router,
};

use crate::api::DynAPI;
use crate::error::Error;
use crate::server::handlers::rides;

pub fn router(api: DynAPI) -> Router {
    Router::new()
        .route("/rides", post(rides::create).get(rides::list))
        .route("/rides/:id", get(rides::find))
        .route("/rides/:id/book", patch(rides::book))
        .route("/rides/:id/booking/cancel", patch(rides::cancel_booking))
        .route("/rides/:id/cancel", patch(rides::cancel))
        .route("/rides/:id/start", patch(rides::start))
        .route("/rides/:id/complete", patch(rides::complete))
        .layer(Extension(api))
}

/// Serves the ride API on `addr` until `shutdown` resolves.
pub async fn serve<F>(api: DynAPI, addr: SocketAddr, shutdown: F) -> Result<(), Error>
where
    F: Future<Output = ()>,
{
    let app = router(api);

    let server = axum::Server::try_bind(&addr).map_err(|err| {
        tracing::error!("failed to bind {}: {}", addr, err);
        Error::unexpected_error()
    })?;

    tracing::info!("listening on {}", addr);

    server
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|err| {
            tracing::error!("server error: {}", err);
            Error::unexpected_error()
        })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use chrono::Utc;
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use uuid::Uuid;

    use super::*;
    use crate::engine::{Engine, Settings};
    use crate::store::MemoryRideStore;

    fn app() -> Router {
        let store = Arc::new(MemoryRideStore::new());
        let api: DynAPI = Arc::new(Engine::new(store, Settings::default()).unwrap());

        router(api)
    }

    fn request(method: &str, uri: &str, user: Option<Uuid>, body: Option<Value>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(user) = user {
            builder = builder.header(USER_ID_HEADER, user.to_string());
        }

        match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn call(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };

        (status, body)
    }

    fn offer_body(seats: u32) -> Value {
        json!({
            "pickup": { "latitude": 29.65, "longitude": -82.32, "address": "Gainesville, FL" },
            "dropoff": { "latitude": 28.54, "longitude": -81.38, "address": "Orlando, FL" },
            "price": 25.5,
            "seats": seats,
            "date": (Utc::now() + chrono::Duration::days(1)).to_rfc3339(),
        })
    }

    #[tokio::test]
    async fn requests_without_identity_are_unauthorized() {
        let app = app();

        let (status, body) = call(&app, request("GET", "/rides", None, None)).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], 102);
        assert_eq!(body["retryable"], false);
    }

    #[tokio::test]
    async fn offer_book_and_list() {
        let app = app();
        let driver = Uuid::new_v4();
        let passenger = Uuid::new_v4();

        let (status, ride) = call(
            &app,
            request("POST", "/rides", Some(driver), Some(offer_body(1))),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(ride["status"]["name"], "open");
        let id = ride["id"].as_str().unwrap().to_string();

        let uri = format!("/rides/{}/book", id);
        let (status, ride) = call(&app, request("PATCH", &uri, Some(passenger), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(ride["status"]["name"], "booked");
        assert_eq!(ride["seats_available"], 0);

        let (status, body) = call(&app, request("PATCH", &uri, Some(Uuid::new_v4()), None)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], 104);

        let (status, rides) = call(&app, request("GET", "/rides", Some(passenger), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(rides["booked"][0]["id"], id.as_str());
        assert_eq!(rides["offered"], json!([]));
    }

    #[tokio::test]
    async fn errors_map_to_status_codes() {
        let app = app();
        let driver = Uuid::new_v4();
        let passenger = Uuid::new_v4();

        let (status, body) = call(
            &app,
            request("POST", "/rides", Some(driver), Some(offer_body(0))),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], 101);

        let missing = format!("/rides/{}", Uuid::new_v4());
        let (status, _) = call(&app, request("GET", &missing, Some(driver), None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_, ride) = call(
            &app,
            request("POST", "/rides", Some(driver), Some(offer_body(2))),
        )
        .await;
        let id = ride["id"].as_str().unwrap().to_string();

        let (status, body) = call(
            &app,
            request("PATCH", &format!("/rides/{}/cancel", id), Some(passenger), None),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["code"], 107);

        let (status, body) = call(
            &app,
            request("PATCH", &format!("/rides/{}/booking/cancel", id), Some(passenger), None),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["code"], 106);

        let book = format!("/rides/{}/book", id);
        call(&app, request("PATCH", &book, Some(passenger), None)).await;
        let (status, body) = call(&app, request("PATCH", &book, Some(passenger), None)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], 105);

        let (status, ride) = call(
            &app,
            request("PATCH", &format!("/rides/{}/cancel", id), Some(driver), None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(ride["status"]["name"], "cancelled");
        assert_eq!(ride["status"]["reason"], "driver");

        let (status, body) = call(&app, request("PATCH", &book, Some(Uuid::new_v4()), None)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], 100);
    }
}
