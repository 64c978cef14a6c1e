use axum::extract::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use std::env;
use std::fmt::{self, Debug, Display};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    pub code: i32,
    pub message: String,
}

const ENV_VAR: i32 = 1;
const DATABASE: i32 = 2;
const AUTHORIZOR: i32 = 3;
const CONFIG: i32 = 4;
const UNEXPECTED: i32 = 5;

const INVALID_STATE: i32 = 100;
const INVALID_INPUT: i32 = 101;
const UNAUTHORIZED: i32 = 102;
const NOT_FOUND: i32 = 103;
const NO_CAPACITY: i32 = 104;
const ALREADY_BOOKED: i32 = 105;
const NOT_A_PASSENGER: i32 = 106;
const NOT_OWNER: i32 = 107;
const CONTENTION: i32 = 108;

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code {})", self.message, self.code)
    }
}

impl std::error::Error for Error {}

impl From<env::VarError> for Error {
    fn from(err: env::VarError) -> Self {
        Error::env_var_error(err)
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Error::database_error(err)
    }
}

impl From<oso::OsoError> for Error {
    fn from(err: oso::OsoError) -> Self {
        Error::authorizor_error(err)
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let error_message = match self.code {
            1..=99 => "Internal Server Error",
            _ => self.message.as_str(),
        };

        let body = Json(json!({
            "code": self.code,
            "error": error_message,
            "retryable": self.is_retryable(),
        }));

        (status, body).into_response()
    }
}

impl Error {
    fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self.code {
            INVALID_STATE | NO_CAPACITY | ALREADY_BOOKED => StatusCode::CONFLICT,
            INVALID_INPUT => StatusCode::BAD_REQUEST,
            UNAUTHORIZED => StatusCode::UNAUTHORIZED,
            NOT_FOUND => StatusCode::NOT_FOUND,
            NOT_A_PASSENGER | NOT_OWNER => StatusCode::FORBIDDEN,
            CONTENTION => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Transient failures the caller may retry as a whole operation.
    pub fn is_retryable(&self) -> bool {
        self.code == CONTENTION
    }

    pub fn invalid_state_error() -> Self {
        Self::new(INVALID_STATE, "invalid state")
    }

    pub fn invalid_input_error() -> Self {
        Self::new(INVALID_INPUT, "invalid input")
    }

    pub fn unauthorized_error() -> Self {
        Self::new(UNAUTHORIZED, "unauthorized")
    }

    pub fn not_found_error() -> Self {
        Self::new(NOT_FOUND, "ride not found")
    }

    pub fn no_capacity_error() -> Self {
        Self::new(NO_CAPACITY, "no seats available")
    }

    pub fn already_booked_error() -> Self {
        Self::new(ALREADY_BOOKED, "ride already booked by passenger")
    }

    pub fn not_a_passenger_error() -> Self {
        Self::new(NOT_A_PASSENGER, "not a passenger on this ride")
    }

    pub fn not_owner_error() -> Self {
        Self::new(NOT_OWNER, "not the driver of this ride")
    }

    pub fn contention_error() -> Self {
        Self::new(CONTENTION, "ride is busy, retry later")
    }

    pub fn env_var_error(err: env::VarError) -> Self {
        tracing::error!("environment variable error: {}", err);
        Self::new(ENV_VAR, "environment variable error")
    }

    pub fn config_error(key: &str) -> Self {
        tracing::error!("malformed configuration value for {}", key);
        Self::new(CONFIG, format!("malformed configuration value for {}", key))
    }

    pub fn database_error<T: Debug>(err: T) -> Self {
        tracing::error!("database error: {:?}", err);
        Self::new(DATABASE, "database error")
    }

    pub fn authorizor_error<T: Debug>(err: T) -> Self {
        tracing::error!("authorizor error: {:?}", err);
        Self::new(AUTHORIZOR, "authorizor error")
    }

    pub fn unexpected_error() -> Self {
        Self::new(UNEXPECTED, "unexpected error")
    }

    pub fn is_invalid_state_error(&self) -> bool {
        self.code == INVALID_STATE
    }

    pub fn is_invalid_input_error(&self) -> bool {
        self.code == INVALID_INPUT
    }

    pub fn is_unauthorized_error(&self) -> bool {
        self.code == UNAUTHORIZED
    }

    pub fn is_not_found_error(&self) -> bool {
        self.code == NOT_FOUND
    }

    pub fn is_no_capacity_error(&self) -> bool {
        self.code == NO_CAPACITY
    }

    pub fn is_already_booked_error(&self) -> bool {
        self.code == ALREADY_BOOKED
    }

    pub fn is_not_a_passenger_error(&self) -> bool {
        self.code == NOT_A_PASSENGER
    }

    pub fn is_not_owner_error(&self) -> bool {
        self.code == NOT_OWNER
    }

    pub fn is_contention_error(&self) -> bool {
        self.code == CONTENTION
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn business_errors_map_to_distinct_statuses() {
        assert_eq!(Error::invalid_input_error().status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(Error::unauthorized_error().status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(Error::not_found_error().status_code(), StatusCode::NOT_FOUND);
        assert_eq!(Error::invalid_state_error().status_code(), StatusCode::CONFLICT);
        assert_eq!(Error::no_capacity_error().status_code(), StatusCode::CONFLICT);
        assert_eq!(Error::already_booked_error().status_code(), StatusCode::CONFLICT);
        assert_eq!(Error::not_a_passenger_error().status_code(), StatusCode::FORBIDDEN);
        assert_eq!(Error::not_owner_error().status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            Error::contention_error().status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn only_contention_is_retryable() {
        assert!(Error::contention_error().is_retryable());
        assert!(!Error::no_capacity_error().is_retryable());
        assert!(!Error::unexpected_error().is_retryable());
    }

    #[test]
    fn internal_errors_hide_details() {
        let response = Error::database_error("connection reset").into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
