use async_trait::async_trait;
use axum::extract::{FromRequest, RequestParts};
use axum::http::HeaderMap;
use uuid::Uuid;

use crate::auth::User;
use crate::error::Error;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLES_HEADER: &str = "x-user-roles";

/// The caller identity forwarded by the gateway that verified it.
#[async_trait]
impl<B> FromRequest<B> for User
where
    B: Send,
{
    type Rejection = Error;

    async fn from_request(req: &mut RequestParts<B>) -> Result<Self, Self::Rejection> {
        user_from_headers(req.headers())
    }
}

fn user_from_headers(headers: &HeaderMap) -> Result<User, Error> {
    let id = headers
        .get(USER_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| Uuid::parse_str(value.trim()).ok())
        .ok_or_else(Error::unauthorized_error)?;

    let roles = match headers.get(USER_ROLES_HEADER) {
        Some(value) => value
            .to_str()
            .map_err(|_| Error::unauthorized_error())?
            .split(',')
            .map(str::trim)
            .filter(|role| !role.is_empty())
            .map(String::from)
            .collect(),
        None => vec![],
    };

    Ok(User { id, roles })
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn reads_id_and_roles() {
        let id = Uuid::new_v4();
        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_HEADER, HeaderValue::from_str(&id.to_string()).unwrap());
        headers.insert(USER_ROLES_HEADER, HeaderValue::from_static("driver, ,admin"));

        let user = user_from_headers(&headers).unwrap();
        assert_eq!(user.id, id);
        assert_eq!(user.roles, vec!["driver".to_string(), "admin".to_string()]);
    }

    #[test]
    fn roles_are_optional() {
        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_HEADER, HeaderValue::from_str(&Uuid::new_v4().to_string()).unwrap());

        assert!(user_from_headers(&headers).unwrap().roles.is_empty());
    }

    #[test]
    fn missing_or_malformed_id_is_unauthorized() {
        assert!(user_from_headers(&HeaderMap::new())
            .unwrap_err()
            .is_unauthorized_error());

        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_HEADER, HeaderValue::from_static("driver-42"));
        assert!(user_from_headers(&headers).unwrap_err().is_unauthorized_error());
    }
}
