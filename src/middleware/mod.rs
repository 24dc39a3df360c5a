use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
};

use crate::models::{Actor, Role};

/// Header carrying the authenticated user id, set by the gateway in front of us.
pub const USER_ID_HEADER: &str = "x-user-id";
/// `admin` or `customer`; anything else is treated as a customer.
pub const USER_ROLE_HEADER: &str = "x-user-role";

// Authentication happens upstream; we only read the identity it forwards
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, String);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .ok_or((StatusCode::UNAUTHORIZED, "missing user identity".to_string()))?
            .trim()
            .parse::<i64>()
            .map_err(|_| (StatusCode::UNAUTHORIZED, "malformed user identity".to_string()))?;

        let role = match parts
            .headers
            .get(USER_ROLE_HEADER)
            .and_then(|value| value.to_str().ok())
        {
            Some(role) if role.eq_ignore_ascii_case("admin") => Role::Admin,
            _ => Role::Customer,
        };

        Ok(Actor { id, role })
    }
}
