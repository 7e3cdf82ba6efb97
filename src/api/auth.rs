use actix_web::dev::Payload;
use actix_web::error::ErrorUnauthorized;
use actix_web::{FromRequest, HttpRequest};
use std::future::{ready, Ready};

// ============================================================================
// Caller Identity
// ============================================================================
//
// Authentication happens upstream: the gateway resolves the caller and
// forwards the principal in a trusted header. This extractor consumes it
// and rejects requests that arrive without one. The value is never taken
// from the request body.
//
// ============================================================================

pub const USER_ID_HEADER: &str = "x-user-id";

/// The principal resolved by the upstream gateway.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub String);

impl FromRequest for AuthenticatedUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let user = req
            .headers()
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(|value| AuthenticatedUser(value.to_string()));

        match user {
            Some(user) => ready(Ok(user)),
            None => ready(Err(ErrorUnauthorized("Missing user identity"))),
        }
    }
}
