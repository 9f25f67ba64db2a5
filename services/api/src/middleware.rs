//! Session middleware
//!
//! `session_middleware` runs on every request. It reads the session token
//! from the session cookie, falling back to an `Authorization: Bearer`
//! header, and attaches the resolved [`Identity`] to the request. Requests
//! without a usable token pass through anonymously; `require_identity`
//! turns those away on protected routes.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::{
    TypedHeader,
    extract::cookie::CookieJar,
    headers::{Authorization, authorization::Bearer},
};
use tracing::debug;

use crate::{error::UserError, models::Identity, state::AppState};

/// Raw session token of the current request
#[derive(Debug, Clone)]
pub struct SessionToken(pub String);

/// Resolve the caller's identity, if any
pub async fn session_middleware(
    State(state): State<AppState>,
    jar: CookieJar,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    mut req: Request,
    next: Next,
) -> Result<Response, UserError> {
    let token = state
        .cookies
        .token(&jar)
        .or_else(|| bearer.map(|TypedHeader(Authorization(bearer))| bearer.token().to_string()));

    if let Some(token) = token {
        match state.users.resolve_identity(&token).await {
            Ok(identity) => {
                req.extensions_mut().insert(identity);
                req.extensions_mut().insert(SessionToken(token));
            }
            Err(UserError::Unauthorized) => {
                debug!("Ignoring invalid or expired session token");
            }
            Err(e) => return Err(e),
        }
    }

    Ok(next.run(req).await)
}

/// Reject requests that carry no valid session
pub async fn require_identity(req: Request, next: Next) -> Result<Response, UserError> {
    if req.extensions().get::<Identity>().is_none() {
        return Err(UserError::Unauthorized);
    }

    Ok(next.run(req).await)
}
