use crate::{
    AppState,
    api::models::users::CurrentUser,
    auth::session,
    config::Config,
    errors::{Error, Result},
};
use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use tracing::{debug, instrument, trace};

/// Extract user from an `Authorization: Bearer <jwt>` header if present
/// Returns:
/// - None: No Authorization header or not a Bearer token
/// - Some(Ok(user)): Valid token found and verified
/// - Some(Err(error)): Bearer token present but invalid or expired
#[instrument(skip(parts, config))]
fn try_bearer_auth(parts: &Parts, config: &Config) -> Option<Result<CurrentUser>> {
    let auth_header = parts.headers.get(header::AUTHORIZATION)?;

    let auth_str = match auth_header.to_str() {
        Ok(s) => s,
        Err(e) => {
            return Some(Err(Error::BadRequest {
                message: format!("Invalid authorization header: {e}"),
            }));
        }
    };

    let token = auth_str.strip_prefix("Bearer ")?;
    Some(session::verify_session_token(token.trim(), config))
}

/// Extract user from the JWT session cookie if present and valid
/// Returns:
/// - None: No session cookie present, or none of them verified
/// - Some(Ok(user)): Valid JWT found and verified
/// - Some(Err(error)): Cookie header present but unreadable
#[instrument(skip(parts, config))]
fn try_session_cookie_auth(parts: &Parts, config: &Config) -> Option<Result<CurrentUser>> {
    let cookie_header = parts.headers.get(header::COOKIE)?;

    let cookie_str = match cookie_header.to_str() {
        Ok(s) => s,
        Err(e) => {
            return Some(Err(Error::BadRequest {
                message: format!("Invalid cookie header: {e}"),
            }));
        }
    };
    let cookie_name = &config.auth.native.session.cookie_name;

    for cookie in cookie_str.split(';') {
        if let Some((name, value)) = cookie.trim().split_once('=')
            && name == cookie_name
            && let Ok(user) = session::verify_session_token(value, config)
        {
            return Some(Ok(user));
        }
        // Expired or stale cookies are expected; keep looking
    }
    None
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Error;

    #[instrument(skip(parts, state))]
    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        // A valid credential from either source wins; an invalid bearer token does not
        // prevent a valid session cookie from authenticating the request.
        let mut auth_errors = Vec::new();

        match try_bearer_auth(parts, &state.config) {
            Some(Ok(user)) => {
                debug!("Found bearer token authenticated user: {}", user.id);
                return Ok(user);
            }
            Some(Err(e)) => {
                trace!("Bearer token authentication failed: {:?}", e);
                auth_errors.push(("Bearer token", e));
            }
            None => trace!("No bearer token authentication attempted"),
        }

        if state.config.auth.native.enabled {
            match try_session_cookie_auth(parts, &state.config) {
                Some(Ok(user)) => {
                    debug!("Found session cookie authenticated user: {}", user.id);
                    return Ok(user);
                }
                Some(Err(e)) => {
                    trace!("Session cookie authentication failed: {:?}", e);
                    auth_errors.push(("Session cookie", e));
                }
                None => trace!("No session cookie authentication attempted"),
            }
        }

        trace!("All authentication attempts failed ({}): {:?}", auth_errors.len(), auth_errors);
        Err(Error::Unauthenticated { message: None })
    }
}
