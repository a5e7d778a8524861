use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use tracing::{debug, warn};

use super::jwt::JwtKeys;
use crate::error::AppError;
use crate::state::AppState;
use crate::store::{User, UserRepository};

/// The authenticated caller, resolved from the bearer token.
pub struct CurrentUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or_else(|| {
                debug!("missing Authorization header");
                AppError::Unauthenticated
            })?;

        let token = bearer_token(header).ok_or_else(|| {
            debug!("invalid auth scheme");
            AppError::Unauthenticated
        })?;

        let user = resolve_principal(&state.keys, state.store.as_ref(), token).await?;
        Ok(CurrentUser(user))
    }
}

/// `Bearer <token>`, scheme matched case-insensitively.
pub(crate) fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.split_once(' ')?;
    let token = token.trim();
    if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() {
        Some(token)
    } else {
        None
    }
}

/// Maps a token to the user it names. Every failure is `Unauthenticated`
/// except a store outage.
pub async fn resolve_principal<U>(keys: &JwtKeys, users: &U, token: &str) -> Result<User, AppError>
where
    U: UserRepository + ?Sized,
{
    let claims = keys.validate(token).map_err(|e| {
        warn!(reason = %e, "token rejected");
        AppError::Unauthenticated
    })?;

    match users.find_user_by_email(&claims.sub).await? {
        Some(user) => Ok(user),
        None => {
            warn!("token subject has no account");
            Err(AppError::Unauthenticated)
        }
    }
}
