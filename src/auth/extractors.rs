use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts, HeaderMap, StatusCode},
};
use tracing::warn;

use crate::{
    auth::{
        cookies::{cookie_value, ACCESS_COOKIE},
        jwt::JwtKeys,
    },
    state::AppState,
    users::repo::User,
};

/// Identity resolved from a verified access token.
pub struct AuthUser {
    pub user_id: i64,
    pub email: String,
}

/// Candidate token sources in priority order: the access cookie, then a
/// Bearer Authorization header.
pub(crate) fn extract_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = cookie_value(headers, ACCESS_COOKIE) {
        return Some(token);
    }
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.to_string())
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = (StatusCode, String);

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);

        let token = extract_token(&parts.headers).ok_or((
            StatusCode::UNAUTHORIZED,
            "Missing authentication token".to_string(),
        ))?;

        let keys = JwtKeys::from_ref(&state);
        let claims = match keys.verify(&token) {
            Ok(c) => c,
            Err(_) => {
                warn!("invalid or expired token");
                return Err((
                    StatusCode::UNAUTHORIZED,
                    "Invalid or expired token".to_string(),
                ));
            }
        };

        // The account may have been deleted since the token was issued.
        match User::find_by_id(&state.db, claims.sub).await {
            Ok(Some(_)) => Ok(AuthUser {
                user_id: claims.sub,
                email: claims.email,
            }),
            Ok(None) => {
                warn!(user_id = claims.sub, "token for unknown user");
                Err((StatusCode::UNAUTHORIZED, "Unknown user".to_string()))
            }
            Err(e) => {
                tracing::error!(error = %e, user_id = claims.sub, "user lookup failed");
                Err((StatusCode::UNAUTHORIZED, "Unknown user".to_string()))
            }
        }
    }
}
