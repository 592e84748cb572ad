use axum::{
    extract::{FromRef, State},
    http::{header, HeaderMap, StatusCode},
    response::{AppendHeaders, IntoResponse},
    routing::{get, post},
    Json, Router,
};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        cookies::{clear_cookie, cookie_value, session_cookie, ACCESS_COOKIE, REFRESH_COOKIE},
        dto::{LoginRequest, MessageResponse, ProfileResponse, RegisterRequest, SessionResponse},
        extractors::AuthUser,
        jwt::JwtKeys,
        password::{hash_password, verify_password},
    },
    error::{ApiError, ApiResult},
    state::AppState,
    users::repo::User,
};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/auth/logout", post(logout))
        .route("/auth/profile", get(profile))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(mut payload): Json<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
    payload.email = payload.email.trim().to_lowercase();

    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(ApiError::BadRequest("Invalid email".into()));
    }

    if payload.password.len() < 8 {
        warn!("password too short");
        return Err(ApiError::BadRequest("Password too short".into()));
    }

    if User::find_by_email(&state.db, &payload.email).await?.is_some() {
        warn!(email = %payload.email, "email already registered");
        return Err(ApiError::Conflict("Email already registered".into()));
    }

    let hash = hash_password(&payload.password)?;
    let user = User::create(&state.db, &payload.email, &payload.name, &hash, payload.age).await?;

    let keys = JwtKeys::from_ref(&state);
    let access_token = keys.sign_access(user.id, &user.email)?;
    let refresh_token = keys.sign_refresh(user.id, &user.email)?;
    User::store_refresh_token(&state.db, user.id, &refresh_token).await?;

    info!(user_id = user.id, email = %user.email, "user registered");
    let secure = state.config.is_production();
    Ok((
        StatusCode::CREATED,
        AppendHeaders([
            (
                header::SET_COOKIE,
                session_cookie(ACCESS_COOKIE, &access_token, keys.access_ttl, secure),
            ),
            (
                header::SET_COOKIE,
                session_cookie(REFRESH_COOKIE, &refresh_token, keys.refresh_ttl, secure),
            ),
        ]),
        Json(SessionResponse {
            user: user.into(),
            message: "Registration successful",
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(mut payload): Json<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    payload.email = payload.email.trim().to_lowercase();

    let user = match User::find_by_email(&state.db, &payload.email).await? {
        Some(u) => u,
        None => {
            warn!(email = %payload.email, "login unknown email");
            return Err(ApiError::Unauthorized("Invalid credentials".into()));
        }
    };

    if !verify_password(&payload.password, &user.password)? {
        warn!(email = %payload.email, user_id = user.id, "login invalid password");
        return Err(ApiError::Unauthorized("Invalid credentials".into()));
    }

    let keys = JwtKeys::from_ref(&state);
    let access_token = keys.sign_access(user.id, &user.email)?;
    let refresh_token = keys.sign_refresh(user.id, &user.email)?;
    // Overwrites whatever refresh token was stored before, so any earlier
    // session's refresh token stops working here.
    User::store_refresh_token(&state.db, user.id, &refresh_token).await?;

    info!(user_id = user.id, email = %user.email, "user logged in");
    let secure = state.config.is_production();
    Ok((
        AppendHeaders([
            (
                header::SET_COOKIE,
                session_cookie(ACCESS_COOKIE, &access_token, keys.access_ttl, secure),
            ),
            (
                header::SET_COOKIE,
                session_cookie(REFRESH_COOKIE, &refresh_token, keys.refresh_ttl, secure),
            ),
        ]),
        Json(SessionResponse {
            user: user.into(),
            message: "Login successful",
        }),
    ))
}

#[instrument(skip(state, headers))]
pub async fn refresh(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<impl IntoResponse> {
    let presented = cookie_value(&headers, REFRESH_COOKIE)
        .ok_or_else(|| ApiError::Unauthorized("Missing refresh token".into()))?;

    let keys = JwtKeys::from_ref(&state);
    let claims = keys
        .verify(&presented)
        .map_err(|_| ApiError::Unauthorized("Invalid or expired refresh token".into()))?;

    let access_token = keys.sign_access(claims.sub, &claims.email)?;
    let refresh_token = keys.sign_refresh(claims.sub, &claims.email)?;

    // Single conditional write: a rotated-out token, an unknown user, or a
    // concurrent refresh that already rotated the slot all match zero rows.
    let rotated =
        User::rotate_refresh_token(&state.db, claims.sub, &presented, &refresh_token).await?;
    if !rotated {
        warn!(user_id = claims.sub, "presented refresh token is not the stored one");
        return Err(ApiError::Unauthorized("Refresh token no longer valid".into()));
    }

    info!(user_id = claims.sub, "session refreshed");
    let secure = state.config.is_production();
    Ok((
        AppendHeaders([
            (
                header::SET_COOKIE,
                session_cookie(ACCESS_COOKIE, &access_token, keys.access_ttl, secure),
            ),
            (
                header::SET_COOKIE,
                session_cookie(REFRESH_COOKIE, &refresh_token, keys.refresh_ttl, secure),
            ),
        ]),
        Json(MessageResponse {
            message: "Session refreshed",
        }),
    ))
}

#[instrument(skip(state, user))]
pub async fn logout(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<impl IntoResponse> {
    User::clear_refresh_token(&state.db, user.user_id).await?;

    info!(user_id = user.user_id, "user logged out");
    let secure = state.config.is_production();
    Ok((
        AppendHeaders([
            (header::SET_COOKIE, clear_cookie(ACCESS_COOKIE, secure)),
            (header::SET_COOKIE, clear_cookie(REFRESH_COOKIE, secure)),
        ]),
        Json(MessageResponse {
            message: "Logout successful",
        }),
    ))
}

pub async fn profile(user: AuthUser) -> Json<ProfileResponse> {
    Json(ProfileResponse {
        user_id: user.user_id,
        email: user.email,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_validation() {
        assert!(is_valid_email("a@x.com"));
        assert!(is_valid_email("first.last@sub.domain.org"));
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("spaces in@x.com"));
    }

    #[test]
    fn session_response_hides_tokens() {
        use crate::users::dto::PublicUser;
        use time::OffsetDateTime;

        let response = SessionResponse {
            user: PublicUser {
                id: 1,
                email: "a@x.com".into(),
                name: "A".into(),
                age: None,
                created_at: OffsetDateTime::UNIX_EPOCH,
                updated_at: OffsetDateTime::UNIX_EPOCH,
            },
            message: "Login successful",
        };
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("a@x.com"));
        assert!(!json.contains("password"));
        assert!(!json.contains("refresh_token"));
        assert!(!json.contains("access_token"));
    }
}
