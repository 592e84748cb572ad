use std::time::Duration;

use axum::extract::FromRef;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;

use crate::state::AppState;

/// Identity payload embedded in both access and refresh tokens.
/// The two kinds share one signing secret and differ only in expiry.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: i64,
    pub email: String,
    pub iat: usize,
    pub exp: usize,
}

#[derive(Clone)]
pub struct JwtKeys {
    pub encoding: EncodingKey,
    pub decoding: DecodingKey,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        let jwt = &state.config.jwt;
        Self {
            encoding: EncodingKey::from_secret(jwt.secret.as_bytes()),
            decoding: DecodingKey::from_secret(jwt.secret.as_bytes()),
            access_ttl: Duration::from_secs(jwt.access_ttl_minutes as u64 * 60),
            refresh_ttl: Duration::from_secs(jwt.refresh_ttl_days as u64 * 24 * 3600),
        }
    }
}

impl JwtKeys {
    fn sign_with_ttl(&self, user_id: i64, email: &str, ttl: Duration) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let exp = now + TimeDuration::seconds(ttl.as_secs() as i64);
        let claims = Claims {
            sub: user_id,
            email: email.to_string(),
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(user_id, "jwt signed");
        Ok(token)
    }

    pub fn sign_access(&self, user_id: i64, email: &str) -> anyhow::Result<String> {
        self.sign_with_ttl(user_id, email, self.access_ttl)
    }

    pub fn sign_refresh(&self, user_id: i64, email: &str) -> anyhow::Result<String> {
        self.sign_with_ttl(user_id, email, self.refresh_ttl)
    }

    pub fn verify(&self, token: &str) -> anyhow::Result<Claims> {
        let data = decode::<Claims>(token, &self.decoding, &Validation::default())?;
        debug!(user_id = data.claims.sub, "jwt verified");
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_keys(secret: &str) -> JwtKeys {
        JwtKeys {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            access_ttl: Duration::from_secs(15 * 60),
            refresh_ttl: Duration::from_secs(7 * 24 * 3600),
        }
    }

    #[test]
    fn sign_and_verify_access_token() {
        let keys = make_keys("dev-secret");
        let token = keys.sign_access(42, "a@x.com").expect("sign access");
        let claims = keys.verify(&token).expect("verify token");
        assert_eq!(claims.sub, 42);
        assert_eq!(claims.email, "a@x.com");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn refresh_token_expires_later_than_access_token() {
        let keys = make_keys("dev-secret");
        let access = keys.sign_access(1, "a@x.com").expect("sign access");
        let refresh = keys.sign_refresh(1, "a@x.com").expect("sign refresh");
        let access_claims = keys.verify(&access).expect("verify access");
        let refresh_claims = keys.verify(&refresh).expect("verify refresh");
        assert!(refresh_claims.exp > access_claims.exp);
    }

    #[test]
    fn verify_rejects_token_signed_with_other_secret() {
        let good = make_keys("secret-a");
        let other = make_keys("secret-b");
        let token = good.sign_access(7, "a@x.com").expect("sign access");
        assert!(other.verify(&token).is_err());
    }

    #[test]
    fn verify_rejects_expired_token() {
        let keys = make_keys("dev-secret");
        let now = OffsetDateTime::now_utc().unix_timestamp();
        let claims = Claims {
            sub: 7,
            email: "a@x.com".into(),
            iat: (now - 7200) as usize,
            exp: (now - 3600) as usize,
        };
        let token = encode(&Header::default(), &claims, &keys.encoding).expect("encode");
        assert!(keys.verify(&token).is_err());
    }

    #[tokio::test]
    async fn ttls_derived_from_config() {
        let state = AppState::fake();
        let keys = JwtKeys::from_ref(&state);
        assert_eq!(keys.access_ttl, Duration::from_secs(15 * 60));
        assert_eq!(keys.refresh_ttl, Duration::from_secs(7 * 24 * 3600));
    }
}
