//! Bearer-token authentication.
//!
//! Tokens are HS256 JWTs carrying `sub` (staff uuid) and `role`. A valid
//! token becomes a [`CallerIdentity`] request extension; anything else is a
//! 401 before the handler runs.

use axum::{
    extract::Request,
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
    Extension,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use meal_flow_core::error::FulfillmentError;
use meal_flow_core::CallerIdentity;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtClaims {
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    pub exp: i64,
}

#[derive(Clone)]
pub struct JwtConfig {
    decoding: DecodingKey,
    validation: Validation,
}

impl JwtConfig {
    pub fn from_secret(secret: &[u8]) -> Self {
        Self {
            decoding: DecodingKey::from_secret(secret),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    pub fn verify(&self, token: &str) -> Result<CallerIdentity, FulfillmentError> {
        let data = decode::<JwtClaims>(token, &self.decoding, &self.validation)
            .map_err(|e| FulfillmentError::Unauthenticated(format!("invalid token: {e}")))?;
        CallerIdentity::from_claims(data.claims.sub.as_deref(), data.claims.role.as_deref())
    }
}

/// Sign a token for `caller` valid for `ttl`.
pub fn mint_token(secret: &[u8], caller: &CallerIdentity, ttl: Duration) -> anyhow::Result<String> {
    let claims = JwtClaims {
        sub: Some(caller.user_id.to_string()),
        role: Some(caller.role.as_str().to_string()),
        exp: (Utc::now() + ttl).timestamp(),
    };
    Ok(encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret),
    )?)
}

pub async fn jwt_auth(
    Extension(config): Extension<JwtConfig>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| FulfillmentError::Unauthenticated("missing bearer token".into()))?;

    let caller = config.verify(token.trim())?;
    tracing::debug!(user = %caller.user_id, role = %caller.role, "authenticated");
    req.extensions_mut().insert(caller);
    Ok(next.run(req).await)
}
