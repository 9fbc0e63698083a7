use std::sync::Arc;

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header};
use log::{debug, warn};

use crate::user;

use super::{Config, TokenClaims};

#[async_trait]
pub trait AuthService {
    /// Resolves the sender id of a logged in user from their access token.
    async fn validate(&self, token: &str) -> super::Result<user::Sub>;
}

#[derive(Clone)]
pub struct JwtAuthService {
    decoding_key: Arc<DecodingKey>,
    jwt_validator: Arc<Validation>,
}

impl JwtAuthService {
    pub fn new(cfg: &Config) -> Self {
        let jwt_validator = {
            let mut v = Validation::new(Algorithm::HS256);
            v.set_required_spec_claims(&["exp", "sub", "aud"]);
            v.set_audience(&[cfg.audience()]);
            v
        };

        Self {
            decoding_key: Arc::new(DecodingKey::from_secret(cfg.secret())),
            jwt_validator: Arc::new(jwt_validator),
        }
    }
}

#[async_trait]
impl AuthService for JwtAuthService {
    async fn validate(&self, token: &str) -> super::Result<user::Sub> {
        if token.trim().is_empty() {
            return Err(super::Error::Unauthorized);
        }

        decode_header(token).map_err(|e| {
            warn!("Failed to decode JWT header: {e:?}");
            super::Error::TokenMalformed
        })?;

        decode::<TokenClaims>(token, &self.decoding_key, &self.jwt_validator)
            .map(|data| data.claims.sub)
            .inspect(|sub| debug!("Token validated for {sub}"))
            .map_err(|e| {
                warn!("Failed to decode token claims: {e:?}");
                super::Error::Forbidden
            })
    }
}
