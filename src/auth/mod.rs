use std::sync::Arc;

use serde::Deserialize;

use crate::user;

pub mod service;

type Result<T> = std::result::Result<T, Error>;
pub type Service = Arc<dyn service::AuthService + Send + Sync>;

#[derive(Deserialize, Clone)]
struct TokenClaims {
    sub: user::Sub,
}

/// Shared secret and expected audience of the access tokens issued by the
/// hosted auth provider.
#[derive(Clone)]
pub struct Config {
    secret: String,
    audience: String,
}

impl Config {
    pub fn new(secret: impl Into<String>, audience: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            audience: audience.into(),
        }
    }

    pub fn secret(&self) -> &[u8] {
        self.secret.as_bytes()
    }

    pub fn audience(&self) -> &str {
        &self.audience
    }
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("unauthorized to access the resource")]
    Unauthorized,
    #[error("forbidden to access the resource")]
    Forbidden,
    #[error("token is malformed")]
    TokenMalformed,
}
