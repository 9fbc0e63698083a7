use std::fmt::{self, Display};
use std::sync::Arc;
use std::time::Duration;

use diesel::{
    deserialize::{self, FromSql, FromSqlRow},
    expression::AsExpression,
    pg::{Pg, PgValue},
    serialize::{self, Output, ToSql},
    sql_types::Text,
};
use serde::{Deserialize, Serialize};

pub mod model;
pub mod repository;
pub mod resolver;

type Result<T> = std::result::Result<T, Error>;
pub type Repository = Arc<dyn repository::UserRepository + Send + Sync>;

const FALLBACK_NAME_LEN: usize = 8;

/// Stable, opaque identifier of a user. Doubles as the profile id and the
/// sender id of every message the user posts.
#[derive(
    Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, AsExpression, FromSqlRow,
)]
#[serde(transparent)]
#[diesel(sql_type = Text)]
pub struct Sub(pub String);

impl Sub {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name shown until (or unless) the profile name is resolved.
    pub fn fallback_name(&self) -> String {
        if self.0.is_empty() {
            return "Unknown".to_string();
        }
        self.0.chars().take(FALLBACK_NAME_LEN).collect()
    }
}

impl From<&str> for Sub {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Display for Sub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl ToSql<Text, Pg> for Sub {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        <str as ToSql<Text, Pg>>::to_sql(self.0.as_str(), out)
    }
}

impl FromSql<Text, Pg> for Sub {
    fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
        <String as FromSql<Text, Pg>>::from_sql(bytes).map(Self)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("profile store did not respond within {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    _R2d2(#[from] r2d2::Error),
    #[error(transparent)]
    _Diesel(#[from] diesel::result::Error),
    #[error(transparent)]
    _Join(#[from] tokio::task::JoinError),
}
