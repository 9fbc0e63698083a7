use async_trait::async_trait;
use diesel::{ExpressionMethods, OptionalExtension, QueryDsl, RunQueryDsl, SelectableHelper};

use crate::integration::db::Pool;
use crate::schema::profiles;

use super::Sub;
use super::model::Profile;

#[async_trait]
pub trait UserRepository {
    async fn find_profiles(&self, ids: &[Sub]) -> super::Result<Vec<Profile>>;

    async fn find_profile(&self, id: &Sub) -> super::Result<Option<Profile>>;
}

pub struct PgUserRepository {
    pool: Pool,
}

impl PgUserRepository {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_profiles(&self, ids: &[Sub]) -> super::Result<Vec<Profile>> {
        let pool = self.pool.clone();
        let ids = ids.iter().map(|id| id.as_str().to_owned()).collect::<Vec<_>>();

        tokio::task::spawn_blocking(move || -> super::Result<Vec<Profile>> {
            let mut conn = pool.get()?;

            let profiles = profiles::table
                .filter(profiles::id.eq_any(ids))
                .select(Profile::as_select())
                .load(&mut conn)?;

            Ok(profiles)
        })
        .await?
    }

    async fn find_profile(&self, id: &Sub) -> super::Result<Option<Profile>> {
        let pool = self.pool.clone();
        let id = id.as_str().to_owned();

        tokio::task::spawn_blocking(move || -> super::Result<Option<Profile>> {
            let mut conn = pool.get()?;

            let profile = profiles::table
                .filter(profiles::id.eq(id))
                .select(Profile::as_select())
                .first(&mut conn)
                .optional()?;

            Ok(profile)
        })
        .await?
    }
}
