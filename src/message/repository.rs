use async_trait::async_trait;
use diesel::{ExpressionMethods, QueryDsl, RunQueryDsl, SelectableHelper};

use crate::integration::db::Pool;
use crate::schema::messages;
use crate::thread;

use super::model::{Message, NewMessage};

#[async_trait]
pub trait MessageRepository {
    async fn find_by_thread_key(&self, key: &thread::Key) -> super::Result<Vec<Message>>;

    async fn insert(&self, message: NewMessage) -> super::Result<Message>;
}

pub struct PgMessageRepository {
    pool: Pool,
}

impl PgMessageRepository {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageRepository for PgMessageRepository {
    async fn find_by_thread_key(&self, key: &thread::Key) -> super::Result<Vec<Message>> {
        let pool = self.pool.clone();
        let key = key.as_str().to_owned();

        tokio::task::spawn_blocking(move || -> super::Result<Vec<Message>> {
            let mut conn = pool.get()?;

            let messages = messages::table
                .filter(messages::thread_key.eq(key))
                .order((messages::created_at.asc(), messages::id.asc()))
                .select(Message::as_select())
                .load(&mut conn)?;

            Ok(messages)
        })
        .await?
    }

    async fn insert(&self, message: NewMessage) -> super::Result<Message> {
        let pool = self.pool.clone();

        tokio::task::spawn_blocking(move || -> super::Result<Message> {
            let mut conn = pool.get()?;

            let inserted = diesel::insert_into(messages::table)
                .values(&message)
                .returning(Message::as_returning())
                .get_result(&mut conn)?;

            Ok(inserted)
        })
        .await?
    }
}

#[cfg(test)]
pub(crate) mod fake {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    use chrono::Utc;

    use super::*;
    use crate::message::Id;

    /// Messages kept in memory. Ids are assigned from a counter, timestamps
    /// from the wall clock, like the real store does.
    #[derive(Default)]
    pub struct InMemoryMessageRepository {
        messages: Mutex<Vec<Message>>,
        inserts: AtomicUsize,
        unavailable: AtomicBool,
        delay: Mutex<Duration>,
    }

    impl InMemoryMessageRepository {
        pub fn with_messages(messages: impl IntoIterator<Item = Message>) -> Self {
            let repo = Self::default();
            repo.messages.lock().unwrap().extend(messages);
            repo
        }

        pub fn inserts(&self) -> usize {
            self.inserts.load(Ordering::SeqCst)
        }

        pub fn set_unavailable(&self, unavailable: bool) {
            self.unavailable.store(unavailable, Ordering::SeqCst);
        }

        /// Every call sleeps this long before answering.
        pub fn set_delay(&self, delay: Duration) {
            *self.delay.lock().unwrap() = delay;
        }

        async fn check_available(&self) -> super::super::Result<()> {
            let delay = *self.delay.lock().unwrap();
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            if self.unavailable.load(Ordering::SeqCst) {
                return Err(diesel::result::Error::BrokenTransactionManager.into());
            }
            Ok(())
        }
    }

    #[async_trait]
    impl MessageRepository for InMemoryMessageRepository {
        async fn find_by_thread_key(
            &self,
            key: &thread::Key,
        ) -> super::super::Result<Vec<Message>> {
            self.check_available().await?;

            let mut found = self
                .messages
                .lock()
                .unwrap()
                .iter()
                .filter(|m| m.thread_key() == key)
                .cloned()
                .collect::<Vec<_>>();
            found.sort_by(Message::chronological);
            Ok(found)
        }

        async fn insert(&self, message: NewMessage) -> super::super::Result<Message> {
            self.inserts.fetch_add(1, Ordering::SeqCst);
            self.check_available().await?;

            let mut messages = self.messages.lock().unwrap();
            let next_id = messages.iter().map(|m| m.id().0).max().unwrap_or(0) + 1;
            let inserted = Message::new(
                Id(next_id),
                message.sender_id().clone(),
                message.content(),
                Utc::now(),
                message.thread_key().clone(),
            );
            messages.push(inserted.clone());
            Ok(inserted)
        }
    }
}
