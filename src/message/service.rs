use std::time::Duration;

use log::{debug, error};
use tokio::time::timeout;

use crate::{event, thread, user};

use super::Repository;
use super::model::{Message, NewMessage};

/// Durable reads and writes of thread messages. Every store call is bounded
/// by `timeout`, expiry counts as the store being unavailable.
#[derive(Clone)]
pub struct MessageService {
    repo: Repository,
    feed: event::Feed,
    timeout: Duration,
}

impl MessageService {
    pub fn new(repo: Repository, feed: event::Feed, timeout: Duration) -> Self {
        Self {
            repo,
            feed,
            timeout,
        }
    }
}

impl MessageService {
    pub async fn fetch_history(&self, key: &thread::Key) -> super::Result<Vec<Message>> {
        let mut history = timeout(self.timeout, self.repo.find_by_thread_key(key))
            .await
            .map_err(|_| super::Error::Timeout(self.timeout))??;

        history.sort_by(Message::chronological);
        debug!("fetched {} messages of thread {key}", history.len());

        Ok(history)
    }

    /// Stores a message and announces the insert to the subscribers of its
    /// thread. Content is stored trimmed.
    pub async fn append(
        &self,
        sender: &user::Sub,
        content: &str,
        key: &thread::Key,
    ) -> super::Result<Message> {
        let content = content.trim();
        if content.is_empty() {
            return Err(super::Error::EmptyContent);
        }

        let new = NewMessage::new(sender.clone(), content, key.clone());
        let message = timeout(self.timeout, self.repo.insert(new))
            .await
            .map_err(|_| super::Error::Timeout(self.timeout))??;

        debug!("appended message {} to thread {key}", message.id());

        // the row is durable at this point, a failed announcement must not
        // make the caller send it again
        if let Err(e) = self
            .feed
            .publish(&event::Subject::Messages(key), &message)
            .await
        {
            error!("failed to announce message {}: {e}", message.id());
        }

        Ok(message)
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use chrono::{TimeZone, Utc};
    use futures::StreamExt;

    use crate::event::service::{ChangeFeed, fake::InMemoryChangeFeed};
    use crate::message::{self, Id, repository::fake::InMemoryMessageRepository};

    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(1);

    fn message(id: i64, minute: u32, key: &thread::Key) -> Message {
        Message::new(
            Id(id),
            user::Sub("u1".into()),
            format!("message {id}"),
            Utc.with_ymd_and_hms(2025, 6, 1, 10, minute, 0).unwrap(),
            key.clone(),
        )
    }

    #[tokio::test]
    async fn should_fetch_history_of_thread_in_order() {
        let pet = thread::Key::pet("1");
        let repo = Arc::new(InMemoryMessageRepository::with_messages([
            message(2, 1, &pet),
            message(3, 5, &thread::Key::shelter("1")),
            message(1, 0, &pet),
        ]));
        let service = MessageService::new(repo, Arc::new(InMemoryChangeFeed::default()), TIMEOUT);

        let actual = service.fetch_history(&pet).await.unwrap();

        let ids = actual.iter().map(Message::id).collect::<Vec<_>>();
        assert_eq!(ids, vec![Id(1), Id(2)]);
    }

    #[tokio::test]
    async fn should_report_unavailable_store_on_fetch() {
        let repo = Arc::new(InMemoryMessageRepository::default());
        repo.set_unavailable(true);
        let service = MessageService::new(repo, Arc::new(InMemoryChangeFeed::default()), TIMEOUT);

        let actual = service.fetch_history(&thread::Key::pet("1")).await;

        assert!(matches!(actual, Err(e) if e.is_unavailable()));
    }

    #[tokio::test]
    async fn should_reject_empty_content_without_touching_store() {
        let repo = Arc::new(InMemoryMessageRepository::default());
        let service = MessageService::new(
            repo.clone(),
            Arc::new(InMemoryChangeFeed::default()),
            TIMEOUT,
        );

        let actual = service
            .append(&user::Sub("u1".into()), " \t\n", &thread::Key::pet("1"))
            .await;

        assert!(matches!(actual, Err(message::Error::EmptyContent)));
        assert_eq!(repo.inserts(), 0);
    }

    #[tokio::test]
    async fn should_append_trimmed_content_and_announce_it() {
        let pet = thread::Key::pet("1");
        let repo = Arc::new(InMemoryMessageRepository::default());
        let feed = Arc::new(InMemoryChangeFeed::default());
        let mut inserts = feed
            .subscribe(&event::Subject::Messages(&pet))
            .await
            .unwrap();
        let service = MessageService::new(repo.clone(), feed, TIMEOUT);

        let appended = service
            .append(&user::Sub("u1".into()), "  hello  ", &pet)
            .await
            .unwrap();

        assert_eq!(appended.content(), "hello");
        assert_eq!(repo.inserts(), 1);
        let announced = inserts.next().await.unwrap().unwrap();
        assert_eq!(announced, appended);
    }

    #[tokio::test]
    async fn should_report_unavailable_store_on_append() {
        let repo = Arc::new(InMemoryMessageRepository::default());
        repo.set_unavailable(true);
        let feed = Arc::new(InMemoryChangeFeed::default());
        let service = MessageService::new(repo, feed.clone(), TIMEOUT);

        let actual = service
            .append(&user::Sub("u1".into()), "hello", &thread::Key::pet("1"))
            .await;

        assert!(matches!(actual, Err(e) if e.is_unavailable()));
        assert_eq!(feed.published(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn should_time_out_slow_fetch() {
        let repo = Arc::new(InMemoryMessageRepository::with_messages([message(
            1,
            0,
            &thread::Key::pet("1"),
        )]));
        repo.set_delay(TIMEOUT * 2);
        let service = MessageService::new(repo, Arc::new(InMemoryChangeFeed::default()), TIMEOUT);

        let actual = service.fetch_history(&thread::Key::pet("1")).await;

        assert!(matches!(&actual, Err(message::Error::Timeout(t)) if *t == TIMEOUT));
        assert!(matches!(actual, Err(e) if e.is_unavailable()));
    }

    #[tokio::test(start_paused = true)]
    async fn should_time_out_slow_append_without_announcing() {
        let repo = Arc::new(InMemoryMessageRepository::default());
        repo.set_delay(TIMEOUT * 2);
        let feed = Arc::new(InMemoryChangeFeed::default());
        let service = MessageService::new(repo, feed.clone(), TIMEOUT);

        let actual = service
            .append(&user::Sub("u1".into()), "hello", &thread::Key::pet("1"))
            .await;

        assert!(matches!(actual, Err(message::Error::Timeout(_))));
        assert_eq!(feed.published(), 0);
    }
}
