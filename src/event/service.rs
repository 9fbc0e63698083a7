use std::pin::Pin;

use async_nats::connection::State;
use async_trait::async_trait;
use futures::{Stream, StreamExt, stream};
use log::{debug, error};
use tokio::sync::broadcast;

use crate::message::model::Message;

use super::Subject;

pub type InsertStream = Pin<Box<dyn Stream<Item = super::Result<Message>> + Send>>;

/// Push notifications of message inserts, scoped by subject.
#[async_trait]
pub trait ChangeFeed {
    async fn subscribe(&self, subject: &Subject<'_>) -> super::Result<InsertStream>;

    async fn publish(&self, subject: &Subject<'_>, message: &Message) -> super::Result<()>;
}

/// Change feed over core NATS. The client reconnects and resubscribes on its
/// own, dropping whatever was published meanwhile, so every disconnect it
/// reports through `disconnects` fails the open insert streams instead.
pub struct NatsChangeFeed {
    client: async_nats::Client,
    disconnects: broadcast::Sender<()>,
}

impl NatsChangeFeed {
    pub fn new(client: async_nats::Client, disconnects: broadcast::Sender<()>) -> Self {
        Self {
            client,
            disconnects,
        }
    }

    fn ensure_connected(&self) -> super::Result<()> {
        match self.client.connection_state() {
            State::Connected => Ok(()),
            state => Err(super::Error::Unavailable(format!("nats connection is {state:?}"))),
        }
    }
}

#[async_trait]
impl ChangeFeed for NatsChangeFeed {
    async fn subscribe(&self, subject: &Subject<'_>) -> super::Result<InsertStream> {
        self.ensure_connected()?;
        let disconnects = self.disconnects.subscribe();

        let subscriber = self.client.subscribe(subject).await?;
        debug!("subscribed to {subject}");

        let stream = subscriber.filter_map(|msg| async move {
            match serde_json::from_slice::<Message>(&msg.payload) {
                Ok(message) => Some(Ok(message)),
                Err(e) => {
                    error!("failed to deserialize inserted message: {e}");
                    None
                }
            }
        });

        Ok(until_disconnected(Box::pin(stream), disconnects))
    }

    async fn publish(&self, subject: &Subject<'_>, message: &Message) -> super::Result<()> {
        let payload = serde_json::to_vec(message)?;
        self.client.publish(subject, payload.into()).await?;
        Ok(())
    }
}

/// Yields an error into `inserts` on every disconnect. A dropped sender ends
/// only the disconnect side, inserts keep flowing.
fn until_disconnected(
    inserts: InsertStream,
    disconnects: broadcast::Receiver<()>,
) -> InsertStream {
    let lost = stream::unfold(disconnects, |mut rx| async move {
        match rx.recv().await {
            Ok(()) | Err(broadcast::error::RecvError::Lagged(_)) => {
                let e = super::Error::Unavailable("nats connection lost".into());
                Some((Err(e), rx))
            }
            Err(broadcast::error::RecvError::Closed) => None,
        }
    });

    Box::pin(stream::select(inserts, lost))
}

#[cfg(test)]
pub(crate) mod fake {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use tokio::sync::mpsc;

    use super::*;
    use crate::event;

    type Sender = mpsc::UnboundedSender<event::Result<Message>>;

    /// Hands every delivery to every live subscriber regardless of subject,
    /// so consumers have to filter on their own.
    #[derive(Default)]
    pub struct InMemoryChangeFeed {
        subscribers: Mutex<Vec<Sender>>,
        subscriptions: AtomicUsize,
        published: AtomicUsize,
        unavailable: AtomicBool,
    }

    impl InMemoryChangeFeed {
        pub fn set_unavailable(&self, unavailable: bool) {
            self.unavailable.store(unavailable, Ordering::SeqCst);
        }

        pub fn subscriptions(&self) -> usize {
            self.subscriptions.load(Ordering::SeqCst)
        }

        pub fn published(&self) -> usize {
            self.published.load(Ordering::SeqCst)
        }

        pub fn deliver(&self, message: Message) {
            self.broadcast(|| Ok(message.clone()));
        }

        pub fn fail(&self, reason: &str) {
            self.broadcast(|| Err(event::Error::Unavailable(reason.to_string())));
        }

        /// Ends every open stream.
        pub fn disconnect_all(&self) {
            self.subscribers.lock().unwrap().clear();
        }

        fn broadcast(&self, item: impl Fn() -> event::Result<Message>) {
            self.subscribers
                .lock()
                .unwrap()
                .retain(|tx| tx.send(item()).is_ok());
        }
    }

    #[async_trait]
    impl ChangeFeed for InMemoryChangeFeed {
        async fn subscribe(&self, _: &Subject<'_>) -> event::Result<InsertStream> {
            if self.unavailable.load(Ordering::SeqCst) {
                return Err(event::Error::Unavailable("feed is down".into()));
            }

            let (tx, rx) = mpsc::unbounded_channel();
            self.subscribers.lock().unwrap().push(tx);
            self.subscriptions.fetch_add(1, Ordering::SeqCst);

            let stream = futures::stream::unfold(rx, |mut rx| async move {
                rx.recv().await.map(|item| (item, rx))
            });
            Ok(Box::pin(stream))
        }

        async fn publish(&self, _: &Subject<'_>, message: &Message) -> event::Result<()> {
            if self.unavailable.load(Ordering::SeqCst) {
                return Err(event::Error::Unavailable("feed is down".into()));
            }

            self.published.fetch_add(1, Ordering::SeqCst);
            self.deliver(message.clone());
            Ok(())
        }
    }
}
