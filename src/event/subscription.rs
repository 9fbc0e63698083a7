//! Live inserts of a single thread.
//!
//! A [`Subscription`] holds at most one feed subscription at a time. Inserts
//! are pumped by a forwarder task into a bounded channel the subscription
//! owns, so dropping or closing it stops delivery at once: whatever is still
//! in flight is discarded together with the channel.

use futures::StreamExt;
use log::{debug, error, warn};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::message::model::Message;
use crate::thread;

use super::{Error, Feed, Subject};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum State {
    Unsubscribed,
    Subscribing,
    Active,
    /// The feed failed or went away. Opening again is allowed.
    Degraded,
    /// Closed for good, nothing is delivered anymore.
    Closed,
}

pub struct Subscription {
    feed: Feed,
    key: thread::Key,
    capacity: usize,
    state: State,
    inserts: Option<mpsc::Receiver<super::Result<Message>>>,
    forwarder: Option<JoinHandle<()>>,
}

impl Subscription {
    pub fn new(feed: Feed, key: thread::Key, capacity: usize) -> Self {
        Self {
            feed,
            key,
            capacity: capacity.max(1),
            state: State::Unsubscribed,
            inserts: None,
            forwarder: None,
        }
    }

    pub const fn state(&self) -> State {
        self.state
    }

    pub fn is_listening(&self) -> bool {
        self.state == State::Active
    }

    /// Subscribes to inserts of the thread. A no-op while already active.
    pub async fn open(&mut self) -> super::Result<()> {
        match self.state {
            State::Closed => return Err(Error::Closed),
            State::Active => return Ok(()),
            State::Unsubscribed | State::Subscribing | State::Degraded => {}
        }

        self.state = State::Subscribing;
        let stream = match self.feed.subscribe(&Subject::Messages(&self.key)).await {
            Ok(stream) => stream,
            Err(e) => {
                error!("failed to subscribe to thread {}: {e}", self.key);
                self.state = State::Degraded;
                return Err(e);
            }
        };

        let (tx, rx) = mpsc::channel(self.capacity);
        let key = self.key.clone();
        let forwarder = tokio::spawn(async move {
            let mut stream = stream;
            while let Some(item) = stream.next().await {
                let failed = item.is_err();
                if let Ok(message) = &item {
                    if message.thread_key() != &key {
                        warn!(
                            "dropping message {} of thread {} delivered to {key}",
                            message.id(),
                            message.thread_key()
                        );
                        continue;
                    }
                }
                if tx.send(item).await.is_err() || failed {
                    break;
                }
            }
        });

        self.inserts = Some(rx);
        self.forwarder = Some(forwarder);
        self.state = State::Active;
        debug!("listening to thread {}", self.key);

        Ok(())
    }

    /// Next insert of the thread. Returns `None` unless the subscription is
    /// active. A feed failure is reported once and leaves it degraded.
    pub async fn recv(&mut self) -> Option<super::Result<Message>> {
        if !self.is_listening() {
            return None;
        }

        let item = match self.inserts.as_mut() {
            Some(inserts) => inserts.recv().await,
            None => None,
        };

        match item {
            Some(Ok(message)) => Some(Ok(message)),
            Some(Err(e)) => {
                self.detach(State::Degraded);
                Some(Err(e))
            }
            None => {
                self.detach(State::Degraded);
                Some(Err(Error::FeedClosed))
            }
        }
    }

    /// Stops delivery for good. Safe to call any number of times.
    pub fn close(&mut self) {
        if self.state != State::Closed {
            debug!("closing subscription to thread {}", self.key);
        }
        self.detach(State::Closed);
    }

    fn detach(&mut self, state: State) {
        if let Some(forwarder) = self.forwarder.take() {
            forwarder.abort();
        }
        self.inserts = None;
        self.state = state;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.close();
    }
}
