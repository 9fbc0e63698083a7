//! Per-connection state of one thread: the ordered message list, sender
//! names and the live subscription, driven by a single task.

use std::collections::BTreeMap;

use futures::StreamExt;
use futures::stream::FuturesUnordered;
use log::{debug, error, warn};

use crate::event::subscription::{self, Subscription};
use crate::message::{self, model::Message, service::MessageService};
use crate::user::resolver::{Lookup, NameResolver};
use crate::{event, thread, user};

use super::view::{ChatView, Merge};

#[derive(Debug)]
pub enum Update {
    Inserted { index: usize, message: Message },
    Named { sender: user::Sub, name: String },
    /// Live updates stopped, the list stays as it is.
    Degraded(event::Error),
}

pub struct ChatSession {
    thread: thread::Key,
    messages: MessageService,
    view: ChatView,
    names: NameResolver,
    subscription: Subscription,
    lookups: FuturesUnordered<Lookup>,
    history_unavailable: bool,
}

impl ChatSession {
    pub fn new(
        thread: thread::Key,
        messages: MessageService,
        names: NameResolver,
        subscription: Subscription,
    ) -> Self {
        Self {
            thread,
            messages,
            view: ChatView::default(),
            names,
            subscription,
            lookups: FuturesUnordered::new(),
            history_unavailable: false,
        }
    }

    pub fn thread(&self) -> &thread::Key {
        &self.thread
    }

    pub fn messages(&self) -> &[Message] {
        self.view.messages()
    }

    pub fn names(&self) -> BTreeMap<user::Sub, String> {
        self.names.names()
    }

    pub fn display_name(&self, sender: &user::Sub) -> String {
        self.names.display_name(sender)
    }

    pub fn history_unavailable(&self) -> bool {
        self.history_unavailable
    }

    pub fn subscription_state(&self) -> subscription::State {
        self.subscription.state()
    }

    /// Whether [`ChatSession::next`] may still produce anything.
    pub fn is_live(&self) -> bool {
        self.subscription.is_listening() || !self.lookups.is_empty()
    }

    /// Loads the history, names its senders and starts listening. An
    /// unavailable store leaves the list empty, only a failed subscription
    /// is reported.
    pub async fn mount(&mut self) -> event::Result<()> {
        if self.subscription.state() == subscription::State::Closed {
            return Err(event::Error::Closed);
        }

        match self.messages.fetch_history(&self.thread).await {
            Ok(history) => {
                self.history_unavailable = false;
                self.view.reset(history);
            }
            Err(e) => {
                error!("failed to load history of thread {}: {e}", self.thread);
                self.history_unavailable = true;
                self.view.reset(Vec::new());
            }
        }

        self.names.resolve_names(self.view.senders()).await;
        self.subscription.open().await
    }

    /// Stores a message. Blank content is ignored. The message shows up in the
    /// list once the subscription delivers it.
    pub async fn send(&mut self, sender: &user::Sub, content: &str) -> message::Result<()> {
        if content.trim().is_empty() {
            debug!("ignoring blank message from {sender}");
            return Ok(());
        }

        self.messages
            .append(sender, content, &self.thread)
            .await
            .map(|_| ())
    }

    /// Listens again after live updates stopped. The history is fetched once
    /// more so inserts missed in between show up, in list order.
    pub async fn reopen(&mut self) -> event::Result<Vec<Update>> {
        self.subscription.open().await?;

        let history = match self.messages.fetch_history(&self.thread).await {
            Ok(history) => history,
            Err(e) => {
                warn!("failed to refetch history of thread {}: {e}", self.thread);
                return Ok(Vec::new());
            }
        };
        self.history_unavailable = false;

        Ok(history
            .into_iter()
            .filter_map(|message| self.accept(message))
            .collect())
    }

    /// Waits for the next change of the list or of a sender name. Returns
    /// `None` once nothing more can arrive.
    pub async fn next(&mut self) -> Option<Update> {
        loop {
            let listening = self.subscription.is_listening();
            let resolving = !self.lookups.is_empty();

            tokio::select! {
                Some((sender, name)) = self.lookups.next(), if resolving => {
                    self.names.complete(sender.clone(), name.clone());
                    if let Some(name) = name {
                        return Some(Update::Named { sender, name });
                    }
                },
                delivery = self.subscription.recv(), if listening => match delivery {
                    Some(Ok(message)) => {
                        if let Some(update) = self.accept(message) {
                            return Some(update);
                        }
                    }
                    Some(Err(e)) => {
                        warn!("live updates of thread {} stopped: {e}", self.thread);
                        return Some(Update::Degraded(e));
                    }
                    None => {}
                },
                else => return None,
            }
        }
    }

    pub fn close(&mut self) {
        self.subscription.close();
        self.lookups.clear();
    }

    fn accept(&mut self, message: Message) -> Option<Update> {
        if self.view.contains(message.id()) {
            debug!("skipping duplicate message {}", message.id());
            return None;
        }

        let sender = message.sender_id().clone();
        match self.view.merge(message.clone()) {
            Merge::Inserted(index) => {
                if let Some(lookup) = self.names.resolve_one(&sender) {
                    self.lookups.push(lookup);
                }
                Some(Update::Inserted { index, message })
            }
            Merge::Duplicate => None,
        }
    }
}
