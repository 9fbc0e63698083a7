use std::collections::{BTreeSet, HashSet};

use crate::message::{Id, model::Message};
use crate::user;

#[derive(Debug, PartialEq, Eq)]
pub enum Merge {
    /// Inserted at the given position of the ordered list.
    Inserted(usize),
    /// A message with the same id is already present.
    Duplicate,
}

/// Ordered, de-duplicated message list of one thread.
#[derive(Default)]
pub struct ChatView {
    messages: Vec<Message>,
    ids: HashSet<Id>,
}

impl ChatView {
    /// Replaces the list with the given history.
    pub fn reset(&mut self, history: Vec<Message>) {
        self.messages.clear();
        self.ids.clear();
        for message in history {
            self.merge(message);
        }
    }

    pub fn merge(&mut self, message: Message) -> Merge {
        if !self.ids.insert(message.id()) {
            return Merge::Duplicate;
        }

        let index = self
            .messages
            .partition_point(|m| Message::chronological(m, &message).is_lt());
        self.messages.insert(index, message);

        Merge::Inserted(index)
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn contains(&self, id: Id) -> bool {
        self.ids.contains(&id)
    }

    pub fn senders(&self) -> BTreeSet<user::Sub> {
        self.messages
            .iter()
            .map(|m| m.sender_id().clone())
            .collect()
    }
}
