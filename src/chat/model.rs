use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::message::model::Message;
use crate::user;

use super::session::{ChatSession, Update};

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    Auth { token: String },
    Send { content: String },
    /// Listen again after a `degraded` event.
    Reopen,
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auth { .. } => write!(f, "Auth {{ token: *** }}"),
            Self::Send { content } => write!(f, "Send {{ content: {content:?} }}"),
            Self::Reopen => write!(f, "Reopen"),
        }
    }
}

#[derive(Serialize, Debug)]
pub struct Entry {
    #[serde(flatten)]
    message: Message,
    display_name: String,
}

#[derive(Serialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    Snapshot {
        messages: Vec<Entry>,
        names: BTreeMap<user::Sub, String>,
        history_unavailable: bool,
    },
    NewMessage {
        index: usize,
        message: Message,
        display_name: String,
    },
    SenderNamed {
        sender: user::Sub,
        name: String,
    },
    Degraded {
        reason: String,
    },
    SendFailed {
        content: String,
        reason: String,
    },
}

impl Event {
    pub fn snapshot(session: &ChatSession) -> Self {
        let messages = session
            .messages()
            .iter()
            .map(|m| Entry {
                message: m.clone(),
                display_name: session.display_name(m.sender_id()),
            })
            .collect();

        Self::Snapshot {
            messages,
            names: session.names(),
            history_unavailable: session.history_unavailable(),
        }
    }

    pub fn update(session: &ChatSession, update: Update) -> Self {
        match update {
            Update::Inserted { index, message } => Self::NewMessage {
                index,
                display_name: session.display_name(message.sender_id()),
                message,
            },
            Update::Named { sender, name } => Self::SenderNamed { sender, name },
            Update::Degraded(e) => Self::Degraded {
                reason: e.to_string(),
            },
        }
    }
}
