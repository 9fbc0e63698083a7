use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use diesel::prelude::{Insertable, Queryable, Selectable};
use serde::{Deserialize, Serialize};

use crate::{thread, user};

use super::Id;

#[derive(Queryable, Selectable, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::messages)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Message {
    id: Id,
    sender_id: user::Sub,
    content: String,
    created_at: DateTime<Utc>,
    thread_key: thread::Key,
}

impl Message {
    pub fn new(
        id: Id,
        sender_id: user::Sub,
        content: impl Into<String>,
        created_at: DateTime<Utc>,
        thread_key: thread::Key,
    ) -> Self {
        Self {
            id,
            sender_id,
            content: content.into(),
            created_at,
            thread_key,
        }
    }

    pub const fn id(&self) -> Id {
        self.id
    }

    pub const fn sender_id(&self) -> &user::Sub {
        &self.sender_id
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub const fn created_at(&self) -> &DateTime<Utc> {
        &self.created_at
    }

    pub const fn thread_key(&self) -> &thread::Key {
        &self.thread_key
    }

    /// Ascending by creation time, ties broken by id.
    pub fn chronological(a: &Self, b: &Self) -> Ordering {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.id.cmp(&b.id))
    }
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::messages)]
pub struct NewMessage {
    sender_id: user::Sub,
    content: String,
    thread_key: thread::Key,
}

impl NewMessage {
    pub fn new(sender_id: user::Sub, content: &str, thread_key: thread::Key) -> Self {
        Self {
            sender_id,
            content: content.to_string(),
            thread_key,
        }
    }

    pub const fn sender_id(&self) -> &user::Sub {
        &self.sender_id
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub const fn thread_key(&self) -> &thread::Key {
        &self.thread_key
    }
}
