use std::sync::Arc;

use crate::thread;

pub mod service;
pub mod subscription;

pub type Result<T> = std::result::Result<T, Error>;
pub type Feed = Arc<dyn service::ChangeFeed + Send + Sync>;

#[derive(Clone, Debug)]
pub enum Subject<'a> {
    /// Inserts into the thread with the given key.
    Messages(&'a thread::Key),
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("change feed closed the subscription")]
    FeedClosed,
    #[error("subscription is closed")]
    Closed,
    #[error("change feed is unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    _Subscribe(#[from] async_nats::SubscribeError),
    #[error(transparent)]
    _Publish(#[from] async_nats::PublishError),
    #[error(transparent)]
    _ParseJson(#[from] serde_json::Error),
}
