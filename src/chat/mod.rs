use std::env;
use std::time::Duration;

use axum::http::StatusCode;
use axum::{
    Router,
    response::{IntoResponse, Response},
    routing::get,
};
use log::{error, warn};

use crate::event::subscription::Subscription;
use crate::message::service::MessageService;
use crate::state::AppState;
use crate::user::resolver::NameResolver;
use crate::{auth, event, integration, message, thread, user};

mod handler;
pub mod model;
pub mod session;
pub mod view;

type Result<T> = std::result::Result<T, Error>;

pub fn ws<S>(s: AppState) -> Router<S> {
    Router::new()
        .route("/ws/threads/{key}", get(handler::socket::thread))
        .route("/ws/pets/{id}", get(handler::socket::pet))
        .route("/ws/shelters/{id}", get(handler::socket::shelter))
        .with_state(s)
}

pub fn api<S>(s: AppState) -> Router<S> {
    Router::new()
        .route("/api/threads/{key}/messages", get(handler::api::history))
        .with_state(s)
}

#[derive(Clone)]
pub struct Config {
    store_timeout: Duration,
    channel_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_timeout: Duration::from_millis(5000),
            channel_capacity: 64,
        }
    }
}

impl Config {
    pub fn env() -> integration::Result<Self> {
        let store_timeout = env::var("CHAT_STORE_TIMEOUT_MS")
            .unwrap_or("5000".into())
            .parse::<u64>()
            .inspect_err(|e| warn!("CHAT_STORE_TIMEOUT_MS is not a number of milliseconds: {e}"))?;
        let channel_capacity = env::var("CHAT_CHANNEL_CAPACITY")
            .unwrap_or("64".into())
            .parse::<usize>()
            .inspect_err(|e| warn!("CHAT_CHANNEL_CAPACITY is not a number: {e}"))?;

        Ok(Self {
            store_timeout: Duration::from_millis(store_timeout),
            channel_capacity,
        })
    }
}

/// Collaborators shared by every chat connection. Each connection gets its
/// own [`session::ChatSession`] from [`Context::session`].
#[derive(Clone)]
pub struct Context {
    messages: MessageService,
    users: user::Repository,
    feed: event::Feed,
    config: Config,
}

impl Context {
    pub fn new(
        messages: message::Repository,
        users: user::Repository,
        feed: event::Feed,
        config: Config,
    ) -> Self {
        Self {
            messages: MessageService::new(messages, feed.clone(), config.store_timeout),
            users,
            feed,
            config,
        }
    }

    pub fn messages(&self) -> &MessageService {
        &self.messages
    }

    pub fn session(&self, thread: thread::Key) -> session::ChatSession {
        let names = NameResolver::new(self.users.clone(), self.config.store_timeout);
        let subscription = Subscription::new(
            self.feed.clone(),
            thread.clone(),
            self.config.channel_capacity,
        );

        session::ChatSession::new(thread, self.messages.clone(), names, subscription)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("not logged in")]
    NotLoggedIn,
    #[error("chat session is closed")]
    SessionClosed,

    #[error(transparent)]
    _Auth(#[from] auth::Error),
    #[error(transparent)]
    _Message(#[from] message::Error),
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        error!("{self}");

        let (status, message) = match self {
            Self::NotLoggedIn | Self::_Auth(_) => (StatusCode::UNAUTHORIZED, self.to_string()),
            Self::_Message(message::Error::EmptyContent) => {
                (StatusCode::BAD_REQUEST, self.to_string())
            }
            Self::_Message(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Message store is unavailable".to_owned(),
            ),
            Self::SessionClosed => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_owned(),
            ),
        };

        (status, message).into_response()
    }
}
