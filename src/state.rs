use std::sync::Arc;

use axum::extract::FromRef;
use tokio::sync::broadcast;

use crate::auth::service::JwtAuthService;
use crate::event::service::NatsChangeFeed;
use crate::message::repository::PgMessageRepository;
use crate::user::repository::PgUserRepository;
use crate::{auth, chat, event, integration, message, user};

#[derive(Clone, FromRef)]
pub struct AppState {
    chat: chat::Context,
    auth: auth::Service,
}

impl AppState {
    pub async fn init(cfg: &integration::Config) -> Self {
        let pool = cfg.db.connect();
        let (disconnects, _) = broadcast::channel(16);
        let pubsub = cfg.pubsub.connect(disconnects.clone()).await;

        let feed: event::Feed = Arc::new(NatsChangeFeed::new(pubsub, disconnects));
        let messages: message::Repository = Arc::new(PgMessageRepository::new(pool.clone()));
        let users: user::Repository = Arc::new(PgUserRepository::new(pool));

        Self {
            chat: chat::Context::new(messages, users, feed, cfg.chat.clone()),
            auth: Arc::new(JwtAuthService::new(&cfg.auth)),
        }
    }
}
