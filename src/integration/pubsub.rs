use std::{env, fmt};

use log::{debug, warn};
use tokio::sync::broadcast;

use crate::event;

#[derive(Clone)]
pub struct Config {
    host: String,
    port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: String::from("127.0.0.1"),
            port: 4222,
        }
    }
}

impl Config {
    pub fn env() -> Option<Self> {
        let host = env::var("NATS_HOST").ok();
        let port = env::var("NATS_PORT")
            .unwrap_or_else(|_| "4222".to_string())
            .parse()
            .ok();

        if let (Some(host), Some(port)) = (host, port) {
            Some(Self { host, port })
        } else {
            warn!("NATS env is not configured");
            None
        }
    }

    /// Connects to NATS. Every loss of the connection is announced on
    /// `disconnects`, even though the client reconnects by itself.
    pub async fn connect(&self, disconnects: broadcast::Sender<()>) -> async_nats::Client {
        let options = async_nats::ConnectOptions::new().event_callback(move |event| {
            let disconnects = disconnects.clone();
            async move {
                match event {
                    async_nats::Event::Disconnected => {
                        warn!("NATS connection lost");
                        // fails only while nothing is subscribed
                        let _ = disconnects.send(());
                    }
                    event => debug!("NATS event: {event}"),
                }
            }
        });

        match options.connect(&format!("{}:{}", self.host, self.port)).await {
            Ok(con) => con,
            Err(e) => panic!("Failed to connect to NATS: {e}"),
        }
    }
}

// Thread keys are opaque and may contain dots or wildcards, so they are hex
// encoded into a single subject token.
impl fmt::Display for event::Subject<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            event::Subject::Messages(key) => {
                write!(f, "threads.{}.messages", hex::encode(key.as_str()))
            }
        }
    }
}

impl async_nats::subject::ToSubject for &event::Subject<'_> {
    fn to_subject(&self) -> async_nats::Subject {
        self.to_string().into()
    }
}
