use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::Message::{Binary, Close, Text};
use axum::extract::ws::{Message as WsMessage, WebSocket};
use axum::extract::WebSocketUpgrade;
use axum::response::Response;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use log::{debug, error, warn};
use serde_json::from_str;
use tokio::sync::{Notify, RwLock, mpsc};
use tokio::time::sleep;
use tokio::try_join;

use crate::{auth, thread, user};

use super::model::{Command, Event};

const AUTH_TIMEOUT: Duration = Duration::from_secs(5);

/// Commands of a logged in client, handed from the 'read' to the 'write' task.
#[derive(Debug)]
enum Input {
    Send(String),
    Reopen,
}

pub mod socket {
    use axum::extract::{Path, State, WebSocketUpgrade};
    use axum::response::Response;

    use crate::{auth, chat, thread};

    pub async fn thread(
        ws: WebSocketUpgrade,
        Path(key): Path<String>,
        State(chat): State<chat::Context>,
        State(auth): State<auth::Service>,
    ) -> Response {
        super::upgrade(ws, thread::Key::from(key), chat, auth)
    }

    pub async fn pet(
        ws: WebSocketUpgrade,
        Path(id): Path<String>,
        State(chat): State<chat::Context>,
        State(auth): State<auth::Service>,
    ) -> Response {
        super::upgrade(ws, thread::Key::pet(&id), chat, auth)
    }

    pub async fn shelter(
        ws: WebSocketUpgrade,
        Path(id): Path<String>,
        State(chat): State<chat::Context>,
        State(auth): State<auth::Service>,
    ) -> Response {
        super::upgrade(ws, thread::Key::shelter(&id), chat, auth)
    }
}

pub mod api {
    use axum::Json;
    use axum::extract::{Path, State};

    use crate::message::model::Message;
    use crate::{chat, thread};

    pub async fn history(
        Path(key): Path<String>,
        State(chat): State<chat::Context>,
    ) -> super::super::Result<Json<Vec<Message>>> {
        let messages = chat
            .messages()
            .fetch_history(&thread::Key::from(key))
            .await?;

        Ok(Json(messages))
    }
}

#[derive(Clone)]
struct Ctx {
    sub: Arc<RwLock<Option<user::Sub>>>,
    login: Arc<Notify>,
    close: Arc<Notify>,
}

impl Ctx {
    fn new() -> Self {
        Self {
            sub: Arc::new(RwLock::new(None)),
            login: Arc::new(Notify::new()),
            close: Arc::new(Notify::new()),
        }
    }

    async fn logged_sub(&self) -> Option<user::Sub> {
        self.sub.read().await.clone()
    }

    async fn log_in(&self, sub: user::Sub) {
        *self.sub.write().await = Some(sub);
        self.login.notify_one();
    }
}

fn upgrade(
    ws: WebSocketUpgrade,
    key: thread::Key,
    chat: super::Context,
    auth: auth::Service,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, key, chat, auth))
}

async fn handle_socket(
    ws: WebSocket,
    key: thread::Key,
    chat: super::Context,
    auth: auth::Service,
) {
    let (sender, receiver) = ws.split();
    let ctx = Ctx::new();
    let (inputs_tx, inputs_rx) = mpsc::channel(chat.config.channel_capacity.max(1));

    let read_task = tokio::spawn(read(ctx.clone(), receiver, auth, inputs_tx));
    let write_task = tokio::spawn(write(ctx.clone(), sender, key, chat, inputs_rx));

    match try_join!(read_task, write_task) {
        Ok(_) => debug!("WS disconnected gracefully"),
        Err(e) => error!("WS disconnected with error: {e}"),
    }
}

async fn read(
    ctx: Ctx,
    mut receiver: SplitStream<WebSocket>,
    auth: auth::Service,
    inputs: mpsc::Sender<Input>,
) {
    loop {
        tokio::select! {
            // close is notified => stop 'read' task
            _ = ctx.close.notified() => break,

            // read next frame from WS connection
            frame = receiver.next() => {
                match frame {
                    None => {
                        debug!("WS stream ended");
                        ctx.close.notify_one(); // notify 'write' task to stop
                        break;
                    }
                    Some(Err(e)) => {
                        error!("Failed to read WS frame: {e}");
                        ctx.close.notify_one(); // notify 'write' task to stop
                        break;
                    }
                    Some(Ok(Close(frame))) => {
                        debug!("WS connection closed by client: {frame:?}");
                        ctx.close.notify_one(); // notify 'write' task to stop
                        break;
                    }
                    Some(Ok(Text(content))) => {
                        if let Err(e) = handle_text_frame(&ctx, content.as_str(), &auth, &inputs).await {
                            error!("Failed to handle text frame: {e}");
                            ctx.close.notify_one(); // notify 'write' task to stop
                            break;
                        }
                    }
                    Some(Ok(Binary(content))) => warn!("Received binary WS frame: {content:?}"),
                    Some(Ok(wtf)) => debug!("Received non-text WS frame: {wtf:?}"),
                }
            }
        }
    }
}

async fn handle_text_frame(
    ctx: &Ctx,
    content: &str,
    auth: &auth::Service,
    inputs: &mpsc::Sender<Input>,
) -> super::Result<()> {
    let Ok(command) = from_str::<Command>(content) else {
        warn!("Skipping text frame, content is malformed: {content}");
        return Ok(());
    };
    debug!("Handling command: {command:?}");

    let input = match (ctx.logged_sub().await, command) {
        (None, Command::Auth { token }) => {
            let sub = auth.validate(&token).await?;
            ctx.log_in(sub).await;
            return Ok(());
        }
        (None, _) => return Err(super::Error::NotLoggedIn),
        (Some(_), Command::Auth { .. }) => {
            debug!("Received auth request with sub already set, ignoring");
            return Ok(());
        }
        (Some(_), Command::Send { content }) => Input::Send(content),
        (Some(_), Command::Reopen) => Input::Reopen,
    };

    inputs
        .send(input)
        .await
        .map_err(|_| super::Error::SessionClosed)
}

async fn write(
    ctx: Ctx,
    mut sender: SplitSink<WebSocket, WsMessage>,
    key: thread::Key,
    chat: super::Context,
    mut inputs: mpsc::Receiver<Input>,
) {
    // wait for login notification or close
    tokio::select! {
        // close is notified => stop 'write' task
        _ = ctx.close.notified() => return,

        // didn't log in within the timeout => stop 'write' task
        _ = sleep(AUTH_TIMEOUT) => {
            debug!("WS was not authenticated within {AUTH_TIMEOUT:?}");
            ctx.close.notify_one(); // notify 'read' task to stop
            return;
        },

        _ = ctx.login.notified() => {},
    }

    let Some(sub) = ctx.logged_sub().await else {
        error!("Login notified without sub");
        ctx.close.notify_one();
        return;
    };

    let mut session = chat.session(key);

    // a connection closed while mounting must not see the late result
    let mounted = tokio::select! {
        _ = ctx.close.notified() => {
            session.close();
            return;
        },
        mounted = session.mount() => mounted,
    };

    send_event(&mut sender, &Event::snapshot(&session)).await;
    if let Err(e) = mounted {
        send_event(
            &mut sender,
            &Event::Degraded {
                reason: e.to_string(),
            },
        )
        .await;
    }

    loop {
        let live = session.is_live();

        tokio::select! {
            // close is notified => stop 'write' task
            _ = ctx.close.notified() => break,

            input = inputs.recv() => match input {
                None => break,
                Some(Input::Send(content)) => {
                    if let Err(e) = session.send(&sub, &content).await {
                        error!("Failed to send message to thread {}: {e}", session.thread());
                        let event = Event::SendFailed {
                            content,
                            reason: e.to_string(),
                        };
                        send_event(&mut sender, &event).await;
                    }
                }
                Some(Input::Reopen) => match session.reopen().await {
                    Ok(updates) => {
                        for update in updates {
                            send_event(&mut sender, &Event::update(&session, update)).await;
                        }
                    }
                    Err(e) => {
                        let event = Event::Degraded {
                            reason: e.to_string(),
                        };
                        send_event(&mut sender, &event).await;
                    }
                },
            },

            update = session.next(), if live => {
                if let Some(update) = update {
                    let event = Event::update(&session, update);
                    send_event(&mut sender, &event).await;
                }
            },
        }
    }

    session.close();
}

async fn send_event(sender: &mut SplitSink<WebSocket, WsMessage>, event: &Event) {
    debug!("Sending event: {event:?}");
    match serde_json::to_string(event) {
        Ok(event) => {
            if let Err(e) = sender.send(Text(event.into())).await {
                error!("Failed to send event to client: {e}");
            }
        }
        Err(e) => error!("Failed to serialize event: {e}"),
    }
}
