use axum::Extension;
use axum::extract::ws::Message::{Binary, Close, Text};
use axum::extract::ws::{self, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::Response;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use log::{debug, error, warn};
use tokio::sync::mpsc;

use crate::{auth, conversation, event, user};

use super::context;
use super::model::{Command, Event};

pub async fn ws(
    Extension(auth_user): Extension<auth::User>,
    ws: WebSocketUpgrade,
    State(event_service): State<event::Service>,
    State(conversation_service): State<conversation::Service>,
) -> Response {
    let logged_user = *auth_user.id();
    ws.on_upgrade(move |socket| {
        handle_socket(logged_user, socket, event_service, conversation_service)
    })
}

async fn handle_socket(
    logged_user: user::Id,
    ws: WebSocket,
    event_service: event::Service,
    conversation_service: conversation::Service,
) {
    let (tx, rx) = mpsc::channel(event::QUEUE_CAPACITY);
    let conn = event_service.connect(tx).await;
    let ctx = context::Ws::new(conn, logged_user);

    let (sender, receiver) = ws.split();

    let read_task = tokio::spawn(read(
        ctx.clone(),
        receiver,
        event_service.clone(),
        conversation_service,
    ));
    let write_task = tokio::spawn(write(ctx.clone(), sender, rx));

    match tokio::try_join!(read_task, write_task) {
        Ok(_) => debug!("WS disconnected gracefully"),
        Err(e) => error!("WS disconnected with error: {e}"),
    }

    event_service.disconnect(&ctx.conn).await;
}

async fn read(
    ctx: context::Ws,
    mut receiver: SplitStream<WebSocket>,
    event_service: event::Service,
    conversation_service: conversation::Service,
) {
    loop {
        tokio::select! {
            // close is notified => stop 'read' task
            _ = ctx.close.notified() => break,

            frame = receiver.next() => {
                match frame {
                    None => {
                        ctx.close.notify_one();
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
                        if let Err(e) = handle_text_frame(&ctx, content.as_str(), &event_service, &conversation_service).await {
                            warn!("Skipping text frame: {e}");
                        }
                    }
                    Some(Ok(Binary(content))) => {
                        warn!("Received binary WS frame of {} bytes", content.len());
                    }
                    Some(Ok(_)) => {}
                }
            }
        }
    }
}

async fn handle_text_frame(
    ctx: &context::Ws,
    content: &str,
    event_service: &event::Service,
    conversation_service: &conversation::Service,
) -> super::Result<()> {
    let command = serde_json::from_str::<Command>(content)?;

    match command {
        Command::Join(user) if user == ctx.logged_user => {
            event_service.join(&ctx.conn, &user).await;
        }
        Command::Join(user) => {
            warn!("{} tried to join the room of {user}", ctx.logged_user);
        }
        Command::Leave(user) if user == ctx.logged_user => {
            event_service.leave(&ctx.conn).await;
        }
        Command::Leave(_) => {}
        Command::Typing {
            conversation_id,
            to,
        } => {
            if !is_peer(ctx, conversation_service, &conversation_id, &to).await {
                return Ok(());
            }
            let event = Event::Typing {
                conversation_id,
                from: ctx.logged_user,
                to,
            };
            event_service.publish(&to, &event).await;
        }
        Command::StopTyping {
            conversation_id,
            to,
        } => {
            if !is_peer(ctx, conversation_service, &conversation_id, &to).await {
                return Ok(());
            }
            let event = Event::StopTyping {
                conversation_id,
                from: ctx.logged_user,
                to,
            };
            event_service.publish(&to, &event).await;
        }
    }

    Ok(())
}

/// Typing relays only reach the other participant of a conversation the
/// sender belongs to.
async fn is_peer(
    ctx: &context::Ws,
    conversation_service: &conversation::Service,
    conversation_id: &conversation::Id,
    to: &user::Id,
) -> bool {
    match conversation_service
        .find_for_member(conversation_id, &ctx.logged_user)
        .await
    {
        Ok(c) if c.other_member(&ctx.logged_user).as_ref() == Some(to) => true,
        Ok(_) => {
            warn!("{to} is not the peer of {} in {conversation_id}", ctx.logged_user);
            false
        }
        Err(e) => {
            warn!("dropping typing relay from {}: {e}", ctx.logged_user);
            false
        }
    }
}

async fn write(
    ctx: context::Ws,
    mut sender: SplitSink<WebSocket, ws::Message>,
    mut frames: mpsc::Receiver<String>,
) {
    loop {
        tokio::select! {
            // close is notified => stop 'write' task
            _ = ctx.close.notified() => break,

            frame = frames.recv() => {
                let Some(frame) = frame else { break };

                if let Err(e) = sender.send(Text(frame.into())).await {
                    error!("Failed to send event to client: {}", event::Error::from(e));
                    ctx.close.notify_one(); // notify 'read' task to stop
                    break;
                }
            }
        }
    }

    if let Err(e) = sender.close().await {
        debug!("WS sink already closed: {e}");
    }
}
