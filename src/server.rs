//! HTTP surface: the `/eventbus` websocket bridge, a `POST /api/:action`
//! endpoint speaking the same action names, and the static web client.

use std::{collections::HashMap, net::SocketAddr, path::Path, sync::Arc};

use axum::{
    body::Bytes,
    extract::{
        ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
        Path as UrlPath, State,
    },
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures::StreamExt;
use kameo::{actor::ActorRef, error::SendError};
use log::{debug, info, warn};
use serde_json::{json, Value};
use tokio::{sync::broadcast::error::RecvError, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tower_http::{
    cors::CorsLayer,
    services::{ServeDir, ServeFile},
    set_header::SetResponseHeader,
};

use crate::{
    dispatcher::Dispatcher,
    error::DispatchError,
    mail::Mailer,
    message::ServerFrame,
    ws_actor::{RawWsMessage, WsAction, WsActor},
};

const CACHE_PUBLIC: &str = "public, max-age=43200";
const CACHE_NONE: &str = "no-store";

pub fn router<M: Mailer>(dispatcher: Arc<Dispatcher<M>>, webroot: &Path, caching: bool) -> Router {
    let cache_control = HeaderValue::from_static(if caching { CACHE_PUBLIC } else { CACHE_NONE });
    let index = SetResponseHeader::if_not_present(
        ServeFile::new(webroot.join("index.html")),
        header::CACHE_CONTROL,
        cache_control.clone(),
    );
    let assets = SetResponseHeader::if_not_present(
        ServeDir::new(webroot),
        header::CACHE_CONTROL,
        cache_control,
    );

    Router::new()
        .route("/eventbus", get(eventbus_handler::<M>))
        .route("/api/:action", post(api_handler::<M>))
        .route_service("/usr/:id", index)
        .fallback_service(assets)
        .with_state(dispatcher)
        .layer(CorsLayer::permissive())
}

pub async fn serve(app: Router, port: u16) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Listening on {addr}");
    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await?;
    Ok(())
}

async fn api_handler<M: Mailer>(
    State(dispatcher): State<Arc<Dispatcher<M>>>,
    UrlPath(action): UrlPath<String>,
    body: Bytes,
) -> Response {
    let body = if body.is_empty() {
        json!({})
    } else {
        match serde_json::from_slice::<Value>(&body) {
            Ok(body) => body,
            Err(e) => return error_response(&DispatchError::InvalidPayload(e)),
        }
    };
    match dispatcher.dispatch(&action, body).await {
        Ok(Some(reply)) => (StatusCode::OK, Json(reply)).into_response(),
        Ok(None) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            warn!("Action {action} failed: {err}");
            error_response(&err)
        }
    }
}

fn error_response(err: &DispatchError) -> Response {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(json!({ "error": err.to_string() }))).into_response()
}

async fn eventbus_handler<M: Mailer>(
    ws: WebSocketUpgrade,
    State(dispatcher): State<Arc<Dispatcher<M>>>,
) -> Response {
    ws.on_upgrade(move |socket| run_session(socket, dispatcher))
}

/// A running `register`: the forwarding task and the token that stops it.
struct Subscription {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl Subscription {
    async fn close(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            warn!("Notification forwarder failed: {e}");
        }
    }
}

/// Drive one websocket connection until the client goes away.
///
/// Actions are handled in arrival order. Each `register` starts a task that
/// forwards the address's notifications through the connection's [`WsActor`].
pub async fn run_session<M: Mailer>(socket: WebSocket, dispatcher: Arc<Dispatcher<M>>) {
    let (ws_sender, mut ws_receiver) = socket.split();
    let ws_actor = kameo::spawn(WsActor::new(ws_sender));
    let mut subscriptions: HashMap<String, Subscription> = HashMap::new();

    info!("Websocket session started");
    while let Some(Ok(msg)) = ws_receiver.next().await {
        let text = match msg {
            WsMessage::Text(text) => text,
            WsMessage::Close(_) => break,
            _ => continue,
        };
        let action = match ws_actor.ask(RawWsMessage { message: text }).await {
            Ok(action) => action,
            Err(SendError::HandlerError(err)) => {
                warn!("Ignoring websocket frame: {err}");
                let frame = ServerFrame::Err {
                    address: String::new(),
                    failure_code: 400,
                    message: err.to_string(),
                };
                if ws_actor.ask(frame).await.is_err() {
                    break;
                }
                continue;
            }
            Err(_) => break,
        };

        let sent = match action {
            WsAction::Dispatch {
                action,
                body,
                reply_address,
            } => match dispatch_frame(&dispatcher, action, body, reply_address).await {
                Some(frame) => ws_actor.ask(frame).await.is_ok(),
                None => true,
            },
            WsAction::Subscribe(address) => {
                if !subscriptions.contains_key(&address) {
                    let subscription =
                        forward_notifications(&dispatcher, address.clone(), ws_actor.clone())
                            .await;
                    subscriptions.insert(address, subscription);
                }
                true
            }
            WsAction::Unsubscribe(address) => {
                if let Some(subscription) = subscriptions.remove(&address) {
                    subscription.close().await;
                }
                true
            }
            WsAction::Pong => ws_actor.ask(ServerFrame::Pong).await.is_ok(),
        };
        if !sent {
            break;
        }
    }

    for (_, subscription) in subscriptions.drain() {
        subscription.close().await;
    }
    let _ = ws_actor.stop_gracefully().await;
    info!(
        "Websocket session closed, {} notification channels open",
        dispatcher.notifier().channel_count().await
    );
}

/// Run an action and build the frame to answer with, if any. Replies go to
/// `reply_address`; failures fall back to the action name when it is missing.
pub async fn dispatch_frame<M: Mailer>(
    dispatcher: &Dispatcher<M>,
    action: String,
    body: Value,
    reply_address: Option<String>,
) -> Option<ServerFrame> {
    match dispatcher.dispatch(&action, body).await {
        Ok(Some(body)) => reply_address.map(|address| ServerFrame::Rec { address, body }),
        Ok(None) => None,
        Err(err) => {
            warn!("Action {action} failed: {err}");
            Some(ServerFrame::failure(
                reply_address.unwrap_or(action),
                &err,
            ))
        }
    }
}

async fn forward_notifications<M: Mailer>(
    dispatcher: &Dispatcher<M>,
    address: String,
    ws_actor: ActorRef<WsActor>,
) -> Subscription {
    let notifier = Arc::clone(dispatcher.notifier());
    let mut receiver = notifier.subscribe(&address).await;
    let cancel = CancellationToken::new();
    let stopped = cancel.clone();
    debug!("Subscribed to {address}");
    let task = tokio::spawn(async move {
        loop {
            let notification = tokio::select! {
                _ = stopped.cancelled() => break,
                received = receiver.recv() => match received {
                    Ok(notification) => notification,
                    Err(RecvError::Lagged(skipped)) => {
                        debug!("Subscriber on {address} skipped {skipped} notifications");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                },
            };
            let body = match serde_json::to_value(&notification) {
                Ok(body) => body,
                Err(e) => {
                    warn!("Failed to encode notification: {e}");
                    continue;
                }
            };
            let frame = ServerFrame::Rec {
                address: address.clone(),
                body,
            };
            if ws_actor.ask(frame).await.is_err() {
                break;
            }
        }
        drop(receiver);
        notifier.release(&address).await;
        debug!("Stopped forwarding {address}");
    });
    Subscription { cancel, task }
}
