use axum::extract::ws::{Message as WsMessage, WebSocket};
use futures::{stream::SplitSink, SinkExt};
use kameo::{
    message::{Context, Message},
    Actor,
};
use serde_json::Value;

use crate::message::{ClientFrame, ServerFrame};

/// Owns the sending half of one websocket connection. Replies and
/// notifications from concurrent tasks are funnelled through its mailbox so
/// frames never interleave.
#[derive(Actor)]
pub struct WsActor {
    pub ws_sender: SplitSink<WebSocket, WsMessage>,
}

impl WsActor {
    pub fn new(ws_sender: SplitSink<WebSocket, WsMessage>) -> Self {
        Self { ws_sender }
    }
}

/// What the session loop should do with an inbound frame.
#[derive(Debug, PartialEq)]
pub enum WsAction {
    Dispatch {
        action: String,
        body: Value,
        reply_address: Option<String>,
    },
    Subscribe(String),
    Unsubscribe(String),
    Pong,
}

/// Text frame as received from the websocket.
#[derive(Debug, PartialEq)]
pub struct RawWsMessage {
    pub message: String,
}

impl Message<RawWsMessage> for WsActor {
    type Reply = Result<WsAction, WsError>;

    async fn handle(
        &mut self,
        msg: RawWsMessage,
        _ctx: Context<'_, Self, Self::Reply>,
    ) -> Self::Reply {
        parse_frame(&msg.message)
    }
}

pub fn parse_frame(text: &str) -> Result<WsAction, WsError> {
    let action = match serde_json::from_str(text)? {
        ClientFrame::Send {
            address,
            body,
            reply_address,
        } => WsAction::Dispatch {
            action: address,
            body,
            reply_address,
        },
        ClientFrame::Register { address } if address.is_empty() => {
            return Err(WsError::InvalidMessage)
        }
        ClientFrame::Register { address } => WsAction::Subscribe(address),
        ClientFrame::Unregister { address } => WsAction::Unsubscribe(address),
        ClientFrame::Ping => WsAction::Pong,
    };
    Ok(action)
}

impl Message<ServerFrame> for WsActor {
    type Reply = Result<(), WsError>;

    async fn handle(
        &mut self,
        msg: ServerFrame,
        _ctx: Context<'_, Self, Self::Reply>,
    ) -> Self::Reply {
        self.ws_sender
            .send(WsMessage::Text(msg.to_string()))
            .await?;
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WsError {
    #[error("Invalid message")]
    InvalidMessage,
    #[error("Malformed json: {0}")]
    MalformedJson(#[from] serde_json::Error),
    #[error("Failed to send message to websocket: {0}")]
    SendMessageError(#[from] axum::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_frames() {
        let action = parse_frame(
            r#"{"type":"send","address":"enter","body":{"usr":"u","grp":"g"},"replyAddress":"r"}"#,
        )
        .unwrap();
        assert_eq!(
            action,
            WsAction::Dispatch {
                action: "enter".to_string(),
                body: serde_json::json!({"usr": "u", "grp": "g"}),
                reply_address: Some("r".to_string()),
            }
        );
        assert_eq!(
            parse_frame(r#"{"type":"register","address":"grp-g"}"#).unwrap(),
            WsAction::Subscribe("grp-g".to_string())
        );
        assert_eq!(parse_frame(r#"{"type":"ping"}"#).unwrap(), WsAction::Pong);
        assert!(matches!(
            parse_frame(r#"{"type":"register","address":""}"#),
            Err(WsError::InvalidMessage)
        ));
        assert!(matches!(
            parse_frame("not json"),
            Err(WsError::MalformedJson(_))
        ));
    }
}
