//! Wire types: named actions with their payloads, and the websocket frames
//! that carry them.
//!
//! An action arrives as a name plus a JSON object body, e.g.
//! `create` + `{"usr": "...", "name": "Pets"}`. On the websocket it is wrapped
//! in an event-bus style frame:
//!  - client → server
//!    - `{"type": "send", "address": "<action>", "body": {..}, "replyAddress": ".."}`
//!    - `{"type": "register", "address": "grp-<id>"}`
//!    - `{"type": "unregister", "address": "grp-<id>"}`
//!    - `{"type": "ping"}`
//!  - server → client
//!    - `{"type": "rec", "address": "..", "body": ..}`
//!    - `{"type": "err", "address": "..", "failureCode": 404, "message": ".."}`
//!    - `{"type": "pong"}`

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::DispatchError;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "action", content = "body", rename_all = "camelCase")]
pub enum Action {
    Create {
        usr: String,
        name: String,
    },
    #[serde(alias = "proposeName")]
    Propose {
        usr: String,
        grp: String,
        name: String,
    },
    RemoveName {
        usr: String,
        grp: String,
        name: String,
    },
    Resign {
        usr: String,
        grp: String,
    },
    Upgrade {
        grp: String,
        member: String,
        #[serde(default)]
        usr: Option<String>,
    },
    AddMember {
        usr: String,
        grp: String,
        email: String,
    },
    Signup {
        email: String,
    },
    SetUserName {
        usr: String,
        grp: String,
        name: String,
    },
    List {
        usr: String,
    },
    Enter {
        usr: String,
        grp: String,
    },
}

impl Action {
    pub const NAMES: [&'static str; 11] = [
        "create",
        "propose",
        "proposeName",
        "removeName",
        "resign",
        "upgrade",
        "addMember",
        "signup",
        "setUserName",
        "list",
        "enter",
    ];

    pub fn parse(name: &str, body: Value) -> Result<Self, DispatchError> {
        if !Self::NAMES.contains(&name) {
            return Err(DispatchError::UnknownAction(name.to_string()));
        }
        Ok(serde_json::from_value(json!({ "action": name, "body": body }))?)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientFrame {
    Send {
        address: String,
        #[serde(default)]
        body: Value,
        #[serde(default, rename = "replyAddress")]
        reply_address: Option<String>,
    },
    Register {
        address: String,
    },
    Unregister {
        address: String,
    },
    Ping,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerFrame {
    Rec {
        address: String,
        body: Value,
    },
    Err {
        address: String,
        #[serde(rename = "failureCode")]
        failure_code: u16,
        message: String,
    },
    Pong,
}

impl ServerFrame {
    pub fn failure(address: String, err: &DispatchError) -> Self {
        ServerFrame::Err {
            address,
            failure_code: err.status_code(),
            message: err.to_string(),
        }
    }
}

impl std::fmt::Display for ServerFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = serde_json::to_string(self).map_err(|_| std::fmt::Error)?;
        f.write_str(&text)
    }
}
