//! Messages exchanged with the front-end viewer

use gw_data::EngineResponse;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::error;

/// Id of the table announcement
pub const TABLE_MESSAGE_ID: i64 = -2;

/// Id of the handshake acknowledgement
pub const ACK_MESSAGE_ID: i64 = -1;

/// The `type` of an envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Table,
    Cmd,
}

/// A message sent to the front end
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum OutboundMessage {
    /// `{"id", "type", "data"}` with `data` a string
    Envelope {
        id: i64,
        #[serde(rename = "type")]
        kind: MessageKind,
        data: String,
    },
    /// `{"id": -1, "data": null}`
    Ack { id: i64, data: () },
}

impl OutboundMessage {
    /// Announce the identifier of the bound table
    pub fn table(name: impl Into<String>) -> Self {
        OutboundMessage::Envelope {
            id: TABLE_MESSAGE_ID,
            kind: MessageKind::Table,
            data: name.into(),
        }
    }

    /// Acknowledge the front end's `init`
    pub fn ack() -> Self {
        OutboundMessage::Ack {
            id: ACK_MESSAGE_ID,
            data: (),
        }
    }

    /// Wrap an engine reply; dates and times inside are encoded as
    /// millisecond timestamps by the cell serializer
    pub fn command(response: &EngineResponse) -> Result<Self, serde_json::Error> {
        Ok(OutboundMessage::Envelope {
            id: response.id(),
            kind: MessageKind::Cmd,
            data: serde_json::to_string(response)?,
        })
    }

    pub fn id(&self) -> i64 {
        match self {
            OutboundMessage::Envelope { id, .. } | OutboundMessage::Ack { id, .. } => *id,
        }
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|e| {
            error!("Failed to encode message {}: {}", self.id(), e);
            Value::Null
        })
    }
}

/// A message received from the front end
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InboundMessage {
    #[serde(rename = "type")]
    pub kind: Option<MessageKind>,

    /// JSON-encoded engine command for `cmd` messages
    #[serde(default)]
    pub data: Value,
}

impl InboundMessage {
    /// Read an envelope; anything that is not a well-formed `cmd` is `None`
    pub fn parse(content: &Value) -> Option<Self> {
        InboundMessage::deserialize(content)
            .ok()
            .filter(|message| message.kind == Some(MessageKind::Cmd))
    }

    /// Decode the command carried in `data`
    pub fn command(&self) -> Option<Value> {
        match &self.data {
            Value::String(text) => serde_json::from_str(text).ok(),
            Value::Object(_) => Some(self.data.clone()),
            _ => None,
        }
    }
}
