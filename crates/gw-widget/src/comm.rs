//! Host channel between the widget and its front-end view

use parking_lot::Mutex;
use serde_json::{Map, Value};

use crate::envelope::OutboundMessage;

/// Transport a widget talks to its front end through
pub trait Comm: Send + Sync {
    /// Deliver a custom message
    fn send(&self, message: OutboundMessage);

    /// Push the new value of a synchronized state field
    fn sync_state(&self, field: &str, value: &Value);
}

/// Comm that keeps everything it is given in memory
#[derive(Default)]
pub struct RecordingComm {
    messages: Mutex<Vec<OutboundMessage>>,
    state: Mutex<Map<String, Value>>,
    syncs: Mutex<Vec<String>>,
}

impl RecordingComm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages sent so far, oldest first
    pub fn messages(&self) -> Vec<OutboundMessage> {
        self.messages.lock().clone()
    }

    /// Take the messages sent so far
    pub fn take_messages(&self) -> Vec<OutboundMessage> {
        std::mem::take(&mut *self.messages.lock())
    }

    /// Last synchronized value of every field
    pub fn state(&self) -> Map<String, Value> {
        self.state.lock().clone()
    }

    /// Names of synchronized fields, in sync order
    pub fn synced_fields(&self) -> Vec<String> {
        self.syncs.lock().clone()
    }
}

impl Comm for RecordingComm {
    fn send(&self, message: OutboundMessage) {
        self.messages.lock().push(message);
    }

    fn sync_state(&self, field: &str, value: &Value) {
        self.state.lock().insert(field.to_string(), value.clone());
        self.syncs.lock().push(field.to_string());
    }
}
