//! Line-oriented comm: JSON messages in on stdin, out on stdout
//!
//! Both directions use the same framing: `{"method": "custom", "content": ..}`
//! for widget messages and `{"method": "update", "state": {..}}` for state.

use gw_widget::{Comm, OutboundMessage};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, error};

/// One line received from the front end
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "method", rename_all = "lowercase")]
pub enum Input {
    /// A widget message for `Widget::handle_message`
    Custom { content: Value },
    /// Field values the front end changed
    Update { state: Map<String, Value> },
}

impl Input {
    pub fn parse(line: &str) -> serde_json::Result<Self> {
        serde_json::from_str(line)
    }
}

/// What the writer task receives
pub enum Output {
    Line(String),
    Shutdown,
}

/// Comm forwarding every message as one JSON line to the writer task
pub struct ChannelComm {
    sender: UnboundedSender<Output>,
}

impl ChannelComm {
    pub fn new() -> (Self, UnboundedReceiver<Output>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    /// Ask the writer to flush and stop
    pub fn shutdown(&self) {
        let _ = self.sender.send(Output::Shutdown);
    }

    fn write(&self, message: Value) {
        if self.sender.send(Output::Line(message.to_string())).is_err() {
            error!("Output closed, dropping message");
        }
    }
}

impl Comm for ChannelComm {
    fn send(&self, message: OutboundMessage) {
        debug!(id = message.id(), "sending message");
        self.write(json!({"method": "custom", "content": message.to_json()}));
    }

    fn sync_state(&self, field: &str, value: &Value) {
        self.write(json!({"method": "update", "state": {field: value}}));
    }
}

/// Write lines to stdout until shutdown
pub async fn write_lines(mut receiver: UnboundedReceiver<Output>) -> std::io::Result<()> {
    let mut stdout = BufWriter::new(tokio::io::stdout());
    while let Some(output) = receiver.recv().await {
        match output {
            Output::Line(line) => {
                stdout.write_all(line.as_bytes()).await?;
                stdout.write_all(b"\n").await?;
                stdout.flush().await?;
            }
            Output::Shutdown => break,
        }
    }
    stdout.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_lines_use_output_framing() {
        let custom = Input::parse(r#"{"method": "custom", "content": {"type": "cmd", "data": "{}"}}"#).unwrap();
        assert_eq!(
            custom,
            Input::Custom {
                content: json!({"type": "cmd", "data": "{}"})
            }
        );

        let update = Input::parse(r#"{"method": "update", "state": {"dark": true}}"#).unwrap();
        let Input::Update { state } = update else {
            panic!("expected a state update");
        };
        assert_eq!(state["dark"], json!(true));

        assert!(Input::parse(r#"{"type": "cmd", "data": "{}"}"#).is_err());
        assert!(Input::parse(r#"{"method": "display"}"#).is_err());
        assert!(Input::parse("not json").is_err());
    }

    #[test]
    fn test_output_lines_are_framed() {
        let (comm, mut receiver) = ChannelComm::new();
        comm.send(OutboundMessage::ack());
        comm.sync_state("dark", &json!(true));
        comm.shutdown();

        let mut lines = Vec::new();
        while let Ok(Output::Line(line)) = receiver.try_recv() {
            lines.push(serde_json::from_str::<Value>(&line).unwrap());
        }
        assert_eq!(
            lines,
            vec![
                json!({"method": "custom", "content": {"id": -1, "data": null}}),
                json!({"method": "update", "state": {"dark": true}}),
            ]
        );
    }
}
