//! Events emitted while a supervisor run is in flight

use serde::Serialize;
use tokio::sync::mpsc;

use crate::ai::types::Message;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SupervisorEvent {
    /// Incremental model text
    Delta { delta: String },
    /// A regular tool call is about to run
    ToolCall { id: String, name: String },
    /// Control passed to a sub-agent
    HandoffStarted {
        agent: String,
        task: Option<String>,
    },
    /// Sub-agent output has been merged back
    HandoffCompleted { agent: String, messages_added: usize },
    /// Terminal assistant turn
    Finished { response: Message },
}

/// Optional event channel
///
/// Sending never fails the run: a dropped receiver just means nobody is
/// listening anymore.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<mpsc::UnboundedSender<SupervisorEvent>>,
}

impl EventSink {
    pub fn new(tx: Option<mpsc::UnboundedSender<SupervisorEvent>>) -> Self {
        Self { tx }
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn emit(&self, event: SupervisorEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_events_serialize_tagged() {
        let value = serde_json::to_value(SupervisorEvent::Delta {
            delta: "hi".into(),
        })
        .unwrap();
        assert_eq!(value, json!({"type": "delta", "delta": "hi"}));
    }

    #[test]
    fn test_emit_after_receiver_dropped_is_silent() {
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = EventSink::new(Some(tx));
        drop(rx);
        sink.emit(SupervisorEvent::Delta { delta: "x".into() });
        EventSink::disabled().emit(SupervisorEvent::Delta { delta: "y".into() });
    }
}
