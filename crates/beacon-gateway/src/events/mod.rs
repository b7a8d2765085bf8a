//! Gateway dispatch events
//!
//! Only `Ready` and `Resumed` affect session state; everything else is
//! carried opaquely to the dispatch sink.

mod event_types;
mod payloads;

pub use event_types::EventType;
pub use payloads::{ReadyEvent, UnavailableGuild, UserPayload};

use serde_json::Value;

/// A server-dispatched event
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchEvent {
    /// Session established after Identify
    Ready(ReadyEvent),
    /// Session re-attached after Resume
    Resumed,
    /// Any other event, routed downstream untouched
    Other {
        /// Wire name from the `t` field
        event_type: String,
        /// Raw event payload
        data: Value,
    },
}

impl DispatchEvent {
    /// Build an event from the dispatch envelope's `t` and `d` fields
    ///
    /// READY is decoded leniently: a structurally unexpected payload still
    /// produces a `Ready` (with no session id) so that resumability degrades
    /// instead of the stream failing.
    #[must_use]
    pub fn from_parts(event_type: &str, data: Value) -> Self {
        match EventType::parse(event_type) {
            Some(EventType::Ready) => {
                let ready = serde_json::from_value(data).unwrap_or_default();
                Self::Ready(ready)
            }
            Some(EventType::Resumed) => Self::Resumed,
            None => Self::Other {
                event_type: event_type.to_string(),
                data,
            },
        }
    }

    /// The wire name of this event
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Ready(_) => EventType::Ready.as_str(),
            Self::Resumed => EventType::Resumed.as_str(),
            Self::Other { event_type, .. } => event_type,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ready_from_parts() {
        let event = DispatchEvent::from_parts(
            "READY",
            serde_json::json!({"v": 10, "session_id": "s1"}),
        );

        match event {
            DispatchEvent::Ready(ready) => {
                assert_eq!(ready.session_id.as_deref(), Some("s1"));
            }
            other => panic!("expected Ready, got {other:?}"),
        }
    }

    #[test]
    fn test_malformed_ready_degrades() {
        let event = DispatchEvent::from_parts("READY", serde_json::json!(17));

        match event {
            DispatchEvent::Ready(ready) => assert_eq!(ready.session_id, None),
            other => panic!("expected Ready, got {other:?}"),
        }
    }

    #[test]
    fn test_resumed_from_parts() {
        let event = DispatchEvent::from_parts("RESUMED", Value::Null);
        assert_eq!(event, DispatchEvent::Resumed);
    }

    #[test]
    fn test_non_state_event_is_opaque() {
        let data = serde_json::json!({"content": "hi"});
        let event = DispatchEvent::from_parts("MESSAGE_CREATE", data.clone());

        assert_eq!(event.name(), "MESSAGE_CREATE");
        match event {
            DispatchEvent::Other { event_type, data: d } => {
                assert_eq!(event_type, "MESSAGE_CREATE");
                assert_eq!(d, data);
            }
            other => panic!("expected Other, got {other:?}"),
        }
    }
}
