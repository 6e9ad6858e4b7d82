//! Message - immutable envelope of payload + headers
//!
//! A message never changes after construction. Recording provenance
//! produces a new value through [`Message::with_history`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::NamedComponent;

/// Header names owned by [`MessageHeaders`] itself
const RESERVED_HEADERS: [&str; 3] = ["id", "timestamp", "history"];

/// Provenance record: one component the message passed through
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Component name
    pub name: String,

    /// Component type (e.g. "channel", "transformer")
    #[serde(rename = "type")]
    pub component_type: String,

    /// Time the entry was recorded (epoch ms)
    pub timestamp: i64,
}

/// Message metadata
///
/// Serialized field order: `id`, `timestamp`, `history` (omitted when empty),
/// then custom headers in key order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageHeaders {
    id: Uuid,

    timestamp: i64,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    history: Vec<HistoryEntry>,

    #[serde(flatten)]
    custom: BTreeMap<String, serde_json::Value>,
}

impl MessageHeaders {
    fn generate(custom: BTreeMap<String, serde_json::Value>) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: now_millis(),
            history: Vec::new(),
            custom,
        }
    }

    /// Unique message id
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Creation time (epoch ms)
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// Provenance entries, oldest first
    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    /// Look up a custom header
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.custom.get(key)
    }

    /// Custom headers in key order
    pub fn custom(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.custom
    }
}

/// Immutable message envelope
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message<T> {
    headers: MessageHeaders,
    payload: T,
}

impl<T> Message<T> {
    /// Create a message with fresh id and timestamp
    pub fn new(payload: T) -> Self {
        Self {
            headers: MessageHeaders::generate(BTreeMap::new()),
            payload,
        }
    }

    /// Message payload
    pub fn payload(&self) -> &T {
        &self.payload
    }

    /// Message headers
    pub fn headers(&self) -> &MessageHeaders {
        &self.headers
    }

    /// Shortcut for `headers().id()`
    pub fn id(&self) -> Uuid {
        self.headers.id
    }

    /// Shortcut for `headers().history()`
    pub fn history(&self) -> &[HistoryEntry] {
        &self.headers.history
    }

    /// Take the payload, discarding headers
    pub fn into_payload(self) -> T {
        self.payload
    }

    /// Return a new message with `component` appended to the history
    ///
    /// Id, timestamp, custom headers and payload are carried over unchanged.
    pub fn with_history(self, component: &dyn NamedComponent) -> Self {
        let mut headers = self.headers;
        headers.history.push(HistoryEntry {
            name: component.component_name().to_string(),
            component_type: component.component_type().to_string(),
            timestamp: now_millis(),
        });
        Self {
            headers,
            payload: self.payload,
        }
    }
}

/// Builder for messages carrying custom headers
#[derive(Debug)]
pub struct MessageBuilder<T> {
    payload: T,
    history: Vec<HistoryEntry>,
    custom: BTreeMap<String, serde_json::Value>,
}

impl<T> MessageBuilder<T> {
    /// Start a builder for `payload`
    pub fn with_payload(payload: T) -> Self {
        Self {
            payload,
            history: Vec::new(),
            custom: BTreeMap::new(),
        }
    }

    /// Set a custom header
    ///
    /// Reserved names (`id`, `timestamp`, `history`) are ignored.
    pub fn header(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        let key = key.into();
        if !RESERVED_HEADERS.contains(&key.as_str()) {
            self.custom.insert(key, value.into());
        }
        self
    }

    /// Copy custom headers and history from another message
    ///
    /// Id and timestamp are never copied; the built message gets its own.
    pub fn copy_headers_from<U>(mut self, message: &Message<U>) -> Self {
        self.history = message.headers.history.clone();
        for (key, value) in &message.headers.custom {
            self.custom.insert(key.clone(), value.clone());
        }
        self
    }

    /// Build the message
    pub fn build(self) -> Message<T> {
        let mut headers = MessageHeaders::generate(self.custom);
        headers.history = self.history;
        Message {
            headers,
            payload: self.payload,
        }
    }
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
