//! Append-only conversation log.
//!
//! The log is the display ground truth and the context handed to the NLP
//! capability. Entries are never removed or reordered. The NLP context is
//! bounded separately by [`ConversationLog::window`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::replies;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub role: Role,
    pub text: String,
}

/// Render arbitrary content as plain text: strings as-is, null as the empty
/// string, anything else as compact JSON.
pub fn render_content(content: Value) -> String {
    match content {
        Value::String(text) => text,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConversationLog {
    messages: Vec<Message>,
}

impl ConversationLog {
    /// A log holding only the assistant greeting.
    pub fn new() -> Self {
        let mut log = Self::empty();
        log.append(Role::Assistant, replies::GREETING);
        log
    }

    pub fn empty() -> Self {
        Self {
            messages: Vec::new(),
        }
    }

    /// Append one entry. Accepts anything convertible to a JSON value so
    /// structured assistant content still lands as text.
    pub fn append(&mut self, role: Role, content: impl Into<Value>) {
        self.messages.push(Message {
            role,
            text: render_content(content.into()),
        });
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// The most recent `max` entries, oldest first. `max == 0` returns the
    /// whole log.
    pub fn window(&self, max: usize) -> &[Message] {
        if max == 0 || self.messages.len() <= max {
            &self.messages
        } else {
            &self.messages[self.messages.len() - max..]
        }
    }
}

impl Default for ConversationLog {
    fn default() -> Self {
        Self::new()
    }
}
