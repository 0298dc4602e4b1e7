//! Conversation memory
//!
//! `Memory` is the ordered log of turns. The supervisor owns it for the
//! top-level conversation and hands each sub-agent an owned `snapshot()`, so
//! nothing a sub-agent does reaches the canonical log until it is merged back.

use serde::{Deserialize, Serialize};

use crate::ai::types::{Message, Role};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Memory {
    messages: Vec<Message>,
}

impl Memory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Memory seeded with a leading system message
    pub fn with_system_prompt(prompt: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::system(prompt)],
        }
    }

    pub fn from_messages(messages: Vec<Message>) -> Self {
        Self { messages }
    }

    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Append a batch, preserving its order
    pub fn extend(&mut self, messages: impl IntoIterator<Item = Message>) {
        self.messages.extend(messages);
    }

    /// Structurally independent copy
    pub fn snapshot(&self) -> Memory {
        self.clone()
    }

    /// Read-only view in conversation order
    pub fn all(&self) -> &[Message] {
        &self.messages
    }

    pub fn replace(&mut self, messages: Vec<Message>) {
        self.messages = messages;
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }

    /// Insert a system row at the front
    pub fn insert_system(&mut self, prompt: impl Into<String>) {
        self.messages.insert(0, Message::system(prompt));
    }

    /// Remove the leading row if it is exactly the system prompt `prompt`
    ///
    /// Returns whether a row was removed.
    pub fn remove_leading_system(&mut self, prompt: &str) -> bool {
        let matches = self
            .messages
            .first()
            .is_some_and(|m| m.role == Role::System && m.content == prompt);
        if matches {
            self.messages.remove(0);
        }
        matches
    }
}

impl From<Vec<Message>> for Memory {
    fn from(messages: Vec<Message>) -> Self {
        Self::from_messages(messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_is_independent() {
        let mut memory = Memory::new();
        memory.append(Message::user("hello"));

        let mut copy = memory.snapshot();
        copy.append(Message::assistant("scratch work"));

        assert_eq!(memory.len(), 1);
        assert_eq!(copy.len(), 2);
        assert_eq!(memory.all()[0], copy.all()[0]);
    }

    #[test]
    fn test_append_preserves_order() {
        let mut memory = Memory::with_system_prompt("be brief");
        memory.append(Message::user("a"));
        memory.extend(vec![Message::assistant("b"), Message::user("c")]);

        let contents: Vec<&str> = memory.all().iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["be brief", "a", "b", "c"]);
        assert_eq!(memory.last().map(|m| m.content.as_str()), Some("c"));
    }

    #[test]
    fn test_remove_leading_system_only_removes_matching_row() {
        let mut memory = Memory::from_messages(vec![Message::user("q")]);
        memory.insert_system("agent prompt");
        assert_eq!(memory.all()[0].role, Role::System);

        assert!(!memory.remove_leading_system("other prompt"));
        assert!(memory.remove_leading_system("agent prompt"));
        assert_eq!(memory.len(), 1);
        assert!(!memory.remove_leading_system("agent prompt"));
    }

    #[test]
    fn test_replace() {
        let mut memory = Memory::from(vec![Message::user("old")]);
        memory.replace(vec![Message::user("new"), Message::assistant("reply")]);
        assert_eq!(memory.len(), 2);
        assert_eq!(memory.into_messages()[0].content, "new");
    }
}
