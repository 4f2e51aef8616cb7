use serde::{Deserialize, Serialize};

use crate::error::Error;

/// The actor currently speaking.
#[derive(Debug, Default, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Assistant,
    System,
}

/// A single conversation entry.
///
/// `content` is plain text. Anything else on the wire (content arrays, numbers, nulls) is
/// rejected when the message is deserialized, so renderers never have to coerce it.
#[derive(Debug, Default, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content: String,
    /// Set on an assistant message whose stream was cut short. Never sent over the wire.
    #[serde(skip)]
    pub incomplete: bool,
}

impl Message {
    #[must_use]
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            incomplete: false,
        }
    }

    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }
}

/// Simplified type that identifies a conversation as a vector of messages.
pub type Conversation = Vec<Message>;

/// Body of a relay request.
#[derive(Debug, Default, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatRequest {
    pub messages: Conversation,
}

impl ChatRequest {
    #[must_use]
    pub fn new(messages: Conversation) -> Self {
        Self { messages }
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.messages.is_empty() {
            return Err(Error::InvalidMessage(
                "the conversation must contain at least one message".to_string(),
            ));
        }

        Ok(())
    }
}
