//! The `LlmClient` collaborator seam (§4.5): every scheduler decision and
//! evaluator verdict is produced by calling `generate_object` against a
//! JSON Schema, never by free-text parsing.

pub mod openai_compatible;

use crate::error::CollaboratorError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Role of a single turn in the conversation handed to the LLM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Token usage reported back by a single `generate_object` call, fed
/// straight into the scheduler's `TokenTracker`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

/// A schema-conformant object plus the usage it cost to produce.
#[derive(Debug, Clone)]
pub struct GeneratedObject {
    pub value: Value,
    pub usage: Usage,
}

/// Structured generation against the configured LLM endpoint. Implementors
/// are responsible for the retry-on-schema-violation policy (§4.5: up to
/// two retries, appending the validation error to the conversation before
/// retrying) — callers always receive either a conformant object or a
/// terminal `CollaboratorError::SchemaViolation`.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn generate_object(
        &self,
        schema: &Value,
        system: &str,
        messages: &[ChatMessage],
    ) -> Result<GeneratedObject, CollaboratorError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_message_constructors_set_roles() {
        assert_eq!(ChatMessage::system("s").role, Role::System);
        assert_eq!(ChatMessage::user("u").role, Role::User);
        assert_eq!(ChatMessage::assistant("a").role, Role::Assistant);
    }
}
