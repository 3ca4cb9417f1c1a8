//! Chat-completion clients.
//!
//! The agent only needs one capability from a model provider: send a list of
//! messages and receive the reply as a stream of text fragments. Non-streaming
//! providers yield the whole reply as a single fragment.

mod groq;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use groq::GroqClient;

/// Reply text, fragment by fragment.
pub type TokenStream = BoxStream<'static, Result<String, LlmError>>;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("network error: {0}")]
    Network(String),

    #[error("the model provider rejected the API key")]
    Unauthorized,

    #[error("rate limited by the model provider")]
    RateLimited,

    #[error("model provider returned HTTP {status}: {body}")]
    Provider { status: u16, body: String },

    #[error("could not decode model response: {0}")]
    Decode(String),

    #[error("invalid client configuration: {0}")]
    Config(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// One completion call.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub stop: Vec<String>,
    pub stream: bool,
}

/// A chat-completion backend.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn chat_completion(&self, request: &CompletionRequest) -> Result<TokenStream, LlmError>;
}
