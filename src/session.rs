//! One interactive chat session: credentials, history and the prompt cycle.
//!
//! The session is independent of any terminal so that the credential gate and
//! the turn bookkeeping can be exercised directly.

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use uuid::Uuid;

use crate::agent::{Agent, AgentOptions, EventSender, StopReason};
use crate::config::Config;
use crate::conversation::{Conversation, Turn};
use crate::llm::{GroqClient, LlmError};
use crate::tools::{ToolError, ToolRegistry};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("could not set up the model client: {0}")]
    Llm(#[from] LlmError),

    #[error("could not set up the tools: {0}")]
    Tool(#[from] ToolError),
}

/// A credential the user has not supplied yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingCredential {
    Groq,
    Tavily,
}

impl MissingCredential {
    pub fn warning(&self) -> &'static str {
        match self {
            Self::Groq => "Please enter your Groq API key.",
            Self::Tavily => "Please enter your Tavily API key.",
        }
    }
}

impl std::fmt::Display for MissingCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.warning())
    }
}

/// API keys, kept in memory only. Blank keys count as absent.
#[derive(Debug, Default)]
pub struct Credentials {
    groq_api_key: Option<SecretString>,
    tavily_api_key: Option<SecretString>,
}

impl Credentials {
    pub fn new(groq_api_key: impl Into<String>, tavily_api_key: impl Into<String>) -> Self {
        let mut credentials = Self::default();
        credentials.set_groq_api_key(groq_api_key);
        credentials.set_tavily_api_key(tavily_api_key);
        credentials
    }

    pub fn set_groq_api_key(&mut self, key: impl Into<String>) {
        self.groq_api_key = non_blank(key.into());
    }

    pub fn set_tavily_api_key(&mut self, key: impl Into<String>) {
        self.tavily_api_key = non_blank(key.into());
    }

    /// Both keys, or the first one that is missing (Groq is checked first).
    pub fn keys(&self) -> Result<(&SecretString, &SecretString), MissingCredential> {
        let groq = self.groq_api_key.as_ref().ok_or(MissingCredential::Groq)?;
        let tavily = self.tavily_api_key.as_ref().ok_or(MissingCredential::Tavily)?;
        Ok((groq, tavily))
    }

    pub fn missing(&self) -> Option<MissingCredential> {
        self.keys().err()
    }
}

fn non_blank(key: String) -> Option<SecretString> {
    let key = key.trim();
    if key.is_empty() {
        None
    } else {
        Some(SecretString::new(key.into()))
    }
}

/// Builds the agent for one prompt from the session's credentials.
pub trait AgentFactory: Send + Sync {
    fn build(&self, groq_api_key: &SecretString, tavily_api_key: &SecretString)
        -> Result<Agent, SessionError>;
}

/// Groq model plus web search, arXiv and Wikipedia.
pub struct GroqAgentFactory {
    config: Config,
}

impl GroqAgentFactory {
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

impl AgentFactory for GroqAgentFactory {
    fn build(
        &self,
        groq_api_key: &SecretString,
        tavily_api_key: &SecretString,
    ) -> Result<Agent, SessionError> {
        let llm = GroqClient::new(
            SecretString::new(groq_api_key.expose_secret().into()),
            &self.config.endpoints.groq,
            self.config.http_timeout,
        )?;
        let tools = ToolRegistry::with_defaults(
            &self.config,
            Some(SecretString::new(tavily_api_key.expose_secret().into())),
        )?;
        Ok(Agent::new(
            Arc::new(llm),
            tools,
            AgentOptions::from_config(&self.config),
        ))
    }
}

/// Result of submitting one line of input.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// Blank input; nothing happened.
    Ignored,
    /// A credential is missing; nothing was recorded and no agent ran.
    Warning(MissingCredential),
    /// The agent answered (possibly with its step-limit fallback).
    Answered {
        answer: String,
        stop_reason: StopReason,
    },
    /// The agent could not run to completion; an apology was recorded.
    Failed { message: String },
}

/// A prompt that passed the credential gate and is already in the history.
#[derive(Debug)]
pub struct AcceptedPrompt {
    prompt: String,
}

pub struct ChatSession {
    id: Uuid,
    credentials: Credentials,
    conversation: Conversation,
    factory: Box<dyn AgentFactory>,
}

impl ChatSession {
    pub fn new(factory: impl AgentFactory + 'static) -> Self {
        Self {
            id: Uuid::new_v4(),
            credentials: Credentials::default(),
            conversation: Conversation::with_greeting(),
            factory: Box::new(factory),
        }
    }

    /// A session backed by the Groq agent.
    pub fn with_config(config: Config) -> Self {
        Self::new(GroqAgentFactory::new(config))
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn set_groq_api_key(&mut self, key: impl Into<String>) {
        self.credentials.set_groq_api_key(key);
    }

    pub fn set_tavily_api_key(&mut self, key: impl Into<String>) {
        self.credentials.set_tavily_api_key(key);
    }

    /// Run one prompt through the agent.
    ///
    /// Progress is reported on `events`; the sender is dropped when this
    /// returns, which closes the channel for the consumer.
    pub async fn submit(&mut self, prompt: &str, events: Option<EventSender>) -> SubmitOutcome {
        match self.accept(prompt) {
            Ok(accepted) => self.answer(accepted, events).await,
            Err(outcome) => outcome,
        }
    }

    /// Check the prompt and the credentials, then record the user turn.
    ///
    /// On `Err` nothing was recorded. The caller can show the new turn before
    /// handing the prompt to [`ChatSession::answer`].
    pub fn accept(&mut self, prompt: &str) -> Result<AcceptedPrompt, SubmitOutcome> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(SubmitOutcome::Ignored);
        }

        if let Some(missing) = self.credentials.missing() {
            tracing::warn!(session_id = %self.id, "Prompt rejected: {}", missing);
            return Err(SubmitOutcome::Warning(missing));
        }

        self.conversation.append(Turn::user(prompt));
        tracing::info!(session_id = %self.id, turns = self.conversation.len(), "Prompt accepted");

        Ok(AcceptedPrompt {
            prompt: prompt.to_string(),
        })
    }

    /// Run the agent on an accepted prompt and record its answer.
    ///
    /// Always appends exactly one assistant turn. A failed run records an
    /// apology instead of an answer.
    pub async fn answer(
        &mut self,
        accepted: AcceptedPrompt,
        events: Option<EventSender>,
    ) -> SubmitOutcome {
        let prompt = accepted.prompt;

        let result = match self.credentials.keys() {
            Ok((groq_api_key, tavily_api_key)) => {
                match self.factory.build(groq_api_key, tavily_api_key) {
                    Ok(agent) => agent
                        .run(&prompt, events.as_ref())
                        .await
                        .map_err(|e| e.to_string()),
                    Err(e) => Err(e.to_string()),
                }
            }
            // Keys were cleared between accept and answer.
            Err(missing) => Err(missing.to_string()),
        };

        match result {
            Ok(outcome) => {
                self.conversation.append(Turn::assistant(outcome.answer.clone()));
                SubmitOutcome::Answered {
                    answer: outcome.answer,
                    stop_reason: outcome.stop_reason,
                }
            }
            Err(message) => {
                tracing::error!(session_id = %self.id, error = %message, "Agent run failed");
                self.conversation.append(Turn::assistant(format!(
                    "Sorry, I couldn't complete that request: {}",
                    message
                )));
                SubmitOutcome::Failed { message }
            }
        }
    }
}
