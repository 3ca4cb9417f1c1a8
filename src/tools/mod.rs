//! Lookup tools the agent can call.
//!
//! Every tool takes a single free-text query and returns plain text. Failures
//! never escape the registry as errors: they are rendered into the observation
//! handed back to the model so it can try another tool or give up.

mod arxiv;
mod web;
mod wikipedia;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::SecretString;
use thiserror::Error;

use crate::config::Config;

pub use arxiv::ArxivSearch;
pub use web::WebSearch;
pub use wikipedia::WikipediaSearch;

const USER_AGENT: &str = concat!("research-chat/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("missing credential: {0}")]
    MissingCredential(&'static str),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("request to {service} failed: {source}")]
    Http {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{service} returned HTTP {status}: {body}")]
    Status {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("unexpected response from {service}: {message}")]
    Decode {
        service: &'static str,
        message: String,
    },
}

impl ToolError {
    pub(crate) fn http(service: &'static str) -> impl FnOnce(reqwest::Error) -> Self {
        move |source| Self::Http { service, source }
    }
}

/// A tool the agent can invoke with a single text query.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Name the model uses in `Action:` lines.
    fn name(&self) -> &str;

    /// One-line description shown to the model.
    fn description(&self) -> &str;

    async fn invoke(&self, query: &str) -> Result<String, ToolError>;
}

/// Name and description of a registered tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
}

/// How a registry invocation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObservationStatus {
    Succeeded,
    Failed,
    UnknownTool,
}

/// Text handed back to the model after a tool call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolObservation {
    pub output: String,
    pub status: ObservationStatus,
}

impl ToolObservation {
    pub fn is_success(&self) -> bool {
        self.status == ObservationStatus::Succeeded
    }

    /// Whether a registered tool actually ran.
    pub fn reached_tool(&self) -> bool {
        self.status != ObservationStatus::UnknownTool
    }
}

/// Ordered set of tools available to one agent run.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Web search, arXiv and Wikipedia, configured from `config`.
    pub fn with_defaults(
        config: &Config,
        tavily_api_key: Option<SecretString>,
    ) -> Result<Self, ToolError> {
        let client = build_http_client(config.http_timeout)?;

        let mut registry = Self::new();
        registry.register(WebSearch::new(
            client.clone(),
            &config.endpoints.tavily,
            tavily_api_key,
            config.tools.web_search,
        ));
        registry.register(ArxivSearch::new(
            client.clone(),
            &config.endpoints.arxiv,
            config.tools.arxiv,
        ));
        registry.register(WikipediaSearch::new(
            client,
            &config.endpoints.wikipedia,
            config.tools.wikipedia,
        ));
        Ok(registry)
    }

    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        self.tools.push(Arc::new(tool));
    }

    pub fn list_tools(&self) -> Vec<ToolInfo> {
        self.tools
            .iter()
            .map(|t| ToolInfo {
                name: t.name().to_string(),
                description: t.description().to_string(),
            })
            .collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    /// Look a tool up by name, ignoring case and surrounding whitespace.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        let name = name.trim();
        self.tools
            .iter()
            .find(|t| t.name() == name)
            .or_else(|| self.tools.iter().find(|t| t.name().eq_ignore_ascii_case(name)))
    }

    /// Run a tool and turn its result into an observation.
    pub async fn invoke(&self, name: &str, query: &str) -> ToolObservation {
        let Some(tool) = self.get(name) else {
            return ToolObservation {
                output: format!(
                    "{} is not a valid tool, try one of [{}].",
                    name.trim(),
                    self.names().join(", ")
                ),
                status: ObservationStatus::UnknownTool,
            };
        };

        match tool.invoke(query).await {
            Ok(output) => ToolObservation {
                output,
                status: ObservationStatus::Succeeded,
            },
            Err(e) => {
                tracing::warn!(tool = tool.name(), error = %e, "Tool call failed");
                ToolObservation {
                    output: format!("Error: {}", e),
                    status: ObservationStatus::Failed,
                }
            }
        }
    }
}

/// HTTP client shared by the lookup tools.
pub fn build_http_client(timeout: Duration) -> Result<reqwest::Client, ToolError> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
        .map_err(ToolError::http("http client"))
}

/// Keep at most `max_chars` characters of `s`.
pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

/// Basic HTML/XML entity decoding.
pub(crate) fn decode_entities(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

/// Collapse runs of whitespace (including newlines) into single spaces.
pub(crate) fn squash_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
