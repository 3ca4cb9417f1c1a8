#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::StreamExt;
use research_chat::agent::{Agent, AgentOptions};
use research_chat::llm::{CompletionRequest, LlmClient, LlmError, TokenStream};
use research_chat::session::{AgentFactory, SessionError};
use research_chat::tools::{Tool, ToolError, ToolRegistry};
use secrecy::SecretString;

/// Replays canned replies in order, then repeats `fallback` forever.
pub struct ScriptedLlm {
    replies: Mutex<VecDeque<String>>,
    fallback: String,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedLlm {
    pub fn new(replies: &[&str], fallback: &str) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
            fallback: fallback.to_string(),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn chat_completion(&self, request: &CompletionRequest) -> Result<TokenStream, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());

        // Deliver in two fragments, the way a streaming provider would.
        let split = reply
            .char_indices()
            .nth(reply.chars().count() / 2)
            .map(|(i, _)| i)
            .unwrap_or(0);
        let (head, tail) = reply.split_at(split);
        let fragments: Vec<Result<String, LlmError>> = vec![Ok(head.to_string()), Ok(tail.to_string())]
            .into_iter()
            .filter(|f| f.as_ref().map(|s| !s.is_empty()).unwrap_or(true))
            .collect();
        Ok(futures::stream::iter(fragments).boxed())
    }
}

/// Always fails with the given error.
pub struct FailingLlm;

#[async_trait]
impl LlmClient for FailingLlm {
    async fn chat_completion(&self, _request: &CompletionRequest) -> Result<TokenStream, LlmError> {
        Err(LlmError::Unauthorized)
    }
}

/// A tool that returns a fixed text (or fails) and counts its calls.
pub struct StaticTool {
    name: &'static str,
    response: Result<String, String>,
    calls: Arc<AtomicUsize>,
}

impl StaticTool {
    pub fn ok(name: &'static str, response: &str) -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Self {
                name,
                response: Ok(response.to_string()),
                calls: calls.clone(),
            },
            calls,
        )
    }

    pub fn failing(name: &'static str, message: &str) -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Self {
                name,
                response: Err(message.to_string()),
                calls: calls.clone(),
            },
            calls,
        )
    }
}

#[async_trait]
impl Tool for StaticTool {
    fn name(&self) -> &str {
        self.name
    }

    fn description(&self) -> &str {
        "Test tool."
    }

    async fn invoke(&self, _query: &str) -> Result<String, ToolError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.response
            .clone()
            .map_err(ToolError::InvalidInput)
    }
}

pub fn options(max_steps: usize) -> AgentOptions {
    AgentOptions {
        max_steps,
        ..AgentOptions::default()
    }
}

/// The encyclopedia tool from the capital-of-France scenario.
pub fn encyclopedia() -> (ToolRegistry, Arc<AtomicUsize>) {
    let (tool, calls) = StaticTool::ok("wikipedia", "Paris is the capital of France.");
    let mut registry = ToolRegistry::new();
    registry.register(tool);
    (registry, calls)
}

pub const LOOKUP_REPLY: &str =
    " I should look up the capital.\nAction: wikipedia\nAction Input: capital of France";
pub const ANSWER_REPLY: &str =
    " I now know the final answer\nFinal Answer: The capital of France is Paris.";

/// Builds agents from a closure and counts how often it was asked to.
pub struct CountingFactory<F> {
    build: F,
    pub builds: Arc<AtomicUsize>,
}

impl<F> CountingFactory<F>
where
    F: Fn() -> Agent + Send + Sync,
{
    pub fn new(build: F) -> (Self, Arc<AtomicUsize>) {
        let builds = Arc::new(AtomicUsize::new(0));
        (
            Self {
                build,
                builds: builds.clone(),
            },
            builds,
        )
    }
}

impl<F> AgentFactory for CountingFactory<F>
where
    F: Fn() -> Agent + Send + Sync,
{
    fn build(
        &self,
        _groq_api_key: &SecretString,
        _tavily_api_key: &SecretString,
    ) -> Result<Agent, SessionError> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        Ok((self.build)())
    }
}
