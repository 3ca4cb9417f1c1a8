//! Groq chat completions (OpenAI-compatible API).

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use super::{CompletionRequest, LlmClient, LlmError, TokenStream};

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Client for `POST {base_url}/chat/completions`.
pub struct GroqClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: SecretString,
}

impl GroqClient {
    pub fn new(api_key: SecretString, base_url: &str, timeout: Duration) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LlmError::Config(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            api_key,
        })
    }
}

#[async_trait]
impl LlmClient for GroqClient {
    async fn chat_completion(&self, request: &CompletionRequest) -> Result<TokenStream, LlmError> {
        tracing::debug!(
            model = %request.model,
            stream = request.stream,
            messages = request.messages.len(),
            "Groq chat completion"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(self.api_key.expose_secret())
            .json(request)
            .send()
            .await
            .map_err(|e| LlmError::Network(e.to_string()))?;

        match response.status() {
            status if status.is_success() => {}
            StatusCode::UNAUTHORIZED => return Err(LlmError::Unauthorized),
            StatusCode::TOO_MANY_REQUESTS => return Err(LlmError::RateLimited),
            status => {
                let body = response.text().await.unwrap_or_default();
                return Err(LlmError::Provider {
                    status: status.as_u16(),
                    body,
                });
            }
        }

        if request.stream {
            return Ok(sse_deltas(response.bytes_stream()).boxed());
        }

        let body: CompletionResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Decode(e.to_string()))?;
        let content = body
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::Decode("no choices returned".to_string()))?
            .message
            .content
            .unwrap_or_default();

        Ok(futures::stream::once(async move { Ok(content) }).boxed())
    }
}

/// What a single SSE line contributes to the reply.
#[derive(Debug, PartialEq)]
enum SseLine {
    Delta(String),
    Done,
    Failed(String),
    Skip,
}

fn parse_sse_line(line: &[u8]) -> SseLine {
    let line = String::from_utf8_lossy(line);
    let line = line.trim_end_matches(['\r', '\n']);

    let Some(data) = line.strip_prefix("data:") else {
        // Comments, `event:` and blank separator lines.
        return SseLine::Skip;
    };
    let data = data.trim();

    if data == "[DONE]" {
        return SseLine::Done;
    }

    let chunk: serde_json::Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(error = %e, "Skipping malformed SSE chunk");
            return SseLine::Skip;
        }
    };

    if let Some(error) = chunk.get("error") {
        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        return SseLine::Failed(message);
    }

    match chunk["choices"][0]["delta"]["content"].as_str() {
        Some(text) if !text.is_empty() => SseLine::Delta(text.to_string()),
        _ => SseLine::Skip,
    }
}

struct SseState<S> {
    inner: Pin<Box<S>>,
    buf: Vec<u8>,
    upstream_done: bool,
    finished: bool,
}

/// Turn an SSE byte stream into content deltas.
///
/// Bytes are buffered until a full line is available; the stream ends at
/// `data: [DONE]`, at the end of the body, or after the first error.
fn sse_deltas<S>(inner: S) -> impl Stream<Item = Result<String, LlmError>> + Send + 'static
where
    S: Stream<Item = Result<bytes::Bytes, reqwest::Error>> + Send + 'static,
{
    let state = SseState {
        inner: Box::pin(inner),
        buf: Vec::new(),
        upstream_done: false,
        finished: false,
    };

    futures::stream::unfold(state, |mut state| async move {
        loop {
            if state.finished {
                return None;
            }

            let line = if let Some(pos) = state.buf.iter().position(|&b| b == b'\n') {
                Some(state.buf.drain(..=pos).collect::<Vec<u8>>())
            } else if state.upstream_done {
                if state.buf.is_empty() {
                    return None;
                }
                Some(std::mem::take(&mut state.buf))
            } else {
                None
            };

            if let Some(line) = line {
                match parse_sse_line(&line) {
                    SseLine::Delta(text) => return Some((Ok(text), state)),
                    SseLine::Done => return None,
                    SseLine::Failed(message) => {
                        state.finished = true;
                        return Some((
                            Err(LlmError::Provider {
                                status: 200,
                                body: message,
                            }),
                            state,
                        ));
                    }
                    SseLine::Skip => continue,
                }
            }

            match state.inner.next().await {
                Some(Ok(chunk)) => state.buf.extend_from_slice(&chunk),
                Some(Err(e)) => {
                    state.finished = true;
                    return Some((Err(LlmError::Network(e.to_string())), state));
                }
                None => state.upstream_done = true,
            }
        }
    })
}
