//! Core agent loop implementation.

use std::sync::Arc;

use futures::StreamExt;
use thiserror::Error;

use crate::config::Config;
use crate::llm::{ChatMessage, CompletionRequest, LlmClient, LlmError};
use crate::tools::ToolRegistry;

use super::events::{emit, AgentEvent, EventSender};
use super::parser::{parse_reply, AgentDirective};
use super::prompt::build_prompt;

/// Returned when the step budget runs out and no tool produced anything usable.
pub const STEP_LIMIT_MESSAGE: &str = "Agent stopped due to iteration limit or time limit.";

/// Stop sequence that keeps the model from inventing observations.
const OBSERVATION_STOP: &str = "\nObservation:";

#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error("could not parse model output ({message}): {raw}")]
    OutputParsing { message: String, raw: String },
}

/// Per-run settings.
#[derive(Debug, Clone)]
pub struct AgentOptions {
    pub model: String,
    pub temperature: f32,
    pub streaming: bool,
    pub max_steps: usize,
    pub handle_parsing_errors: bool,
}

impl Default for AgentOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl AgentOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            model: config.model.clone(),
            temperature: config.temperature,
            streaming: config.streaming,
            max_steps: config.max_iterations,
            handle_parsing_errors: config.handle_parsing_errors,
        }
    }
}

/// Why the run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    FinalAnswer,
    StepLimit,
}

/// One completed round of the loop.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentStep {
    /// Raw model reply for the round.
    pub reply: String,
    /// Tool requested, if the reply parsed as an action.
    pub tool: Option<String>,
    pub input: Option<String>,
    /// Text fed back to the model.
    pub observation: String,
}

/// Result of a run.
#[derive(Debug, Clone)]
pub struct AgentOutcome {
    pub answer: String,
    pub stop_reason: StopReason,
    pub steps: Vec<AgentStep>,
    /// Calls that reached a registered tool.
    pub tool_invocations: usize,
}

/// A ReAct agent over a fixed tool set.
pub struct Agent {
    llm: Arc<dyn LlmClient>,
    tools: ToolRegistry,
    options: AgentOptions,
}

impl Agent {
    pub fn new(llm: Arc<dyn LlmClient>, tools: ToolRegistry, options: AgentOptions) -> Self {
        Self {
            llm,
            tools,
            options,
        }
    }

    /// Answer `question`, reporting progress on `events` if given.
    ///
    /// Tool failures and (by default) malformed replies are fed back to the
    /// model. Running out of steps is not an error: the last successful tool
    /// output is returned, or [`STEP_LIMIT_MESSAGE`] if there is none.
    pub async fn run(
        &self,
        question: &str,
        events: Option<&EventSender>,
    ) -> Result<AgentOutcome, AgentError> {
        let max_steps = self.options.max_steps;
        let mut scratchpad = String::new();
        let mut steps = Vec::new();
        let mut tool_invocations = 0;
        let mut last_observation: Option<String> = None;

        for step in 1..=max_steps {
            tracing::debug!(step, max_steps, "Agent iteration");
            emit(events, AgentEvent::StepStarted { step, max_steps });

            let prompt = build_prompt(&self.tools, question, &scratchpad);
            let reply = self.complete(prompt, events).await?;

            match parse_reply(&reply) {
                AgentDirective::FinalAnswer { thought, answer } => {
                    tracing::debug!(step, thought = %thought, "Model reasoning");
                    tracing::info!(step, tool_invocations, "Agent produced a final answer");
                    emit(
                        events,
                        AgentEvent::FinalAnswer {
                            content: answer.clone(),
                        },
                    );
                    return Ok(AgentOutcome {
                        answer,
                        stop_reason: StopReason::FinalAnswer,
                        steps,
                        tool_invocations,
                    });
                }

                AgentDirective::ToolCall { thought, tool, input } => {
                    tracing::debug!(step, thought = %thought, "Model reasoning");
                    tracing::info!(step, tool = %tool, input = %input, "Calling tool");
                    emit(
                        events,
                        AgentEvent::ToolCall {
                            step,
                            tool: tool.clone(),
                            input: input.clone(),
                        },
                    );

                    let observation = self.tools.invoke(&tool, &input).await;
                    if observation.reached_tool() {
                        tool_invocations += 1;
                    }
                    if observation.is_success() {
                        last_observation = Some(observation.output.clone());
                    }

                    emit(
                        events,
                        AgentEvent::ToolResult {
                            step,
                            tool: tool.clone(),
                            output: observation.output.clone(),
                            failed: !observation.is_success(),
                        },
                    );

                    push_round(&mut scratchpad, &reply, &observation.output);
                    steps.push(AgentStep {
                        reply,
                        tool: Some(tool),
                        input: Some(input),
                        observation: observation.output,
                    });
                }

                AgentDirective::Unparsable { failure } => {
                    let message = failure.message().to_string();
                    if !self.options.handle_parsing_errors {
                        return Err(AgentError::OutputParsing { message, raw: reply });
                    }

                    tracing::warn!(step, reason = %message, "Unparsable model output");
                    emit(
                        events,
                        AgentEvent::ParseError {
                            step,
                            message,
                            raw: reply.clone(),
                        },
                    );

                    let observation = failure.observation().to_string();
                    push_round(&mut scratchpad, &reply, &observation);
                    steps.push(AgentStep {
                        reply,
                        tool: None,
                        input: None,
                        observation,
                    });
                }
            }
        }

        tracing::warn!(max_steps, tool_invocations, "Agent hit the step limit");
        emit(events, AgentEvent::StepLimitReached { max_steps });

        Ok(AgentOutcome {
            answer: last_observation.unwrap_or_else(|| STEP_LIMIT_MESSAGE.to_string()),
            stop_reason: StopReason::StepLimit,
            steps,
            tool_invocations,
        })
    }

    /// One model round; streamed fragments are forwarded as `Token` events.
    async fn complete(
        &self,
        prompt: String,
        events: Option<&EventSender>,
    ) -> Result<String, LlmError> {
        let request = CompletionRequest {
            model: self.options.model.clone(),
            messages: vec![ChatMessage::user(prompt)],
            temperature: self.options.temperature,
            stop: vec![OBSERVATION_STOP.to_string()],
            stream: self.options.streaming,
        };

        let mut stream = self.llm.chat_completion(&request).await?;
        let mut reply = String::new();
        // Bytes of `reply` already forwarded as tokens.
        let mut sent = 0;
        while let Some(fragment) = stream.next().await {
            reply.push_str(&fragment?);

            // Not every provider honours stop sequences.
            if let Some(idx) = reply.find(OBSERVATION_STOP) {
                reply.truncate(idx);
                break;
            }

            let safe = reply.len() - pending_stop_prefix(&reply);
            if safe > sent {
                forward_tokens(events, &reply[sent..safe]);
                sent = safe;
            }
        }

        if reply.len() > sent {
            forward_tokens(events, &reply[sent..]);
        }
        Ok(reply)
    }
}

fn forward_tokens(events: Option<&EventSender>, text: &str) {
    emit(
        events,
        AgentEvent::Token {
            content: text.to_string(),
        },
    );
}

/// Length of the longest tail of `text` that could still grow into the stop
/// sequence. That tail is held back until the next fragment decides it.
fn pending_stop_prefix(text: &str) -> usize {
    (1..OBSERVATION_STOP.len())
        .rev()
        .find(|&n| text.ends_with(&OBSERVATION_STOP[..n]))
        .unwrap_or(0)
}

fn push_round(scratchpad: &mut String, reply: &str, observation: &str) {
    scratchpad.push_str(reply);
    scratchpad.push_str("\nObservation: ");
    scratchpad.push_str(observation);
    scratchpad.push_str("\nThought: ");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scratchpad_rounds_end_with_a_thought_prompt() {
        let mut pad = String::new();
        push_round(&mut pad, " search\nAction: wikipedia\nAction Input: Paris", "Paris is big");
        assert_eq!(
            pad,
            " search\nAction: wikipedia\nAction Input: Paris\nObservation: Paris is big\nThought: "
        );
    }

    #[test]
    fn partial_stop_sequences_are_held_back() {
        assert_eq!(pending_stop_prefix("Action Input: Paris\nObs"), 4);
        assert_eq!(pending_stop_prefix("Action Input: Paris\n"), 1);
        assert_eq!(pending_stop_prefix("Action Input: Paris"), 0);
        assert_eq!(pending_stop_prefix("Café"), 0);
    }

    #[test]
    fn options_follow_config() {
        let mut config = Config::default();
        config.max_iterations = 3;
        config.handle_parsing_errors = false;
        let options = AgentOptions::from_config(&config);
        assert_eq!(options.max_steps, 3);
        assert!(!options.handle_parsing_errors);
        assert_eq!(options.model, "llama-3.1-8b-instant");
    }
}
