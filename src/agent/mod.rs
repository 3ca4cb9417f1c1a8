//! Agent module - the ReAct question-answering loop.
//!
//! The agent follows a "tools in a loop" pattern:
//! 1. Build a prompt describing the tools, the question and the scratchpad
//! 2. Ask the model for the next step
//! 3. If the model requests a tool, run it and append the observation
//! 4. Repeat until the model gives a final answer or the step budget runs out

mod agent_loop;
mod events;
mod parser;
mod prompt;

pub use agent_loop::{
    Agent, AgentError, AgentOptions, AgentOutcome, AgentStep, StopReason, STEP_LIMIT_MESSAGE,
};
pub use events::{event_channel, AgentEvent, EventReceiver, EventSender};
pub use parser::{parse_reply, AgentDirective, ParseFailure};
pub use prompt::build_prompt;
