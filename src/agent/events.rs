use tokio::sync::mpsc;

/// Progress reported by the agent while it works on one prompt.
///
/// Events are sent in the order they happen; a consumer that only wants the
/// answer can ignore everything but [`AgentEvent::FinalAnswer`].
#[derive(Debug, Clone, PartialEq)]
pub enum AgentEvent {
    /// A new model round began.
    StepStarted { step: usize, max_steps: usize },
    /// Model text streamed during the current round.
    Token { content: String },
    /// The model asked for a tool.
    ToolCall {
        step: usize,
        tool: String,
        input: String,
    },
    /// The tool (or the registry, for unknown names) answered.
    ToolResult {
        step: usize,
        tool: String,
        output: String,
        failed: bool,
    },
    /// The model reply fit neither the action nor the answer format.
    ParseError {
        step: usize,
        message: String,
        raw: String,
    },
    /// The run ended with an answer from the model.
    FinalAnswer { content: String },
    /// The run used every step without an answer.
    StepLimitReached { max_steps: usize },
}

pub type EventSender = mpsc::UnboundedSender<AgentEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<AgentEvent>;

/// Create the channel the agent reports progress on.
pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// Send if anyone is listening; a closed receiver is not an error.
pub(crate) fn emit(events: Option<&EventSender>, event: AgentEvent) {
    if let Some(tx) = events {
        let _ = tx.send(event);
    }
}
