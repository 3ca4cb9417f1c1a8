//! Classification of model replies in the ReAct text format.

use std::sync::OnceLock;

use regex::Regex;

pub const FINAL_ANSWER_MARKER: &str = "Final Answer:";

/// What the model asked for in one reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentDirective {
    ToolCall {
        thought: String,
        tool: String,
        input: String,
    },
    FinalAnswer {
        thought: String,
        answer: String,
    },
    Unparsable {
        failure: ParseFailure,
    },
}

/// Why a reply could not be classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseFailure {
    MissingAction,
    MissingActionInput,
    ActionAndFinalAnswer,
}

impl ParseFailure {
    /// Why the reply was rejected.
    pub fn message(&self) -> &'static str {
        match self {
            Self::MissingAction => "Invalid Format: Missing 'Action:' after 'Thought:'",
            Self::MissingActionInput => {
                "Invalid Format: Missing 'Action Input:' after 'Action:'"
            }
            Self::ActionAndFinalAnswer => {
                "Parsing LLM output produced both a final answer and a parse-able action"
            }
        }
    }

    /// Text fed back to the model in place of a tool result.
    ///
    /// Format slips get the specific hint; a reply mixing an action with an
    /// answer only gets a generic retry prompt.
    pub fn observation(&self) -> &'static str {
        match self {
            Self::MissingAction | Self::MissingActionInput => self.message(),
            Self::ActionAndFinalAnswer => "Invalid or incomplete response",
        }
    }
}

impl std::fmt::Display for ParseFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

fn action_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)Action\s*\d*\s*:[\s]*(.*?)[\s]*Action\s*\d*\s*Input\s*\d*\s*:[\s]*(.*)")
            .expect("valid regex")
    })
}

fn bare_action_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)Action\s*\d*\s*:").expect("valid regex"))
}

/// Classify a model reply.
pub fn parse_reply(text: &str) -> AgentDirective {
    let has_answer = text.contains(FINAL_ANSWER_MARKER);

    if let Some(caps) = action_re().captures(text) {
        if has_answer {
            return AgentDirective::Unparsable {
                failure: ParseFailure::ActionAndFinalAnswer,
            };
        }

        let start = caps.get(0).map(|m| m.start()).unwrap_or(0);
        return AgentDirective::ToolCall {
            thought: text[..start].trim().to_string(),
            tool: caps[1].trim().to_string(),
            input: clean_input(&caps[2]),
        };
    }

    if has_answer {
        let idx = text.rfind(FINAL_ANSWER_MARKER).unwrap_or(0);
        return AgentDirective::FinalAnswer {
            thought: text[..idx].trim().to_string(),
            answer: text[idx + FINAL_ANSWER_MARKER.len()..].trim().to_string(),
        };
    }

    let failure = if bare_action_re().is_match(text) {
        ParseFailure::MissingActionInput
    } else {
        ParseFailure::MissingAction
    };
    AgentDirective::Unparsable { failure }
}

/// Trim whitespace and wrapping quotes; drop anything the model
/// hallucinated past the observation marker.
fn clean_input(raw: &str) -> String {
    let raw = raw.split("\nObservation").next().unwrap_or(raw);
    raw.trim().trim_matches('"').trim().to_string()
}
