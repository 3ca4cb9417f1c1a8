//! Terminal chat surface.
//!
//! Renders the conversation, collects the two API keys with masked input and
//! runs one agent call per line of input while printing its progress.

mod input;

use std::io::{self, IsTerminal, Write};

use crossterm::cursor::MoveTo;
use crossterm::execute;
use crossterm::style::Stylize;
use crossterm::terminal::{Clear, ClearType};
use tokio::task;

use crate::agent::{event_channel, AgentEvent, EventReceiver};
use crate::config::Config;
use crate::conversation::{Conversation, Role, Turn};
use crate::session::{ChatSession, SubmitOutcome};
use crate::tools::truncate_chars;

pub const TITLE: &str = "🔎 AI Assistant with Groq + Tavily + Arxiv + Wikipedia";

const INPUT_LABEL: &str = "Ask me anything... › ";

/// Tool output shown inline while the agent runs.
const RESULT_PREVIEW_CHARS: usize = 160;

/// One line of user input, interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Quit,
    Keys,
    Prompt(String),
}

impl Command {
    pub fn parse(line: &str) -> Self {
        match line.trim() {
            "/quit" | "/exit" => Self::Quit,
            "/keys" => Self::Keys,
            other => Self::Prompt(other.to_string()),
        }
    }
}

/// Run the interactive loop until the user quits or input ends.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let mut session = ChatSession::with_config(config);
    tracing::info!(session_id = %session.id(), "Session started");

    render(session.conversation())?;
    if !prompt_credentials(&mut session).await? {
        return Ok(());
    }
    render(session.conversation())?;

    loop {
        let Some(line) = read_line(INPUT_LABEL).await? else {
            break;
        };

        let prompt = match Command::parse(&line) {
            Command::Quit => break,
            Command::Keys => {
                if !prompt_credentials(&mut session).await? {
                    break;
                }
                render(session.conversation())?;
                continue;
            }
            Command::Prompt(prompt) => prompt,
        };

        let accepted = match session.accept(&prompt) {
            Ok(accepted) => accepted,
            Err(SubmitOutcome::Warning(missing)) => {
                println!("{}", format!("⚠ {}", missing.warning()).yellow());
                continue;
            }
            Err(_) => continue,
        };
        // Show the question before the agent starts working on it.
        render(session.conversation())?;

        let (tx, rx) = event_channel();
        let (_, tool_calls) = tokio::join!(session.answer(accepted, Some(tx)), print_events(rx));

        render(session.conversation())?;
        if !tool_calls.is_empty() {
            println!("{}", "Tools used:".dark_grey());
            for call in &tool_calls {
                println!("{}", format!("  ↳ {}", call).dark_grey());
            }
            println!();
        }
    }

    tracing::info!(session_id = %session.id(), turns = session.conversation().len(), "Session ended");
    Ok(())
}

/// Ask for both keys. `false` if the user aborted.
async fn prompt_credentials(session: &mut ChatSession) -> io::Result<bool> {
    println!("{}", "🔐 API Keys".bold());

    let Some(groq) = read_secret("Groq API Key: ").await? else {
        return Ok(false);
    };
    session.set_groq_api_key(groq);

    let Some(tavily) = read_secret("Tavily API Key: ").await? else {
        return Ok(false);
    };
    session.set_tavily_api_key(tavily);

    if let Some(missing) = session.credentials().missing() {
        println!(
            "{}",
            format!("⚠ {} (use /keys to enter it later)", missing.warning()).yellow()
        );
    }
    Ok(true)
}

async fn read_line(label: &'static str) -> io::Result<Option<String>> {
    task::spawn_blocking(move || input::read_line(label))
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?
}

async fn read_secret(label: &'static str) -> io::Result<Option<String>> {
    task::spawn_blocking(move || input::read_secret(label))
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?
}

/// Print agent progress as it arrives; returns a summary of each tool call.
async fn print_events(mut rx: EventReceiver) -> Vec<String> {
    let mut tool_calls = Vec::new();
    let mut out = io::stdout();

    while let Some(event) = rx.recv().await {
        if let AgentEvent::ToolCall { tool, input, .. } = &event {
            tool_calls.push(format!("{}: {}", tool, input));
        }

        let Some(text) = format_event(&event) else {
            continue;
        };
        let styled = match &event {
            AgentEvent::Token { .. } => text.dark_grey(),
            AgentEvent::ToolResult { failed: true, .. } | AgentEvent::ParseError { .. } => {
                text.red()
            }
            AgentEvent::StepLimitReached { .. } => text.yellow(),
            _ => text.cyan(),
        };
        let _ = write!(out, "{}", styled);
        let _ = out.flush();
    }

    tool_calls
}

/// Plain-text rendering of a progress event, if it is shown at all.
pub fn format_event(event: &AgentEvent) -> Option<String> {
    match event {
        AgentEvent::StepStarted { step, max_steps } => {
            Some(format!("\n── step {}/{} ──\n", step, max_steps))
        }
        AgentEvent::Token { content } => Some(content.clone()),
        AgentEvent::ToolCall { tool, input, .. } => {
            Some(format!("\n🔧 {} ← {}\n", tool, input))
        }
        AgentEvent::ToolResult { output, .. } => {
            let flat = output.split_whitespace().collect::<Vec<_>>().join(" ");
            let preview = truncate_chars(&flat, RESULT_PREVIEW_CHARS);
            Some(format!("   → {}\n", preview))
        }
        AgentEvent::ParseError { message, .. } => Some(format!("\n⚠ {}\n", message)),
        AgentEvent::FinalAnswer { .. } => None,
        AgentEvent::StepLimitReached { max_steps } => {
            Some(format!("\n⚠ step limit reached ({} steps)\n", max_steps))
        }
    }
}

/// Plain-text rendering of one turn; continuation lines are indented.
pub fn format_turn(turn: &Turn) -> String {
    let label = match turn.role() {
        Role::User => "You",
        Role::Assistant => "Assistant",
    };
    let body = turn.content().lines().collect::<Vec<_>>().join("\n  ");
    format!("{}: {}", label, body)
}

/// Clear the screen (on a terminal) and print the whole conversation.
fn render(conversation: &Conversation) -> io::Result<()> {
    let mut out = io::stdout();
    if out.is_terminal() {
        execute!(out, Clear(ClearType::All), MoveTo(0, 0))?;
    }

    writeln!(out, "{}\n", TITLE.bold())?;
    for turn in conversation.all() {
        let text = format_turn(turn);
        match turn.role() {
            Role::User => writeln!(out, "{}\n", text.green())?,
            Role::Assistant => writeln!(out, "{}\n", text)?,
        }
    }
    out.flush()
}
