//! # research-chat
//!
//! A terminal research assistant that answers free-form questions with a
//! language-model agent backed by three lookup tools.
//!
//! This library provides:
//! - A ReAct agent loop driven by a Groq-hosted chat model
//! - Web search (Tavily), arXiv and Wikipedia lookup tools
//! - A session type that gates every agent call on the user's API keys
//! - A terminal UI that streams the agent's progress
//!
//! ## Architecture
//!
//! The agent follows the "tools in a loop" pattern:
//! 1. Receive a question from the chat session
//! 2. Build a prompt describing the available tools
//! 3. Call the model, parse its reply, run any requested tool
//! 4. Feed the observation back, repeat until a final answer or the step limit
//!
//! ## Example
//!
//! ```rust,ignore
//! use research_chat::{config::Config, session::ChatSession};
//!
//! let mut session = ChatSession::with_config(Config::from_env()?);
//! session.set_groq_api_key(groq_key);
//! session.set_tavily_api_key(tavily_key);
//! let outcome = session.submit("What is the capital of France?", None).await;
//! ```

pub mod agent;
pub mod config;
pub mod conversation;
pub mod llm;
pub mod session;
pub mod tools;
pub mod ui;

pub use config::Config;
