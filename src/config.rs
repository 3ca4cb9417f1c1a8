//! Configuration management for research-chat.
//!
//! Configuration can be set via environment variables:
//! - `DEFAULT_MODEL` - Optional. Groq model identifier. Defaults to `llama-3.1-8b-instant`.
//! - `LLM_STREAMING` - Optional. Stream model output token by token. Defaults to `true`.
//! - `LLM_TEMPERATURE` - Optional. Sampling temperature. Defaults to `0.7`.
//! - `MAX_ITERATIONS` - Optional. Maximum agent loop iterations per prompt. Defaults to `5`.
//! - `HANDLE_PARSING_ERRORS` - Optional. Feed malformed model output back as an observation. Defaults to `true`.
//! - `HTTP_TIMEOUT_SECS` - Optional. Timeout for every outbound request. Defaults to `30`.
//! - `GROQ_BASE_URL`, `TAVILY_BASE_URL`, `ARXIV_BASE_URL`, `WIKIPEDIA_BASE_URL` - Optional endpoint overrides.
//! - `TAVILY_MAX_RESULTS` / `TAVILY_MAX_CHARS` - Optional. Web search caps. Defaults to `5` / `4000`.
//! - `ARXIV_TOP_K_RESULTS` / `ARXIV_MAX_CHARS` - Optional. arXiv caps. Defaults to `1` / `2000`.
//! - `WIKIPEDIA_TOP_K_RESULTS` / `WIKIPEDIA_MAX_CHARS` - Optional. Wikipedia caps. Defaults to `1` / `2000`.
//!
//! API keys are not read from the environment; the terminal UI
//! asks for them at startup.

use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_MODEL: &str = "llama-3.1-8b-instant";
pub const DEFAULT_GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_TAVILY_BASE_URL: &str = "https://api.tavily.com";
pub const DEFAULT_ARXIV_BASE_URL: &str = "https://export.arxiv.org/api";
pub const DEFAULT_WIKIPEDIA_BASE_URL: &str = "https://en.wikipedia.org/w/api.php";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Per-adapter result caps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolSettings {
    /// Maximum number of underlying results aggregated into one answer
    pub top_k_results: usize,

    /// Maximum length of the returned text, in characters
    pub max_chars: usize,
}

impl ToolSettings {
    pub fn new(top_k_results: usize, max_chars: usize) -> Self {
        Self {
            top_k_results,
            max_chars,
        }
    }
}

/// Caps for each of the three lookup tools.
#[derive(Debug, Clone)]
pub struct ToolsConfig {
    pub web_search: ToolSettings,
    pub arxiv: ToolSettings,
    pub wikipedia: ToolSettings,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            web_search: ToolSettings::new(5, 4000),
            arxiv: ToolSettings::new(1, 2000),
            wikipedia: ToolSettings::new(1, 2000),
        }
    }
}

/// External service base URLs.
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub groq: String,
    pub tavily: String,
    pub arxiv: String,
    pub wikipedia: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            groq: DEFAULT_GROQ_BASE_URL.to_string(),
            tavily: DEFAULT_TAVILY_BASE_URL.to_string(),
            arxiv: DEFAULT_ARXIV_BASE_URL.to_string(),
            wikipedia: DEFAULT_WIKIPEDIA_BASE_URL.to_string(),
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Groq model identifier
    pub model: String,

    /// Whether model output is requested as an SSE stream
    pub streaming: bool,

    /// Sampling temperature sent with every completion
    pub temperature: f32,

    /// Maximum iterations for the agent loop
    pub max_iterations: usize,

    /// Treat unparsable model output as a recoverable observation
    pub handle_parsing_errors: bool,

    /// Timeout applied to every HTTP client
    pub http_timeout: Duration,

    pub endpoints: Endpoints,

    pub tools: ToolsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            streaming: true,
            temperature: 0.7,
            max_iterations: 5,
            handle_parsing_errors: true,
            http_timeout: Duration::from_secs(30),
            endpoints: Endpoints::default(),
            tools: ToolsConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if a variable is set but cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let model = lookup("DEFAULT_MODEL")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(defaults.model);

        let streaming = lookup("LLM_STREAMING")
            .map(|v| parse_bool(&v).map_err(|e| ConfigError::InvalidValue("LLM_STREAMING".to_string(), e)))
            .transpose()?
            .unwrap_or(defaults.streaming);

        let temperature: f32 = parse_var(&lookup, "LLM_TEMPERATURE")?.unwrap_or(defaults.temperature);
        if !(0.0..=2.0).contains(&temperature) {
            return Err(ConfigError::InvalidValue(
                "LLM_TEMPERATURE".to_string(),
                format!("expected a value between 0 and 2, got {}", temperature),
            ));
        }

        let max_iterations = parse_positive(&lookup, "MAX_ITERATIONS", defaults.max_iterations)?;

        let handle_parsing_errors = lookup("HANDLE_PARSING_ERRORS")
            .map(|v| {
                parse_bool(&v)
                    .map_err(|e| ConfigError::InvalidValue("HANDLE_PARSING_ERRORS".to_string(), e))
            })
            .transpose()?
            .unwrap_or(defaults.handle_parsing_errors);

        let http_timeout = Duration::from_secs(parse_positive(
            &lookup,
            "HTTP_TIMEOUT_SECS",
            defaults.http_timeout.as_secs() as usize,
        )? as u64);

        let endpoints = Endpoints {
            groq: parse_url(&lookup, "GROQ_BASE_URL")?.unwrap_or(defaults.endpoints.groq),
            tavily: parse_url(&lookup, "TAVILY_BASE_URL")?.unwrap_or(defaults.endpoints.tavily),
            arxiv: parse_url(&lookup, "ARXIV_BASE_URL")?.unwrap_or(defaults.endpoints.arxiv),
            wikipedia: parse_url(&lookup, "WIKIPEDIA_BASE_URL")?
                .unwrap_or(defaults.endpoints.wikipedia),
        };

        let tools = ToolsConfig {
            web_search: ToolSettings::new(
                parse_positive(&lookup, "TAVILY_MAX_RESULTS", defaults.tools.web_search.top_k_results)?,
                parse_positive(&lookup, "TAVILY_MAX_CHARS", defaults.tools.web_search.max_chars)?,
            ),
            arxiv: ToolSettings::new(
                parse_positive(&lookup, "ARXIV_TOP_K_RESULTS", defaults.tools.arxiv.top_k_results)?,
                parse_positive(&lookup, "ARXIV_MAX_CHARS", defaults.tools.arxiv.max_chars)?,
            ),
            wikipedia: ToolSettings::new(
                parse_positive(&lookup, "WIKIPEDIA_TOP_K_RESULTS", defaults.tools.wikipedia.top_k_results)?,
                parse_positive(&lookup, "WIKIPEDIA_MAX_CHARS", defaults.tools.wikipedia.max_chars)?,
            ),
        };

        Ok(Self {
            model,
            streaming,
            temperature,
            max_iterations,
            handle_parsing_errors,
            http_timeout,
            endpoints,
            tools,
        })
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| {
            v.trim()
                .parse::<T>()
                .map_err(|e| ConfigError::InvalidValue(key.to_string(), format!("{}", e)))
        })
        .transpose()
}

/// Counts and caps must be at least one.
fn parse_positive<F>(lookup: &F, key: &str, default: usize) -> Result<usize, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match parse_var::<usize, _>(lookup, key)? {
        Some(0) => Err(ConfigError::InvalidValue(
            key.to_string(),
            "must be at least 1".to_string(),
        )),
        Some(v) => Ok(v),
        None => Ok(default),
    }
}

fn parse_url<F>(lookup: &F, key: &str) -> Result<Option<String>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| {
            let v = v.trim().trim_end_matches('/').to_string();
            url::Url::parse(&v)
                .map(|_| v)
                .map_err(|e| ConfigError::InvalidValue(key.to_string(), format!("{}", e)))
        })
        .transpose()
}

fn parse_bool(value: &str) -> Result<bool, String> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "t" | "yes" | "y" | "on" => Ok(true),
        "0" | "false" | "f" | "no" | "n" | "off" => Ok(false),
        other => Err(format!("expected boolean-like value, got: {}", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let config = Config::from_lookup(|_| None).expect("defaults load");
        assert_eq!(config.model, "llama-3.1-8b-instant");
        assert_eq!(config.max_iterations, 5);
        assert!(config.streaming);
        assert!(config.handle_parsing_errors);
        assert_eq!(config.tools.web_search, ToolSettings::new(5, 4000));
        assert_eq!(config.tools.arxiv, ToolSettings::new(1, 2000));
        assert_eq!(config.tools.wikipedia, ToolSettings::new(1, 2000));
        assert_eq!(config.endpoints.groq, DEFAULT_GROQ_BASE_URL);
    }

    #[test]
    fn overrides_are_applied() {
        let config = Config::from_lookup(lookup_from(&[
            ("MAX_ITERATIONS", "8"),
            ("LLM_STREAMING", "off"),
            ("ARXIV_TOP_K_RESULTS", "3"),
            ("GROQ_BASE_URL", "http://localhost:9000/v1/"),
            ("HTTP_TIMEOUT_SECS", "5"),
        ]))
        .expect("config loads");

        assert_eq!(config.max_iterations, 8);
        assert!(!config.streaming);
        assert_eq!(config.tools.arxiv.top_k_results, 3);
        assert_eq!(config.endpoints.groq, "http://localhost:9000/v1");
        assert_eq!(config.http_timeout, Duration::from_secs(5));
    }

    #[test]
    fn zero_caps_are_rejected() {
        let err = Config::from_lookup(lookup_from(&[("WIKIPEDIA_MAX_CHARS", "0")]))
            .expect_err("zero cap must fail");
        assert!(err.to_string().contains("WIKIPEDIA_MAX_CHARS"));

        // A zero timeout would fail every request immediately.
        let err = Config::from_lookup(lookup_from(&[("HTTP_TIMEOUT_SECS", "0")]))
            .expect_err("zero timeout must fail");
        assert!(err.to_string().contains("HTTP_TIMEOUT_SECS"));
    }

    #[test]
    fn malformed_values_are_rejected() {
        assert!(Config::from_lookup(lookup_from(&[("MAX_ITERATIONS", "many")])).is_err());
        assert!(Config::from_lookup(lookup_from(&[("LLM_STREAMING", "maybe")])).is_err());
        assert!(Config::from_lookup(lookup_from(&[("LLM_TEMPERATURE", "3.5")])).is_err());
        assert!(Config::from_lookup(lookup_from(&[("TAVILY_BASE_URL", "not a url")])).is_err());
    }

    #[test]
    fn parse_bool_accepts_common_spellings() {
        assert_eq!(parse_bool("Yes"), Ok(true));
        assert_eq!(parse_bool(" 0 "), Ok(false));
        assert!(parse_bool("sometimes").is_err());
    }
}
