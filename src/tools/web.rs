//! Web search through the Tavily search API.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::{truncate_chars, Tool, ToolError};
use crate::config::ToolSettings;

const SERVICE: &str = "tavily";

#[derive(Serialize)]
struct SearchRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    max_results: usize,
    search_depth: &'a str,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Deserialize)]
struct SearchResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
}

/// Search the web for current information.
pub struct WebSearch {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<SecretString>,
    settings: ToolSettings,
}

impl WebSearch {
    pub fn new(
        client: reqwest::Client,
        base_url: &str,
        api_key: Option<SecretString>,
        settings: ToolSettings,
    ) -> Self {
        Self {
            client,
            endpoint: format!("{}/search", base_url.trim_end_matches('/')),
            api_key,
            settings,
        }
    }
}

#[async_trait]
impl Tool for WebSearch {
    fn name(&self) -> &str {
        "tavily_search_results"
    }

    fn description(&self) -> &str {
        "A search engine optimized for comprehensive, accurate, and trusted results. Useful for when you need to answer questions about current events. Input should be a search query."
    }

    async fn invoke(&self, query: &str) -> Result<String, ToolError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ToolError::InvalidInput("search query is empty".to_string()));
        }

        let api_key = self
            .api_key
            .as_ref()
            .filter(|k| !k.expose_secret().trim().is_empty())
            .ok_or(ToolError::MissingCredential("Tavily API key"))?;

        tracing::debug!(query, max_results = self.settings.top_k_results, "Tavily search");

        let response = self
            .client
            .post(&self.endpoint)
            .json(&SearchRequest {
                api_key: api_key.expose_secret(),
                query,
                max_results: self.settings.top_k_results,
                search_depth: "advanced",
            })
            .send()
            .await
            .map_err(ToolError::http(SERVICE))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ToolError::Status {
                service: SERVICE,
                status: status.as_u16(),
                body: truncate_chars(&body, 200),
            });
        }

        let body: SearchResponse = response.json().await.map_err(|e| ToolError::Decode {
            service: SERVICE,
            message: e.to_string(),
        })?;

        let results = format_results(&body.results, self.settings.top_k_results);
        if results.is_empty() {
            Ok(format!("No search results found for: {}", query))
        } else {
            Ok(truncate_chars(&results, self.settings.max_chars))
        }
    }
}

/// Render at most `limit` results as labelled blocks.
fn format_results(results: &[SearchResult], limit: usize) -> String {
    results
        .iter()
        .take(limit)
        .map(|r| {
            let title = if r.title.trim().is_empty() {
                "(untitled)"
            } else {
                r.title.trim()
            };
            format!(
                "Title: {}\nURL: {}\nContent: {}",
                title,
                r.url.trim(),
                r.content.trim()
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(n: usize) -> SearchResult {
        SearchResult {
            title: format!("Result {}", n),
            url: format!("https://example.com/{}", n),
            content: format!("Snippet number {}", n),
        }
    }

    #[test]
    fn formats_only_up_to_the_limit() {
        let results: Vec<_> = (1..=8).map(result).collect();
        let text = format_results(&results, 3);
        assert_eq!(text.matches("Title: ").count(), 3);
        assert!(text.contains("URL: https://example.com/3"));
        assert!(!text.contains("Result 4"));
    }

    #[test]
    fn blank_titles_get_a_placeholder() {
        let results = vec![SearchResult {
            title: "  ".to_string(),
            url: "https://example.com".to_string(),
            content: "body".to_string(),
        }];
        assert!(format_results(&results, 5).starts_with("Title: (untitled)\n"));
    }

    #[tokio::test]
    async fn missing_key_fails_without_a_request() {
        let tool = WebSearch::new(
            reqwest::Client::new(),
            "http://127.0.0.1:9",
            Some(SecretString::new("   ".into())),
            ToolSettings::new(5, 100),
        );
        let err = tool.invoke("rust").await.expect_err("blank key must fail");
        assert!(matches!(err, ToolError::MissingCredential(_)));
    }
}
