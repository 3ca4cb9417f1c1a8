//! Encyclopedia lookup through the MediaWiki action API.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::{truncate_chars, Tool, ToolError};
use crate::config::ToolSettings;

const SERVICE: &str = "wikipedia";

/// MediaWiki truncates search strings beyond this length.
const MAX_QUERY_LENGTH: usize = 300;

const NO_RESULT: &str = "No good Wikipedia Search Result was found";

#[derive(Deserialize)]
struct SearchResponse {
    query: Option<SearchQuery>,
}

#[derive(Deserialize)]
struct SearchQuery {
    #[serde(default)]
    search: Vec<SearchHit>,
}

#[derive(Deserialize)]
struct SearchHit {
    title: String,
}

#[derive(Deserialize)]
struct ExtractResponse {
    query: Option<ExtractQuery>,
}

#[derive(Deserialize)]
struct ExtractQuery {
    #[serde(default)]
    pages: HashMap<String, Page>,
}

#[derive(Deserialize)]
struct Page {
    title: Option<String>,
    extract: Option<String>,
    #[serde(default)]
    missing: Option<serde_json::Value>,
}

/// Search Wikipedia and return the introduction of the best matching pages.
pub struct WikipediaSearch {
    client: reqwest::Client,
    endpoint: String,
    settings: ToolSettings,
}

impl WikipediaSearch {
    pub fn new(client: reqwest::Client, endpoint: &str, settings: ToolSettings) -> Self {
        Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            settings,
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, ToolError> {
        let response = self
            .client
            .get(url)
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

        response.json().await.map_err(|e| ToolError::Decode {
            service: SERVICE,
            message: e.to_string(),
        })
    }

    async fn search_titles(&self, query: &str) -> Result<Vec<String>, ToolError> {
        let url = format!(
            "{}?action=query&list=search&format=json&srprop=&srlimit={}&srsearch={}",
            self.endpoint,
            self.settings.top_k_results,
            urlencoding::encode(&truncate_chars(query, MAX_QUERY_LENGTH))
        );
        let body: SearchResponse = self.get_json(&url).await?;
        Ok(body
            .query
            .map(|q| q.search.into_iter().map(|hit| hit.title).collect())
            .unwrap_or_default())
    }

    /// Plain-text introduction of one page, if it exists.
    async fn page_summary(&self, title: &str) -> Result<Option<(String, String)>, ToolError> {
        let url = format!(
            "{}?action=query&prop=extracts&exintro=1&explaintext=1&redirects=1&format=json&titles={}",
            self.endpoint,
            urlencoding::encode(title)
        );
        let body: ExtractResponse = self.get_json(&url).await?;

        let page = body
            .query
            .and_then(|q| q.pages.into_values().find(|p| p.missing.is_none()));

        Ok(page.and_then(|p| {
            let extract = p.extract?.trim().to_string();
            if extract.is_empty() {
                return None;
            }
            Some((p.title.unwrap_or_else(|| title.to_string()), extract))
        }))
    }
}

#[async_trait]
impl Tool for WikipediaSearch {
    fn name(&self) -> &str {
        "wikipedia"
    }

    fn description(&self) -> &str {
        "A wrapper around Wikipedia. Useful for when you need to answer general questions about people, places, companies, facts, historical events, or other subjects. Input should be a search query."
    }

    async fn invoke(&self, query: &str) -> Result<String, ToolError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ToolError::InvalidInput("search query is empty".to_string()));
        }

        let titles = self.search_titles(query).await?;
        tracing::debug!(query, hits = titles.len(), "Wikipedia search");

        let mut summaries = Vec::new();
        for title in titles.iter().take(self.settings.top_k_results) {
            if let Some((page_title, summary)) = self.page_summary(title).await? {
                summaries.push(format!("Page: {}\nSummary: {}", page_title, summary));
            }
        }

        if summaries.is_empty() {
            return Ok(NO_RESULT.to_string());
        }
        Ok(truncate_chars(&summaries.join("\n\n"), self.settings.max_chars))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_response_skips_missing_pages() {
        let body: ExtractResponse = serde_json::from_str(
            r#"{"query":{"pages":{"-1":{"title":"Nowhere","missing":""}}}}"#,
        )
        .expect("deserializes");
        let pages = body.query.expect("query").pages;
        assert!(pages.values().all(|p| p.missing.is_some()));
    }

    #[test]
    fn search_response_tolerates_missing_query() {
        let body: SearchResponse =
            serde_json::from_str(r#"{"batchcomplete":""}"#).expect("deserializes");
        assert!(body.query.is_none());
    }
}
