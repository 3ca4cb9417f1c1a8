//! Academic paper lookup through the arXiv Atom API.

use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;

use super::{decode_entities, squash_whitespace, truncate_chars, Tool, ToolError};
use crate::config::ToolSettings;

const SERVICE: &str = "arxiv";

/// arXiv rejects overly long search queries.
const MAX_QUERY_LENGTH: usize = 300;

const NO_RESULT: &str = "No good Arxiv Result was found";

/// Search arXiv for papers and return their abstracts.
pub struct ArxivSearch {
    client: reqwest::Client,
    endpoint: String,
    settings: ToolSettings,
}

impl ArxivSearch {
    pub fn new(client: reqwest::Client, base_url: &str, settings: ToolSettings) -> Self {
        Self {
            client,
            endpoint: format!("{}/query", base_url.trim_end_matches('/')),
            settings,
        }
    }

    fn request_url(&self, query: &str) -> String {
        let query = truncate_chars(query, MAX_QUERY_LENGTH);
        if looks_like_arxiv_id(&query) {
            let ids = query
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(",");
            format!(
                "{}?id_list={}&start=0&max_results={}",
                self.endpoint,
                urlencoding::encode(&ids),
                self.settings.top_k_results
            )
        } else {
            format!(
                "{}?search_query={}&start=0&max_results={}",
                self.endpoint,
                urlencoding::encode(&query),
                self.settings.top_k_results
            )
        }
    }
}

#[async_trait]
impl Tool for ArxivSearch {
    fn name(&self) -> &str {
        "arxiv"
    }

    fn description(&self) -> &str {
        "A wrapper around Arxiv.org. Useful for when you need to answer questions about Physics, Mathematics, Computer Science, Quantitative Biology, Quantitative Finance, Statistics, Electrical Engineering, and Economics from scientific articles on arxiv.org. Input should be a search query."
    }

    async fn invoke(&self, query: &str) -> Result<String, ToolError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ToolError::InvalidInput("search query is empty".to_string()));
        }

        let url = self.request_url(query);
        tracing::debug!(%url, "arXiv query");

        let response = self
            .client
            .get(&url)
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

        let feed = response.text().await.map_err(ToolError::http(SERVICE))?;
        let papers = parse_feed(&feed)?;

        let docs: Vec<String> = papers
            .iter()
            .take(self.settings.top_k_results)
            .map(Paper::render)
            .collect();

        if docs.is_empty() {
            return Ok(NO_RESULT.to_string());
        }
        Ok(truncate_chars(&docs.join("\n\n"), self.settings.max_chars))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Paper {
    published: String,
    title: String,
    authors: Vec<String>,
    summary: String,
}

impl Paper {
    fn render(&self) -> String {
        format!(
            "Published: {}\nTitle: {}\nAuthors: {}\nSummary: {}",
            self.published,
            self.title,
            self.authors.join(", "),
            self.summary
        )
    }
}

fn entry_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<entry>(.*?)</entry>").expect("valid regex"))
}

fn author_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)<author>\s*<name>(.*?)</name>").expect("valid regex")
    })
}

/// New-style (`2301.01234v2`) or old-style (`hep-th/9901001`) identifiers.
fn looks_like_arxiv_id(query: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"^(\d{4}\.\d{4,5}(v\d+)?|[a-z\-]+(\.[A-Z]{2})?/\d{7}(v\d+)?)$")
            .expect("valid regex")
    });
    let mut ids = query.split_whitespace().peekable();
    ids.peek().is_some() && ids.all(|id| re.is_match(id))
}

/// Text content of the first `<tag>` element in `xml`.
fn element_text(xml: &str, tag: &str) -> Option<String> {
    let open = format!("<{}", tag);
    let close = format!("</{}>", tag);
    let start = xml.find(&open)?;
    let body_start = start + xml[start..].find('>')? + 1;
    let body_end = body_start + xml[body_start..].find(&close)?;
    Some(decode_entities(&squash_whitespace(&xml[body_start..body_end])))
}

fn parse_feed(feed: &str) -> Result<Vec<Paper>, ToolError> {
    let mut papers = Vec::new();

    for caps in entry_re().captures_iter(feed) {
        let entry = &caps[1];

        // The API reports bad queries as a single entry pointing at its errors page.
        if element_text(entry, "id").is_some_and(|id| id.contains("/api/errors")) {
            return Err(ToolError::Decode {
                service: SERVICE,
                message: element_text(entry, "summary").unwrap_or_else(|| "query rejected".to_string()),
            });
        }

        let Some(title) = element_text(entry, "title") else {
            continue;
        };

        let published = element_text(entry, "published")
            .map(|p| p.chars().take(10).collect())
            .unwrap_or_default();

        let authors = author_re()
            .captures_iter(entry)
            .map(|a| decode_entities(&squash_whitespace(&a[1])))
            .collect();

        papers.push(Paper {
            published,
            title,
            authors,
            summary: element_text(entry, "summary").unwrap_or_default(),
        });
    }

    Ok(papers)
}
