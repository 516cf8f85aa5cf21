//! NewsAPI adapter.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::info;

use crate::assistant::tools::ToolFailure;

const DEFAULT_BASE_URL: &str = "https://newsapi.org";
const PROVIDER: &str = "NewsAPI";

/// One article reference.
#[derive(Debug, Clone, PartialEq)]
pub struct Headline {
    pub title: String,
    pub source: String,
    pub url: String,
    pub published_at: Option<DateTime<Utc>>,
}

/// Numbered list handed back to the model.
pub fn render_headlines(query: &str, headlines: &[Headline]) -> String {
    if headlines.is_empty() {
        return format!("No news found for '{}'", query);
    }
    let mut lines = vec!["Latest news:".to_string()];
    for (idx, h) in headlines.iter().enumerate() {
        lines.push(format!("{}. {} ({})\n   {}", idx + 1, h.title, h.source, h.url));
    }
    lines.join("\n")
}

#[derive(Deserialize, Debug)]
struct NewsResponse {
    status: String,
    #[serde(default)]
    articles: Vec<Article>,
    message: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct Article {
    title: Option<String>,
    source: Option<Source>,
    url: Option<String>,
    published_at: Option<String>,
}

#[derive(Deserialize, Debug)]
struct Source {
    name: Option<String>,
}

impl Article {
    fn into_headline(self) -> Option<Headline> {
        let title = self.title.filter(|t| !t.trim().is_empty())?;
        // NewsAPI marks deleted articles this way.
        if title == "[Removed]" {
            return None;
        }
        Some(Headline {
            title,
            source: self
                .source
                .and_then(|s| s.name)
                .unwrap_or_else(|| "Unknown source".to_string()),
            url: self.url.unwrap_or_default(),
            published_at: self
                .published_at
                .and_then(|p| DateTime::parse_from_rfc3339(&p).ok())
                .map(|d| d.with_timezone(&Utc)),
        })
    }
}

pub struct NewsClient {
    api_key: String,
    base_url: String,
    max_results: usize,
    http: reqwest::Client,
}

impl NewsClient {
    pub fn new(api_key: String, max_results: usize, timeout: Duration) -> Result<Self, reqwest::Error> {
        Self::with_base_url(api_key, DEFAULT_BASE_URL, max_results, timeout)
    }

    pub fn with_base_url(
        api_key: String,
        base_url: &str,
        max_results: usize,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            max_results: max_results.max(1),
            http,
        })
    }

    /// Headlines for `query`, most recent first, at most `max_results`.
    ///
    /// Without category or country this searches all articles in Spanish;
    /// with either it reads the top headlines for that filter.
    pub async fn search(
        &self,
        query: &str,
        category: Option<&str>,
        country: Option<&str>,
    ) -> Result<Vec<Headline>, ToolFailure> {
        let query = query.trim();
        let category = category.map(str::trim).filter(|c| !c.is_empty());
        let country = country.map(str::trim).filter(|c| !c.is_empty());
        info!("📰 News requested for: query={}, category={:?}, country={:?}", query, category, country);

        let page_size = self.max_results.to_string();
        let mut params: Vec<(&str, &str)> = vec![("pageSize", page_size.as_str())];
        if !query.is_empty() {
            params.push(("q", query));
        }

        let endpoint = if category.is_some() || country.is_some() {
            if let Some(category) = category {
                params.push(("category", category));
            }
            if let Some(country) = country {
                params.push(("country", country));
            }
            "top-headlines"
        } else {
            if query.is_empty() {
                return Err(ToolFailure::invalid_input("empty news query"));
            }
            params.push(("language", "es"));
            params.push(("sortBy", "publishedAt"));
            "everything"
        };

        let url = format!("{}/v2/{}", self.base_url, endpoint);
        let response = self
            .http
            .get(&url)
            .header("X-Api-Key", &self.api_key)
            .query(&params)
            .send()
            .await
            .map_err(|e| ToolFailure::from_transport(PROVIDER, e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ToolFailure::from_transport(PROVIDER, e))?;

        if !status.is_success() {
            return Err(ToolFailure::from_status(PROVIDER, status, &body));
        }

        let parsed: NewsResponse =
            serde_json::from_str(&body).map_err(|e| ToolFailure::malformed(format!("news body: {e}")))?;

        if parsed.status != "ok" {
            return Err(ToolFailure::malformed(format!(
                "news status '{}': {}",
                parsed.status,
                parsed.message.unwrap_or_default()
            )));
        }

        let mut headlines: Vec<Headline> = parsed
            .articles
            .into_iter()
            .filter_map(Article::into_headline)
            .collect();
        // Newest first; undated articles sink to the end. Stable, so ties keep provider order.
        headlines.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        headlines.truncate(self.max_results);

        info!("📰 {} headline(s) for '{}'", headlines.len(), query);
        Ok(headlines)
    }
}
