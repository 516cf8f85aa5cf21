//! Tools the model may call: weather lookup and news search.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::assistant::news::{Headline, NewsClient, render_headlines};
use crate::assistant::weather::{WeatherClient, WeatherReport};

pub const WEATHER_TOOL: &str = "get_weather";
pub const NEWS_TOOL: &str = "get_news";

/// Tool definition sent to the model as a function declaration.
#[derive(Debug, Clone, Serialize)]
pub struct Tool {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// A validated tool invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "tool")]
pub enum ToolRequest {
    /// Current weather for a place name.
    #[serde(rename = "get_weather")]
    Weather { location: String },

    /// Latest headlines for a topic.
    #[serde(rename = "get_news")]
    News {
        query: String,
        /// business, entertainment, general, health, science, sports, technology
        #[serde(default, skip_serializing_if = "Option::is_none")]
        category: Option<String>,
        /// Two-letter ISO 3166-1 country code
        #[serde(default, skip_serializing_if = "Option::is_none")]
        country: Option<String>,
    },
}

/// Why a model-requested call could not be turned into a `ToolRequest`.
#[derive(Debug, PartialEq)]
pub enum DispatchError {
    UnknownTool(String),
    InvalidArguments { tool: String, reason: String },
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownTool(name) => write!(f, "unsupported tool '{}'", name),
            Self::InvalidArguments { tool, reason } => {
                write!(f, "invalid arguments for '{}': {}", tool, reason)
            }
        }
    }
}

impl std::error::Error for DispatchError {}

impl ToolRequest {
    /// Build a request from a function call's name and JSON arguments.
    pub fn from_call(name: &str, args: &serde_json::Value) -> Result<Self, DispatchError> {
        if name != WEATHER_TOOL && name != NEWS_TOOL {
            return Err(DispatchError::UnknownTool(name.to_string()));
        }

        let mut tagged = match args {
            serde_json::Value::Object(map) => map.clone(),
            serde_json::Value::Null => serde_json::Map::new(),
            other => {
                return Err(DispatchError::InvalidArguments {
                    tool: name.to_string(),
                    reason: format!("expected an object, got {other}"),
                });
            }
        };
        tagged.insert("tool".to_string(), serde_json::Value::String(name.to_string()));

        serde_json::from_value(serde_json::Value::Object(tagged)).map_err(|e| DispatchError::InvalidArguments {
            tool: name.to_string(),
            reason: e.to_string(),
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            ToolRequest::Weather { .. } => WEATHER_TOOL,
            ToolRequest::News { .. } => NEWS_TOOL,
        }
    }
}

/// Successful tool payload.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    Weather(WeatherReport),
    News { query: String, headlines: Vec<Headline> },
}

impl ToolOutput {
    /// Text handed back to the model.
    pub fn render(&self) -> String {
        match self {
            ToolOutput::Weather(report) => report.render(),
            ToolOutput::News { query, headlines } => render_headlines(query, headlines),
        }
    }
}

/// Category of an adapter failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Provider unreachable, timed out, or refused the request.
    Network,
    RateLimited,
    /// Unknown location or unusable query.
    InvalidInput,
    /// 2xx response whose body could not be understood.
    MalformedResponse,
}

impl FailureKind {
    fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Network => "network",
            FailureKind::RateLimited => "rate limited",
            FailureKind::InvalidInput => "invalid input",
            FailureKind::MalformedResponse => "malformed response",
        }
    }
}

/// Typed failure returned at the adapter boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolFailure {
    pub kind: FailureKind,
    pub detail: String,
}

impl ToolFailure {
    pub fn new(kind: FailureKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    pub fn invalid_input(detail: impl Into<String>) -> Self {
        Self::new(FailureKind::InvalidInput, detail)
    }

    pub fn malformed(detail: impl Into<String>) -> Self {
        Self::new(FailureKind::MalformedResponse, detail)
    }

    /// Classify a transport-level error (connect, timeout, body read).
    ///
    /// The URL is stripped: query strings may carry API keys.
    pub fn from_transport(provider: &str, e: reqwest::Error) -> Self {
        let e = e.without_url();
        if e.is_timeout() {
            Self::new(FailureKind::Network, format!("{provider} timed out"))
        } else {
            Self::new(FailureKind::Network, format!("{provider} unreachable: {e}"))
        }
    }

    /// Classify a non-2xx response.
    pub fn from_status(provider: &str, status: reqwest::StatusCode, body: &str) -> Self {
        let preview: String = body.chars().take(200).collect();
        let detail = format!("{provider} returned {status}: {preview}");
        let kind = match status.as_u16() {
            429 => FailureKind::RateLimited,
            400 | 404 => FailureKind::InvalidInput,
            _ => FailureKind::Network,
        };
        Self::new(kind, detail)
    }
}

impl fmt::Display for ToolFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.as_str(), self.detail)
    }
}

impl std::error::Error for ToolFailure {}

/// Tagged success/failure of one invocation.
pub type ToolResult = Result<ToolOutput, ToolFailure>;

/// Executes validated tool requests.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn invoke(&self, request: &ToolRequest) -> ToolResult;
}

/// The production tool set, one adapter per request variant.
pub struct Toolbox {
    weather: WeatherClient,
    news: NewsClient,
}

impl Toolbox {
    pub fn new(weather: WeatherClient, news: NewsClient) -> Self {
        Self { weather, news }
    }
}

#[async_trait]
impl ToolExecutor for Toolbox {
    async fn invoke(&self, request: &ToolRequest) -> ToolResult {
        info!("🔧 Invoking {}: {:?}", request.name(), request);
        let result = match request {
            ToolRequest::Weather { location } => self.weather.current(location).await.map(ToolOutput::Weather),
            ToolRequest::News { query, category, country } => self
                .news
                .search(query, category.as_deref(), country.as_deref())
                .await
                .map(|headlines| ToolOutput::News {
                    query: query.clone(),
                    headlines,
                }),
        };
        if let Err(ref failure) = result {
            warn!("{} failed: {}", request.name(), failure);
        }
        result
    }
}

/// Function declarations for the model.
pub fn tool_definitions() -> Vec<Tool> {
    vec![
        Tool {
            name: WEATHER_TOOL.to_string(),
            description: "Get the current weather (metric units) in a specific location.".to_string(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "location": {
                        "type": "string",
                        "description": "City or place name, optionally with country (e.g. 'Barcelona' or 'Paris, FR')"
                    }
                },
                "required": ["location"]
            }),
        },
        Tool {
            name: NEWS_TOOL.to_string(),
            description: "Get the latest news on a topic, optionally restricted to a category and/or country.".to_string(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Search terms to look for in news articles"
                    },
                    "category": {
                        "type": "string",
                        "description": "News category",
                        "enum": ["business", "entertainment", "general", "health", "science", "sports", "technology"]
                    },
                    "country": {
                        "type": "string",
                        "description": "Two-letter ISO 3166-1 country code (e.g. 'us', 'mx', 'es')"
                    }
                },
                "required": ["query"]
            }),
        },
    ]
}
