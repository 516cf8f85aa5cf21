//! Fakes shared by the assistant tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::assistant::llm::{LanguageModel, LlmError, ModelReply, Prompt};
use crate::assistant::store::{ConversationId, ConversationStore, StoreError};
use crate::assistant::tools::{ToolExecutor, ToolFailure, ToolRequest, ToolResult};
use crate::assistant::turn::ConversationTurn;
use crate::assistant::weather::WeatherReport;

/// A model that plays back canned replies and records every prompt.
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Result<ModelReply, LlmError>>>,
    prompts: Mutex<Vec<Prompt>>,
}

impl ScriptedModel {
    pub fn new(replies: Vec<Result<ModelReply, LlmError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<Prompt> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn generate(&self, prompt: &Prompt) -> Result<ModelReply, LlmError> {
        self.prompts.lock().unwrap().push(prompt.clone());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::Api("script exhausted".to_string())))
    }
}

/// A tool executor that always returns the same result.
pub struct StaticTools {
    result: ToolResult,
    calls: AtomicUsize,
}

impl StaticTools {
    pub fn new(result: ToolResult) -> Self {
        Self {
            result,
            calls: AtomicUsize::new(0),
        }
    }

    /// For tests where the model never reaches a tool.
    pub fn unused() -> Self {
        Self::new(Err(ToolFailure::invalid_input("no tool expected in this test")))
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ToolExecutor for StaticTools {
    async fn invoke(&self, _request: &ToolRequest) -> ToolResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.clone()
    }
}

pub fn weather_report(place: &str) -> WeatherReport {
    WeatherReport {
        place: place.to_string(),
        country: Some("ES".to_string()),
        condition: "Cielo claro".to_string(),
        temperature_c: 30.0,
        feels_like_c: 31.5,
        humidity_pct: 20.0,
        wind_speed_ms: Some(2.0),
    }
}

/// A store whose backing medium is always gone.
pub struct UnavailableStore;

fn gone() -> StoreError {
    StoreError::Unavailable("disk I/O error".to_string())
}

impl ConversationStore for UnavailableStore {
    fn append(&self, _id: ConversationId, _turn: ConversationTurn) -> Result<(), StoreError> {
        Err(gone())
    }

    fn history(&self, _id: ConversationId) -> Result<Vec<ConversationTurn>, StoreError> {
        Err(gone())
    }

    fn reset(&self, _id: ConversationId) -> Result<usize, StoreError> {
        Err(gone())
    }

    fn reset_all(&self) -> Result<usize, StoreError> {
        Err(gone())
    }
}
