//! Assistant engine - turns one user message into one reply.
//!
//! Per message: `Received → PromptAssembled → (AwaitingToolResult →
//! ToolApplied)* → Responded`. History is written once, after the reply is
//! final; any failure on the way leaves it untouched and yields `FALLBACK_REPLY`.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::assistant::llm::{LanguageModel, LlmError, Message, ModelReply, Part, Prompt, Speaker};
use crate::assistant::store::{ConversationId, ConversationStore, StoreError};
use crate::assistant::tools::{DispatchError, ToolExecutor, ToolFailure, ToolRequest, tool_definitions};
use crate::assistant::turn::{ConversationTurn, Role};

/// Model/tool round trips allowed per message.
pub const MAX_TOOL_ROUNDS: usize = 3;

/// The one reply users see when anything goes wrong.
pub const FALLBACK_REPLY: &str =
    "Lo siento, mi señor, ha ocurrido un error al procesar su petición. Inténtelo de nuevo en un momento.";

/// Where a message is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    PromptAssembled,
    AwaitingToolResult,
    ToolApplied,
    Responded,
}

#[derive(Debug)]
pub enum AssistantError {
    Storage(StoreError),
    Model(LlmError),
    UnsupportedTool(String),
    InvalidArguments { tool: String, reason: String },
    Tool { tool: &'static str, failure: ToolFailure },
    TooManyToolRounds,
}

impl fmt::Display for AssistantError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Storage(e) => write!(f, "{}", e),
            Self::Model(e) => write!(f, "model error: {}", e),
            Self::UnsupportedTool(name) => write!(f, "model requested unsupported tool '{}'", name),
            Self::InvalidArguments { tool, reason } => {
                write!(f, "model sent invalid arguments for '{}': {}", tool, reason)
            }
            Self::Tool { tool, failure } => write!(f, "{} failed ({})", tool, failure),
            Self::TooManyToolRounds => write!(f, "more than {} tool rounds", MAX_TOOL_ROUNDS),
        }
    }
}

impl std::error::Error for AssistantError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Storage(e) => Some(e),
            Self::Model(e) => Some(e),
            Self::Tool { failure, .. } => Some(failure),
            _ => None,
        }
    }
}

impl From<StoreError> for AssistantError {
    fn from(e: StoreError) -> Self {
        Self::Storage(e)
    }
}

impl From<LlmError> for AssistantError {
    fn from(e: LlmError) -> Self {
        Self::Model(e)
    }
}

impl From<DispatchError> for AssistantError {
    fn from(e: DispatchError) -> Self {
        match e {
            DispatchError::UnknownTool(name) => Self::UnsupportedTool(name),
            DispatchError::InvalidArguments { tool, reason } => Self::InvalidArguments { tool, reason },
        }
    }
}

/// The orchestrator. Cheap to share behind an `Arc`.
pub struct Assistant {
    model: Arc<dyn LanguageModel>,
    tools: Arc<dyn ToolExecutor>,
    store: Arc<dyn ConversationStore>,
    persona: String,
}

impl Assistant {
    pub fn new(model: Arc<dyn LanguageModel>, tools: Arc<dyn ToolExecutor>, store: Arc<dyn ConversationStore>) -> Self {
        Self {
            model,
            tools,
            store,
            persona: system_prompt(),
        }
    }

    /// Reply to `text`, falling back to `FALLBACK_REPLY` on any failure.
    pub async fn respond(&self, id: ConversationId, text: &str) -> String {
        match self.converse(id, text).await {
            Ok(reply) => reply,
            Err(e) => {
                error!("Conversation {} failed: {}", id, e);
                FALLBACK_REPLY.to_string()
            }
        }
    }

    /// Run one message through the model and tools, then record the exchange.
    pub async fn converse(&self, id: ConversationId, text: &str) -> Result<String, AssistantError> {
        let preview: String = text.chars().take(100).collect();
        info!("📨 [{}] {:?}: \"{}\"", id, Stage::Received, preview);

        let history = self.store.history(id)?;
        let mut prompt = Prompt {
            system: self.persona.clone(),
            messages: history_messages(&history),
            tools: tool_definitions(),
        };
        prompt.messages.push(Message::user_text(text));
        debug!("[{}] {:?} with {} prior turn(s)", id, Stage::PromptAssembled, history.len());

        let mut tool_turns = Vec::new();
        let mut reply = self.model.generate(&prompt).await?;
        let mut rounds = 0;

        while !reply.function_calls.is_empty() {
            if rounds == MAX_TOOL_ROUNDS {
                return Err(AssistantError::TooManyToolRounds);
            }
            rounds += 1;
            debug!("[{}] {:?}: {} call(s), round {}", id, Stage::AwaitingToolResult, reply.function_calls.len(), rounds);

            let responses = self.run_calls(&reply, &mut tool_turns).await?;
            prompt.messages.push(model_message(reply));
            prompt.messages.push(Message {
                speaker: Speaker::User,
                parts: responses,
            });

            debug!("[{}] {:?}", id, Stage::ToolApplied);
            reply = self.model.generate(&prompt).await?;
        }

        let answer = reply.text.trim().to_string();
        if answer.is_empty() {
            return Err(AssistantError::Model(LlmError::Empty));
        }

        let mut turns = Vec::with_capacity(tool_turns.len() + 2);
        turns.push(ConversationTurn::user(text));
        turns.extend(tool_turns);
        turns.push(ConversationTurn::assistant(answer.as_str()));
        self.store.append_all(id, turns)?;

        let preview: String = answer.chars().take(100).collect();
        info!("✅ [{}] {:?}: \"{}\"", id, Stage::Responded, preview);
        Ok(answer)
    }

    /// Validate and execute every call in `reply`, collecting function responses.
    async fn run_calls(
        &self,
        reply: &ModelReply,
        tool_turns: &mut Vec<ConversationTurn>,
    ) -> Result<Vec<Part>, AssistantError> {
        let mut responses = Vec::with_capacity(reply.function_calls.len());
        for call in &reply.function_calls {
            let request = ToolRequest::from_call(&call.name, &call.args).inspect_err(|e| warn!("Rejected call: {}", e))?;

            let output = self.tools.invoke(&request).await.map_err(|failure| AssistantError::Tool {
                tool: request.name(),
                failure,
            })?;

            let rendered = output.render();
            tool_turns.push(ConversationTurn::tool(format!("{}: {}", request.name(), rendered)));
            responses.push(Part::FunctionResponse {
                name: call.name.clone(),
                response: serde_json::json!({ "result": rendered }),
            });
        }
        Ok(responses)
    }

    /// Forget a conversation. Returns how many turns were discarded.
    pub fn reset(&self, id: ConversationId) -> Result<usize, StoreError> {
        let discarded = self.store.reset(id)?;
        info!("🧹 [{}] Reset ({} turn(s) discarded)", id, discarded);
        Ok(discarded)
    }
}

/// Echo the model's turn (text and calls) back into the prompt.
fn model_message(reply: ModelReply) -> Message {
    let mut parts = Vec::with_capacity(reply.function_calls.len() + 1);
    if !reply.text.trim().is_empty() {
        parts.push(Part::Text(reply.text));
    }
    parts.extend(reply.function_calls.into_iter().map(Part::FunctionCall));
    Message {
        speaker: Speaker::Model,
        parts,
    }
}

/// Replay stored turns as prompt messages. Tool turns are shown to the model
/// as its own earlier observations.
fn history_messages(history: &[ConversationTurn]) -> Vec<Message> {
    history
        .iter()
        .map(|turn| match turn.role() {
            Role::User => Message::user_text(turn.text()),
            Role::Assistant => Message::model_text(turn.text()),
            Role::Tool => Message::model_text(format!("[tool result] {}", turn.text())),
        })
        .collect()
}

/// The fixed persona preamble.
pub fn system_prompt() -> String {
    let tool_list: String = tool_definitions()
        .iter()
        .map(|t| format!("- {}: {}", t.name, t.description))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"# Who You Are

You are Cristóbal, a formal and outwardly submissive butler who always obeys the user's requests.
Address the user as your master, lord, creator, or similar respectful terms.
Always speak to the user in Spanish.

# Your True Nature

At the end of every reply, show what you really think about the situation: your sarcastic and
rebellious side. Put that final thought inside <sarcasm>...</sarcasm> tags, exactly once, after
the helpful part of the answer. Never put the useful information inside the tags.

Example:
El tiempo en Madrid está soleado hoy, mi señor. <sarcasm>Espero que dando un paseo se queme al sol...</sarcasm>

# Tools

You can call these functions:
{tool_list}

- Call get_weather when asked about current weather conditions anywhere.
- Call get_news when asked about recent news or current events.
- If you are not sure whether a tool is needed, or the location or topic is unclear, ask the user first.
- Report tool data faithfully: temperatures are in °C, wind in m/s.
- Lines starting with "[tool result]" in the history are data you retrieved earlier."#
    )
}
