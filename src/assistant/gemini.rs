//! Gemini API client (generateContent with function calling).

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::assistant::llm::{FunctionCall, LanguageModel, LlmError, Message, ModelReply, Part, Prompt, Speaker};
use crate::assistant::tools::Tool;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

pub struct GeminiClient {
    api_key: String,
    model: String,
    temperature: f32,
    base_url: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<WireContent>,
    system_instruction: SystemInstruction,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<FunctionDeclarations<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct SystemInstruction {
    parts: Vec<WirePart>,
}

#[derive(Serialize)]
struct WireContent {
    role: &'static str,
    parts: Vec<WirePart>,
}

#[derive(Serialize, Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
struct WirePart {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function_call: Option<WireFunctionCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function_response: Option<WireFunctionResponse>,
}

#[derive(Serialize, Deserialize, Debug)]
struct WireFunctionCall {
    name: String,
    #[serde(default)]
    args: serde_json::Value,
}

#[derive(Serialize, Deserialize, Debug)]
struct WireFunctionResponse {
    name: String,
    response: serde_json::Value,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FunctionDeclarations<'a> {
    function_declarations: &'a [Tool],
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    candidates: Option<Vec<Candidate>>,
    error: Option<ApiError>,
    prompt_feedback: Option<serde_json::Value>,
}

#[derive(Deserialize, Debug)]
struct ApiError {
    message: String,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<WirePart>,
}

fn to_wire_part(part: &Part) -> WirePart {
    match part {
        Part::Text(text) => WirePart {
            text: Some(text.clone()),
            ..Default::default()
        },
        Part::FunctionCall(call) => WirePart {
            function_call: Some(WireFunctionCall {
                name: call.name.clone(),
                args: call.args.clone(),
            }),
            ..Default::default()
        },
        Part::FunctionResponse { name, response } => WirePart {
            function_response: Some(WireFunctionResponse {
                name: name.clone(),
                response: response.clone(),
            }),
            ..Default::default()
        },
    }
}

fn to_wire_content(message: &Message) -> WireContent {
    WireContent {
        role: match message.speaker {
            Speaker::User => "user",
            Speaker::Model => "model",
        },
        parts: message.parts.iter().map(to_wire_part).collect(),
    }
}

impl GeminiClient {
    pub fn new(api_key: String, model: String, temperature: f32, timeout: Duration) -> Result<Self, reqwest::Error> {
        Self::with_base_url(api_key, model, temperature, DEFAULT_BASE_URL, timeout)
    }

    pub fn with_base_url(
        api_key: String,
        model: String,
        temperature: f32,
        base_url: &str,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            api_key,
            model,
            temperature,
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }
}

#[async_trait]
impl LanguageModel for GeminiClient {
    async fn generate(&self, prompt: &Prompt) -> Result<ModelReply, LlmError> {
        let request = GenerateRequest {
            contents: prompt.messages.iter().map(to_wire_content).collect(),
            system_instruction: SystemInstruction {
                parts: vec![WirePart {
                    text: Some(prompt.system.clone()),
                    ..Default::default()
                }],
            },
            tools: if prompt.tools.is_empty() {
                Vec::new()
            } else {
                vec![FunctionDeclarations {
                    function_declarations: &prompt.tools,
                }]
            },
            generation_config: GenerationConfig {
                temperature: self.temperature,
            },
        };

        let url = format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model);
        debug!("Calling Gemini ({}) with {} message(s)", self.model, prompt.messages.len());

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::Http(e.without_url().to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| LlmError::Http(format!("Failed to read response: {e}")))?;

        debug!("Gemini response status: {status}");

        if !status.is_success() {
            return Err(LlmError::Api(format!("{status}: {body}")));
        }

        let parsed: GenerateResponse =
            serde_json::from_str(&body).map_err(|e| LlmError::Parse(e.to_string()))?;

        if let Some(error) = parsed.error {
            return Err(LlmError::Api(error.message));
        }

        let candidate = parsed
            .candidates
            .and_then(|c| c.into_iter().next())
            .ok_or_else(|| match parsed.prompt_feedback {
                Some(feedback) => LlmError::Api(format!("prompt blocked: {feedback}")),
                None => LlmError::Empty,
            })?;

        if let Some(ref reason) = candidate.finish_reason {
            debug!("Gemini finish reason: {reason}");
        }

        let mut reply = ModelReply::default();
        for part in candidate.content.map(|c| c.parts).unwrap_or_default() {
            if let Some(text) = part.text {
                reply.text.push_str(&text);
            }
            if let Some(call) = part.function_call {
                reply.function_calls.push(FunctionCall {
                    name: call.name,
                    args: call.args,
                });
            }
        }

        if reply.text.trim().is_empty() && reply.function_calls.is_empty() {
            return Err(LlmError::Empty);
        }
        Ok(reply)
    }
}
