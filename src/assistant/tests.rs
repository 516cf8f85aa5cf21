//! End-to-end tests for the assistant: real adapters and Gemini client against
//! stubbed HTTP providers, with both store backends.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::llm::{LanguageModel, LlmError, ModelReply, Part, Prompt};
use super::testing::ScriptedModel;
use super::turn::Role;
use super::*;

/// Asks for Barcelona's weather, then answers with whatever the tool returned.
struct WeatherEchoModel;

#[async_trait]
impl LanguageModel for WeatherEchoModel {
    async fn generate(&self, prompt: &Prompt) -> Result<ModelReply, LlmError> {
        let observation = prompt
            .messages
            .last()
            .and_then(|m| m.parts.first())
            .and_then(|p| match p {
                Part::FunctionResponse { response, .. } => response["result"].as_str().map(str::to_string),
                _ => None,
            });

        Ok(match observation {
            Some(result) => ModelReply::text(format!(
                "Como ordene, mi señor. {} <sarcasm>Ni que fuera a salir de casa.</sarcasm>",
                result
            )),
            None => ModelReply::call("get_weather", json!({ "location": "Barcelona" })),
        })
    }
}

async fn mount_barcelona(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/geo/1.0/direct"))
        .and(query_param("q", "Barcelona"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "name": "Barcelona", "lat": 41.3874, "lon": 2.1686, "country": "ES" }
        ])))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "Barcelona",
            "weather": [{ "id": 800, "main": "Clear", "description": "cielo claro" }],
            "main": { "temp": 21.5, "feels_like": 21.2, "humidity": 64 },
            "wind": { "speed": 3.6 },
            "sys": { "country": "ES" }
        })))
        .mount(server)
        .await;
}

fn toolbox(server: &MockServer, timeout: Duration) -> Arc<Toolbox> {
    Arc::new(Toolbox::new(
        WeatherClient::with_base_url("owm-key".to_string(), &server.uri(), timeout).unwrap(),
        NewsClient::with_base_url("news-key".to_string(), &server.uri(), 5, timeout).unwrap(),
    ))
}

// =============================================================================
// WEATHER SCENARIO
// =============================================================================

mod weather_scenario {
    use super::*;

    async fn run(store: Arc<dyn ConversationStore>) {
        let server = MockServer::start().await;
        mount_barcelona(&server).await;

        let assistant = Assistant::new(
            Arc::new(WeatherEchoModel),
            toolbox(&server, Duration::from_secs(5)),
            store.clone(),
        );

        let reply = assistant.respond(42, "¿Cuál es el clima en Barcelona hoy?").await;
        assert!(reply.contains("21.5"), "reply: {reply}");
        assert!(reply.contains("Cielo claro"), "reply: {reply}");

        let history = store.history(42).unwrap();
        let roles: Vec<Role> = history.iter().map(|t| t.role()).collect();
        assert_eq!(roles, vec![Role::User, Role::Tool, Role::Assistant]);
        assert_eq!(history[0].text(), "¿Cuál es el clima en Barcelona hoy?");
        assert!(history[1].text().starts_with("get_weather: Weather in Barcelona, ES"));
        assert_eq!(history[2].text(), reply);
    }

    #[tokio::test]
    async fn test_barcelona_with_memory_store() {
        run(Arc::new(MemoryStore::new())).await;
    }

    #[tokio::test]
    async fn test_barcelona_with_sqlite_store() {
        run(Arc::new(SqliteStore::in_memory().unwrap())).await;
    }

    #[tokio::test]
    async fn test_barcelona_through_gemini() {
        let server = MockServer::start().await;
        mount_barcelona(&server).await;

        // First call asks for the tool, every later call answers.
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.0-flash:generateContent"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{
                    "content": { "role": "model", "parts": [
                        { "functionCall": { "name": "get_weather", "args": { "location": "Barcelona" } } }
                    ]},
                    "finishReason": "STOP"
                }]
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.0-flash:generateContent"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{
                    "content": { "role": "model", "parts": [
                        { "text": "En Barcelona hay cielo claro y 21.5°C, mi señor. <sarcasm>Disfrute.</sarcasm>" }
                    ]},
                    "finishReason": "STOP"
                }]
            })))
            .mount(&server)
            .await;

        let store = Arc::new(MemoryStore::new());
        let gemini = GeminiClient::with_base_url(
            "gemini-key".to_string(),
            gemini::DEFAULT_MODEL.to_string(),
            0.1,
            &server.uri(),
            Duration::from_secs(5),
        )
        .unwrap();
        let assistant = Assistant::new(Arc::new(gemini), toolbox(&server, Duration::from_secs(5)), store.clone());

        let reply = assistant.respond(7, "¿Cuál es el clima en Barcelona hoy?").await;
        assert!(reply.contains("21.5"));
        assert_eq!(store.history(7).unwrap().len(), 3);

        let requests = server.received_requests().await.unwrap();
        let followup = requests
            .iter()
            .filter(|r| r.url.path().ends_with(":generateContent"))
            .nth(1)
            .expect("second Gemini call");
        let body: serde_json::Value = serde_json::from_slice(&followup.body).unwrap();
        let contents = body["contents"].as_array().unwrap();
        assert_eq!(contents.len(), 3);
        assert_eq!(contents[1]["role"], "model");
        let result = contents[2]["parts"][0]["functionResponse"]["response"]["result"]
            .as_str()
            .unwrap();
        assert!(result.contains("21.5°C"));
    }
}

// =============================================================================
// FAILURE SCENARIOS
// =============================================================================

mod failures {
    use super::*;

    #[tokio::test]
    async fn test_tool_timeout_falls_back_without_history() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/geo/1.0/direct"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!([{ "name": "Barcelona", "lat": 41.38, "lon": 2.17 }]))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let store = Arc::new(MemoryStore::new());
        let assistant = Assistant::new(
            Arc::new(WeatherEchoModel),
            toolbox(&server, Duration::from_millis(100)),
            store.clone(),
        );

        let reply = assistant.respond(1, "¿Cuál es el clima en Barcelona hoy?").await;
        assert_eq!(reply, FALLBACK_REPLY);
        assert!(store.history(1).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_location_falls_back() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/geo/1.0/direct"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let store = Arc::new(MemoryStore::new());
        let assistant = Assistant::new(
            Arc::new(WeatherEchoModel),
            toolbox(&server, Duration::from_secs(5)),
            store.clone(),
        );

        let err = assistant.converse(2, "¿Tiempo?").await.unwrap_err();
        match err {
            AssistantError::Tool { tool, failure } => {
                assert_eq!(tool, "get_weather");
                assert_eq!(failure.kind, tools::FailureKind::InvalidInput);
            }
            other => panic!("expected tool failure, got {other}"),
        }
        assert!(store.history(2).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_gemini_server_error_falls_back() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("internal"))
            .mount(&server)
            .await;

        let store = Arc::new(MemoryStore::new());
        let gemini = GeminiClient::with_base_url(
            "gemini-key".to_string(),
            gemini::DEFAULT_MODEL.to_string(),
            0.1,
            &server.uri(),
            Duration::from_secs(5),
        )
        .unwrap();
        let assistant = Assistant::new(Arc::new(gemini), toolbox(&server, Duration::from_secs(5)), store.clone());

        assert_eq!(assistant.respond(3, "hola").await, FALLBACK_REPLY);
        assert!(store.history(3).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_news_rate_limit_falls_back() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/everything"))
            .respond_with(ResponseTemplate::new(429).set_body_json(json!({
                "status": "error", "code": "rateLimited", "message": "slow down"
            })))
            .mount(&server)
            .await;

        let store = Arc::new(MemoryStore::new());
        let model = ScriptedModel::new(vec![Ok(ModelReply::call("get_news", json!({ "query": "elecciones" })))]);
        let assistant = Assistant::new(Arc::new(model), toolbox(&server, Duration::from_secs(5)), store.clone());

        assert_eq!(assistant.respond(4, "noticias de las elecciones").await, FALLBACK_REPLY);
        assert!(store.history(4).unwrap().is_empty());
    }
}

// =============================================================================
// CONVERSATION LIFECYCLE
// =============================================================================

mod lifecycle {
    use super::*;

    #[tokio::test]
    async fn test_news_then_reset() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/everything"))
            .and(query_param("q", "astronomía"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "ok",
                "totalResults": 1,
                "articles": [{
                    "source": { "id": null, "name": "El País" },
                    "title": "Un eclipse visible desde España",
                    "url": "https://example.com/eclipse",
                    "publishedAt": "2024-04-08T10:00:00Z"
                }]
            })))
            .mount(&server)
            .await;

        let model = ScriptedModel::new(vec![
            Ok(ModelReply::call("get_news", json!({ "query": "astronomía" }))),
            Ok(ModelReply::text("Hay un eclipse, mi señor.")),
            Ok(ModelReply::text("Como usted diga.")),
        ]);
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let assistant = Assistant::new(Arc::new(model), toolbox(&server, Duration::from_secs(5)), store.clone());

        assistant.respond(5, "¿Noticias de astronomía?").await;
        assistant.respond(5, "Gracias").await;
        assert_eq!(store.history(5).unwrap().len(), 5);
        assert!(store.history(5).unwrap()[1].text().contains("Un eclipse visible desde España (El País)"));

        assert_eq!(assistant.reset(5).unwrap(), 5);
        assert!(store.history(5).unwrap().is_empty());
        assert_eq!(assistant.reset(5).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_conversations_are_isolated() {
        let server = MockServer::start().await;
        let model = ScriptedModel::new(vec![Ok(ModelReply::text("uno")), Ok(ModelReply::text("dos"))]);
        let store = Arc::new(MemoryStore::new());
        let assistant = Assistant::new(Arc::new(model), toolbox(&server, Duration::from_secs(5)), store.clone());

        assistant.respond(100, "a").await;
        assistant.respond(200, "b").await;
        assistant.reset(100).unwrap();

        assert!(store.history(100).unwrap().is_empty());
        assert_eq!(store.history(200).unwrap().len(), 2);
    }
}
