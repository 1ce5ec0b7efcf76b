use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::{HttpCfg, InferenceCfg};
use crate::error::CoreResult;
use crate::http_client::{HttpClient, RequestCtx};
use crate::model::{ChatMessage, ChatRequest, ChatResponse, Role, StopReason, ToolCall, ToolSpec};
use crate::normalizer::normalize_chat;
use crate::provider::ChatProvider;

/// Client for a local Ollama server's `/api/chat` endpoint (non-streaming).
#[derive(Debug, Clone)]
pub struct Ollama {
    http: HttpClient,
    base: String,
    name: String, // "ollama"
}

impl Ollama {
    pub fn new(http: HttpClient, base: String) -> Self {
        Self {
            http,
            base,
            name: "ollama".into(),
        }
    }

    pub fn from_settings(inference: &InferenceCfg, http: &HttpCfg) -> CoreResult<Self> {
        Ok(Self::new(
            HttpClient::new("ollama", http)?,
            inference.base_url.clone(),
        ))
    }

    #[cfg(test)]
    pub fn new_for_tests(server_base: &str) -> Self {
        Ollama::new(
            HttpClient::new_default("ollama").unwrap(),
            server_base.to_string(),
        )
    }
}

// ---- Wire structs (minimal) ----
#[derive(Serialize)]
struct OChatReq<'a> {
    model: &'a str,
    messages: Vec<OMessage<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<OTool<'a>>,
    stream: bool,
}

#[derive(Serialize)]
struct OMessage<'a> {
    role: Role,
    content: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<OToolCall<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_name: Option<&'a str>,
}

#[derive(Serialize)]
struct OToolCall<'a> {
    function: OFunctionCall<'a>,
}

#[derive(Serialize)]
struct OFunctionCall<'a> {
    name: &'a str,
    arguments: &'a serde_json::Value,
}

#[derive(Serialize)]
struct OTool<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    function: OToolFunction<'a>,
}

#[derive(Serialize)]
struct OToolFunction<'a> {
    name: &'a str,
    description: &'a str,
    parameters: &'a serde_json::Value,
}

impl<'a> From<&'a ChatMessage> for OMessage<'a> {
    fn from(m: &'a ChatMessage) -> Self {
        Self {
            role: m.role,
            content: &m.content,
            tool_calls: m
                .tool_calls
                .iter()
                .map(|c| OToolCall {
                    function: OFunctionCall {
                        name: &c.name,
                        arguments: &c.arguments,
                    },
                })
                .collect(),
            tool_name: m.tool_name.as_deref(),
        }
    }
}

impl<'a> From<&'a ToolSpec> for OTool<'a> {
    fn from(t: &'a ToolSpec) -> Self {
        Self {
            kind: "function",
            function: OToolFunction {
                name: &t.name,
                description: &t.description,
                parameters: &t.parameters,
            },
        }
    }
}

#[derive(Deserialize)]
struct OChatResp {
    #[serde(default)]
    model: Option<String>,
    message: ORespMessage,
    #[serde(default)]
    done_reason: Option<String>,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}

#[derive(Deserialize)]
struct ORespMessage {
    #[serde(default)]
    content: String,
    #[serde(default)]
    tool_calls: Option<Vec<ORespToolCall>>,
}

#[derive(Deserialize)]
struct ORespToolCall {
    function: ORespFunction,
}

#[derive(Deserialize)]
struct ORespFunction {
    name: String,
    #[serde(default)]
    arguments: serde_json::Value,
}

fn map_done(s: Option<&str>, has_tool_calls: bool) -> Option<StopReason> {
    if has_tool_calls {
        return Some(StopReason::ToolUse);
    }
    match s {
        Some("stop") => Some(StopReason::Stop),
        Some("length") => Some(StopReason::Length),
        Some(_) => Some(StopReason::Other),
        None => None,
    }
}

#[async_trait]
impl ChatProvider for Ollama {
    fn name(&self) -> &str {
        &self.name
    }

    async fn chat(&self, req: ChatRequest) -> CoreResult<ChatResponse> {
        let req = normalize_chat(req);
        let payload = OChatReq {
            model: &req.model,
            messages: req.messages.iter().map(OMessage::from).collect(),
            tools: req.tools.iter().map(OTool::from).collect(),
            stream: false,
        };
        let ctx = RequestCtx {
            trace_id: req.trace_id.as_deref(),
        };
        let url = format!("{}/api/chat", self.base);
        let (resp, latency_ms) = self
            .http
            .post_json::<_, OChatResp>(&url, &payload, &[], &ctx)
            .await?;

        let tool_calls: Vec<ToolCall> = resp
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|c| ToolCall {
                name: c.function.name,
                arguments: c.function.arguments,
            })
            .collect();
        let stop_reason = map_done(resp.done_reason.as_deref(), !tool_calls.is_empty());

        tracing::debug!(
            llm.provider = %self.name,
            llm.model = %req.model,
            latency.ms = latency_ms,
            tokens.prompt = resp.prompt_eval_count.unwrap_or(0),
            tokens.completion = resp.eval_count.unwrap_or(0),
            tool_calls = tool_calls.len(),
            "chat completion"
        );

        Ok(ChatResponse {
            model: resp.model.unwrap_or(req.model),
            text: resp.message.content,
            tool_calls,
            usage_prompt: resp.prompt_eval_count.unwrap_or(0),
            usage_completion: resp.eval_count.unwrap_or(0),
            provider: self.name.clone(),
            stop_reason,
            latency_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::Method::POST;
    use httpmock::MockServer;
    use serde_json::json;

    use crate::error::TraceLabError;

    fn user_req(text: &str) -> ChatRequest {
        ChatRequest::new("llama3.2", vec![ChatMessage::user(text)])
    }

    #[tokio::test]
    async fn chat_200_maps_fields() {
        let server = MockServer::start();
        let provider = Ollama::new_for_tests(&server.base_url());

        let m = server.mock(|when, then| {
            when.method(POST)
                .path("/api/chat")
                .json_body_partial(r#"{"model":"llama3.2","stream":false}"#);
            then.status(200).json_body(json!({
                "model": "llama3.2",
                "created_at": "2025-01-01T00:00:00Z",
                "message": {"role": "assistant", "content": "Hello!"},
                "done": true,
                "done_reason": "stop",
                "prompt_eval_count": 10,
                "eval_count": 5
            }));
        });

        let resp = provider.chat(user_req("Hi")).await.expect("chat ok");
        assert_eq!(resp.text, "Hello!");
        assert_eq!(resp.stop_reason, Some(StopReason::Stop));
        assert_eq!(resp.usage_prompt, 10);
        assert_eq!(resp.usage_completion, 5);
        assert_eq!(resp.provider, "ollama");
        assert!(resp.tool_calls.is_empty());
        m.assert();
    }

    #[tokio::test]
    async fn tools_are_sent_and_tool_calls_parsed() {
        let server = MockServer::start();
        let provider = Ollama::new_for_tests(&server.base_url());

        let m = server.mock(|when, then| {
            when.method(POST)
                .path("/api/chat")
                .body_contains("\"type\":\"function\"")
                .body_contains("\"name\":\"count_words\"");
            then.status(200).json_body(json!({
                "model": "llama3.2",
                "message": {
                    "role": "assistant",
                    "content": "",
                    "tool_calls": [
                        {"function": {"name": "count_words", "arguments": {"text": "a b c"}}}
                    ]
                },
                "done": true,
                "done_reason": "stop"
            }));
        });

        let req = user_req("analyze").with_tools(vec![ToolSpec {
            name: "count_words".into(),
            description: "Count words".into(),
            parameters: json!({"type": "object"}),
        }]);
        let resp = provider.chat(req).await.expect("chat ok");
        assert_eq!(resp.stop_reason, Some(StopReason::ToolUse));
        assert_eq!(resp.tool_calls.len(), 1);
        assert_eq!(resp.tool_calls[0].name, "count_words");
        assert_eq!(resp.tool_calls[0].arguments, json!({"text": "a b c"}));
        m.assert();
    }

    #[tokio::test]
    async fn tool_result_messages_carry_tool_name() {
        let server = MockServer::start();
        let provider = Ollama::new_for_tests(&server.base_url());
        let m = server.mock(|when, then| {
            when.method(POST)
                .path("/api/chat")
                .body_contains("\"role\":\"tool\"")
                .body_contains("\"tool_name\":\"count_words\"");
            then.status(200).json_body(json!({
                "message": {"role": "assistant", "content": "done"}
            }));
        });
        let req = ChatRequest::new(
            "llama3.2",
            vec![
                ChatMessage::user("analyze"),
                ChatMessage::tool_result("count_words", r#"{"word_count":3}"#),
            ],
        );
        let resp = provider.chat(req).await.expect("chat ok");
        assert_eq!(resp.text, "done");
        assert_eq!(resp.model, "llama3.2");
        assert_eq!(resp.stop_reason, None);
        m.assert();
    }

    #[tokio::test]
    async fn done_reason_length_maps() {
        let server = MockServer::start();
        let provider = Ollama::new_for_tests(&server.base_url());
        let _m = server.mock(|when, then| {
            when.method(POST).path("/api/chat");
            then.status(200).json_body(json!({
                "message": {"role": "assistant", "content": "cut"},
                "done_reason": "length"
            }));
        });
        let resp = provider.chat(user_req("Hi")).await.expect("chat ok");
        assert_eq!(resp.stop_reason, Some(StopReason::Length));
    }

    #[tokio::test]
    async fn chat_404_model_missing_maps_to_upstream() {
        let server = MockServer::start();
        let provider = Ollama::new_for_tests(&server.base_url());
        let _m = server.mock(|when, then| {
            when.method(POST).path("/api/chat");
            then.status(404)
                .json_body(json!({"error": "model \"llama3.2\" not found, try pulling it first"}));
        });
        let err = provider.chat(user_req("Hi")).await.unwrap_err();
        match err {
            TraceLabError::Upstream { service, code, message } => {
                assert_eq!(service, "ollama");
                assert_eq!(code, "404");
                assert!(message.contains("not found"));
            }
            other => panic!("expected Upstream, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn chat_network_error_maps_to_unavailable() {
        let provider = Ollama::new_for_tests("http://127.0.0.1:9");
        let err = provider.chat(user_req("Hi")).await.unwrap_err();
        assert!(matches!(err, TraceLabError::Unavailable { .. }));
        assert!(err.is_transport());
    }
}
