use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::CoreResult;
use crate::model::{ChatRequest, ChatResponse, StopReason, ToolCall};

#[async_trait]
pub trait ChatProvider: Send + Sync {
    fn name(&self) -> &str;
    async fn chat(&self, req: ChatRequest) -> CoreResult<ChatResponse>;
}

/// A provider that replays canned replies in order, then falls back to a
/// fixed placeholder text. Records every request it sees.
/// Useful for tests, demos without a model server, or as a placeholder.
#[derive(Default)]
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<CoreResult<ChatResponse>>>,
    requests: Mutex<Vec<ChatRequest>>,
}

pub const SCRIPTED_FALLBACK_TEXT: &str = "[scripted provider response]";

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply_text(self, text: &str) -> Self {
        self.push(Ok(canned(text, Vec::new())))
    }

    pub fn reply_tool_calls(self, text: &str, calls: Vec<ToolCall>) -> Self {
        self.push(Ok(canned(text, calls)))
    }

    pub fn reply_err(self, err: crate::error::TraceLabError) -> Self {
        self.push(Err(err))
    }

    fn push(self, reply: CoreResult<ChatResponse>) -> Self {
        self.replies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(reply);
        self
    }

    /// Number of `chat` calls made so far.
    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

fn canned(text: &str, tool_calls: Vec<ToolCall>) -> ChatResponse {
    let stop_reason = if tool_calls.is_empty() {
        StopReason::Stop
    } else {
        StopReason::ToolUse
    };
    ChatResponse {
        model: "scripted".into(),
        text: text.to_string(),
        tool_calls,
        usage_prompt: 0,
        usage_completion: text.split_whitespace().count() as u32,
        provider: "scripted".into(),
        stop_reason: Some(stop_reason),
        latency_ms: 0,
    }
}

#[async_trait]
impl ChatProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn chat(&self, req: ChatRequest) -> CoreResult<ChatResponse> {
        let model = req.model.clone();
        let prompt_len: u32 = req.messages.iter().map(|m| m.content.len() as u32).sum();
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(req);
        let next = self
            .replies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();
        let mut resp = match next {
            Some(reply) => reply?,
            None => canned(SCRIPTED_FALLBACK_TEXT, Vec::new()),
        };
        resp.model = model;
        resp.usage_prompt = prompt_len;
        Ok(resp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TraceLabError;
    use crate::model::ChatMessage;

    fn req() -> ChatRequest {
        ChatRequest::new("llama3.2", vec![ChatMessage::user("hi")])
    }

    #[tokio::test]
    async fn replays_in_order_then_falls_back() {
        let prov = ScriptedProvider::new().reply_text("first").reply_err(
            TraceLabError::Unavailable {
                service: "ollama".into(),
                endpoint: "x".into(),
            },
        );
        assert_eq!(prov.chat(req()).await.unwrap().text, "first");
        assert!(prov.chat(req()).await.is_err());
        let resp = prov.chat(req()).await.expect("fallback ok");
        assert_eq!(resp.text, SCRIPTED_FALLBACK_TEXT);
        assert_eq!(resp.model, "llama3.2");
        assert_eq!(resp.usage_prompt, 2); // "hi" length
        assert_eq!(prov.calls(), 3);
    }
}
