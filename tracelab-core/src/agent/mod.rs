//! The four agent tasks.
//!
//! An agent is a short, fixed sequence of model calls. It returns the final
//! text together with the observation tree describing those calls; turning
//! that into a submitted trace is the caller's job (`finish_trace`).

pub mod analyze;
pub mod chat;
pub mod rag;
pub mod summarize;

use serde_json::{Map, Value};

use crate::error::{CoreResult, TraceLabError};
use crate::model::{ChatMessage, ChatResponse};
use crate::provider::ChatProvider;
use crate::telemetry::{
    KEY_ERROR_KIND, KEY_ERROR_MESSAGE, META_LATENCY_MS, META_PROVIDER, META_STOP_REASON,
    Observation, Trace, Usage,
};

/// What an agent hands back.
#[derive(Debug, Clone)]
pub struct AgentOutput {
    pub text: String,
    pub observations: Vec<Observation>,
    pub usage: Usage,
}

/// The model client and model name an agent runs against.
#[derive(Clone, Copy)]
pub struct AgentCtx<'a> {
    pub provider: &'a dyn ChatProvider,
    pub model: &'a str,
    /// Forwarded to the model server as `X-Trace-Id`.
    pub trace_id: Option<&'a str>,
}

impl<'a> AgentCtx<'a> {
    pub fn new(provider: &'a dyn ChatProvider, model: &'a str) -> Self {
        Self {
            provider,
            model,
            trace_id: None,
        }
    }

    pub fn with_trace_id(mut self, trace_id: &'a str) -> Self {
        self.trace_id = Some(trace_id);
        self
    }
}

/// Fill a trace skeleton from an agent result. A failed run still yields a
/// trace; its output carries the error kind and message.
pub fn finish_trace(trace: Trace, result: &CoreResult<AgentOutput>) -> Trace {
    match result {
        Ok(out) => trace
            .output(out.text.clone())
            .observations(out.observations.iter().cloned()),
        Err(e) => {
            let mut output = Map::new();
            output.insert(KEY_ERROR_KIND.into(), Value::from(e.kind()));
            output.insert(KEY_ERROR_MESSAGE.into(), Value::from(e.to_string()));
            trace.output(Value::Object(output))
        }
    }
}

pub(crate) fn require_text(field: &str, value: &str) -> CoreResult<()> {
    if value.trim().is_empty() {
        return Err(TraceLabError::Validation(format!("{field} must not be empty")));
    }
    Ok(())
}

pub(crate) fn messages_value(messages: &[ChatMessage]) -> Value {
    serde_json::to_value(messages).unwrap_or_default()
}

pub(crate) fn usage_of(resp: &ChatResponse) -> Usage {
    Usage::new(resp.usage_prompt, resp.usage_completion)
}

/// Provider details every generation carries as metadata.
pub(crate) fn annotate(obs: Observation, resp: &ChatResponse) -> Observation {
    let obs = obs
        .meta(META_PROVIDER, resp.provider.clone())
        .meta(META_LATENCY_MS, resp.latency_ms);
    match resp.stop_reason {
        Some(reason) => obs.meta(META_STOP_REASON, serde_json::to_value(reason).unwrap_or_default()),
        None => obs,
    }
}
