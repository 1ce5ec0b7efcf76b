use tracing::field::Empty;
use tracing_futures::Instrument;

use super::{AgentCtx, AgentOutput, annotate, messages_value, require_text, usage_of};
use crate::error::CoreResult;
use crate::model::ChatRequest;
use crate::prompts::SUMMARIZE;
use crate::telemetry::Observation;

/// One generation: structured key points plus a one-line takeaway.
pub async fn run(ctx: AgentCtx<'_>, text: &str) -> CoreResult<AgentOutput> {
    require_text("text", text)?;
    let span = tracing::info_span!(
        "agent",
        agent.task = "summarize",
        llm.model = %ctx.model,
        tokens.prompt = Empty,
        tokens.completion = Empty,
    );
    async move {
        let messages = SUMMARIZE.messages(&[("text", text)]);
        let obs = Observation::generation(SUMMARIZE.name)
            .model(ctx.model)
            .input(messages_value(&messages));

        let mut req = ChatRequest::new(ctx.model, messages);
        req.trace_id = ctx.trace_id.map(str::to_string);
        let resp = ctx.provider.chat(req).await?;

        let usage = usage_of(&resp);
        let current = tracing::Span::current();
        current.record("tokens.prompt", usage.input);
        current.record("tokens.completion", usage.output);

        let obs = annotate(obs, &resp).output(resp.text.clone()).usage(usage).end();
        Ok(AgentOutput {
            text: resp.text,
            observations: vec![obs],
            usage,
        })
    }
    .instrument(span)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TraceLabError;
    use crate::model::Role;
    use crate::provider::ScriptedProvider;
    use crate::telemetry::ObservationKind;
    use crate::telemetry::test_span::install_capture;

    #[tokio::test]
    async fn single_generation_named_summarize() {
        let provider = ScriptedProvider::new().reply_text("## Key Points\n1. A cat sat.");
        let out = run(AgentCtx::new(&provider, "llama3.1"), "A cat sat.").await.unwrap();

        assert!(out.text.starts_with("## Key Points"));
        assert_eq!(out.observations.len(), 1);
        let g = &out.observations[0];
        assert_eq!(g.kind, ObservationKind::Generation);
        assert_eq!(g.name, "summarize");
        assert_eq!(g.model.as_deref(), Some("llama3.1"));
        assert_eq!(g.output, serde_json::json!(out.text));
        assert!(g.children.is_empty());
        assert!(g.end_time.is_some());

        let sent = provider.requests();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].messages[0].role, Role::System);
        assert!(sent[0].messages[1].content.ends_with("A cat sat."));
        assert!(sent[0].tools.is_empty());
    }

    #[tokio::test]
    async fn empty_input_is_rejected_before_the_model() {
        let provider = ScriptedProvider::new();
        let err = run(AgentCtx::new(&provider, "m"), "   ").await.unwrap_err();
        assert!(matches!(err, TraceLabError::Validation(_)));
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn transport_errors_propagate() {
        let provider = ScriptedProvider::new().reply_err(TraceLabError::RateLimited {
            service: "ollama".into(),
            retry_after: Some(2),
        });
        let err = run(AgentCtx::new(&provider, "m"), "text").await.unwrap_err();
        assert!(err.is_transport());
    }

    #[tokio::test]
    async fn agent_span_carries_task_model_and_tokens() {
        let (store, _guard) = install_capture();
        let provider = ScriptedProvider::new().reply_text("one two three");
        run(AgentCtx::new(&provider, "llama3.1"), "A cat sat.").await.unwrap();

        let span = store.find("agent").expect("agent span");
        assert_eq!(span.fields.get("agent.task").map(String::as_str), Some("summarize"));
        assert_eq!(span.fields.get("llm.model").map(String::as_str), Some("llama3.1"));
        assert_eq!(span.fields.get("tokens.completion").map(String::as_str), Some("3"));
    }
}
