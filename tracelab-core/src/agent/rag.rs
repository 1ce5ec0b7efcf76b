use serde_json::json;
use tracing::field::Empty;
use tracing_futures::Instrument;

use super::{AgentCtx, AgentOutput, annotate, messages_value, require_text, usage_of};
use crate::error::CoreResult;
use crate::model::ChatRequest;
use crate::prompts::RAG;
use crate::telemetry::Observation;

pub const RETRIEVAL_NAME: &str = "retrieve-context";

/// Answer `question` from caller-supplied `context`.
///
/// Retrieval is simulated: the context is taken as-is and recorded verbatim
/// as the input of a `retrieve-context` child under the `rag` generation.
pub async fn run(ctx: AgentCtx<'_>, question: &str, context: &str) -> CoreResult<AgentOutput> {
    require_text("question", question)?;
    let span = tracing::info_span!(
        "agent",
        agent.task = "rag",
        llm.model = %ctx.model,
        context.bytes = context.len(),
        tokens.prompt = Empty,
        tokens.completion = Empty,
    );
    async move {
        let retrieval = Observation::retrieval(RETRIEVAL_NAME)
            .input(context)
            .output(json!({ "documents": [context] }))
            .end();

        let messages = RAG.messages(&[("context", context), ("question", question)]);
        let generation = Observation::generation(RAG.name)
            .model(ctx.model)
            .input(messages_value(&messages));
        let mut req = ChatRequest::new(ctx.model, messages);
        req.trace_id = ctx.trace_id.map(str::to_string);
        let resp = ctx.provider.chat(req).await?;

        let usage = usage_of(&resp);
        let current = tracing::Span::current();
        current.record("tokens.prompt", usage.input);
        current.record("tokens.completion", usage.output);

        let generation = annotate(generation, &resp)
            .output(resp.text.clone())
            .usage(usage)
            .child(retrieval)
            .end();
        Ok(AgentOutput {
            text: resp.text,
            observations: vec![generation],
            usage,
        })
    }
    .instrument(span)
    .await
}
