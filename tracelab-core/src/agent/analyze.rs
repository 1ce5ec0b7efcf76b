use std::collections::HashSet;

use tracing::field::Empty;
use tracing_futures::Instrument;

use super::{AgentCtx, AgentOutput, annotate, messages_value, require_text, usage_of};
use crate::error::CoreResult;
use crate::model::{ChatMessage, ChatRequest};
use crate::prompts::ANALYZE;
use crate::telemetry::{META_TOOL_CALLS, Observation};
use crate::tools::ToolRegistry;

/// Text analysis with local tools.
///
/// The first call advertises the registry's tools. Every distinct tool the
/// model asks for becomes a `Tool` child of the `analyze` generation; repeat
/// calls to a tool already run are ignored. Calls that cannot be invoked are
/// recorded at `Error` level and left out of the follow-up, unless a later
/// call to the same tool succeeds and takes the child's place. When at least one
/// tool ran, a second call feeds the results back and its reply is the analysis.
pub async fn run(ctx: AgentCtx<'_>, text: &str, tools: &ToolRegistry) -> CoreResult<AgentOutput> {
    require_text("text", text)?;
    let span = tracing::info_span!(
        "agent",
        agent.task = "analyze",
        llm.model = %ctx.model,
        tool_calls = Empty,
        tokens.prompt = Empty,
        tokens.completion = Empty,
    );
    async move {
        let mut messages = ANALYZE.messages(&[("text", text)]);
        let generation = Observation::generation(ANALYZE.name)
            .model(ctx.model)
            .input(messages_value(&messages));

        let mut req = ChatRequest::new(ctx.model, messages.clone()).with_tools(tools.specs());
        req.trace_id = ctx.trace_id.map(str::to_string);
        let first = ctx.provider.chat(req).await?;
        let mut usage = usage_of(&first);
        let generation = annotate(generation, &first);

        // Names whose call succeeded; a failed call leaves the name open for a retry.
        let mut resolved: HashSet<&str> = HashSet::new();
        let mut children: Vec<Observation> = Vec::new();
        let mut results = Vec::new();
        for call in &first.tool_calls {
            if resolved.contains(call.name.as_str()) {
                tracing::debug!(tool.name = %call.name, "repeated tool call skipped");
                continue;
            }
            let earlier = children.iter().position(|c| c.name == call.name);
            let child = Observation::tool(call.name.as_str()).input(call.arguments.clone());
            match tools.invoke(call) {
                Ok(output) => {
                    resolved.insert(call.name.as_str());
                    results.push(ChatMessage::tool_result(call.name.as_str(), output.to_string()));
                    let child = child.output(output).end();
                    match earlier {
                        Some(i) => children[i] = child,
                        None => children.push(child),
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        tool.name = %call.name,
                        error.kind = e.kind(),
                        error.message = %e,
                        "tool call rejected"
                    );
                    if earlier.is_none() {
                        children.push(child.error(e.to_string()).end());
                    }
                }
            }
        }
        tracing::Span::current().record("tool_calls", first.tool_calls.len());

        let text = if results.is_empty() {
            first.text
        } else {
            messages.push(first.to_message());
            messages.extend(results);
            let mut follow_up = ChatRequest::new(ctx.model, messages);
            follow_up.trace_id = ctx.trace_id.map(str::to_string);
            let second = ctx.provider.chat(follow_up).await?;
            usage = usage.add(usage_of(&second));
            second.text
        };

        let current = tracing::Span::current();
        current.record("tokens.prompt", usage.input);
        current.record("tokens.completion", usage.output);

        let generation = generation
            .meta(META_TOOL_CALLS, first.tool_calls.len())
            .output(text.clone())
            .usage(usage)
            .children(children)
            .end();
        Ok(AgentOutput {
            text,
            observations: vec![generation],
            usage,
        })
    }
    .instrument(span)
    .await
}
