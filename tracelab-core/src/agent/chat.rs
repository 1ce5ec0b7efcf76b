use tracing::field::Empty;
use tracing_futures::Instrument;

use super::{AgentCtx, AgentOutput, annotate, messages_value, require_text, usage_of};
use crate::error::CoreResult;
use crate::model::{ChatMessage, ChatRequest, Role};
use crate::prompts::{CHAT, render};
use crate::telemetry::Observation;

/// A reply plus the conversation so far, ready to pass into the next turn.
#[derive(Debug, Clone)]
pub struct ChatTurn {
    pub output: AgentOutput,
    /// Prior turns, then this user message and the reply. Never holds the system prompt.
    pub history: Vec<ChatMessage>,
}

/// One conversational turn. Session grouping happens on the trace, not here.
pub async fn run(ctx: AgentCtx<'_>, history: &[ChatMessage], message: &str) -> CoreResult<ChatTurn> {
    require_text("message", message)?;
    let span = tracing::info_span!(
        "agent",
        agent.task = "chat",
        llm.model = %ctx.model,
        history.len = history.len(),
        tokens.prompt = Empty,
        tokens.completion = Empty,
    );
    async move {
        let user = ChatMessage::user(render(CHAT.user, &[("message", message)]));
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage::system(CHAT.system));
        messages.extend(history.iter().filter(|m| m.role != Role::System).cloned());
        messages.push(user.clone());

        let obs = Observation::generation(CHAT.name)
            .model(ctx.model)
            .input(messages_value(&messages));
        let mut req = ChatRequest::new(ctx.model, messages);
        req.trace_id = ctx.trace_id.map(str::to_string);
        let resp = ctx.provider.chat(req).await?;

        let usage = usage_of(&resp);
        let current = tracing::Span::current();
        current.record("tokens.prompt", usage.input);
        current.record("tokens.completion", usage.output);

        let mut next = history.iter().filter(|m| m.role != Role::System).cloned().collect::<Vec<_>>();
        next.push(user);
        next.push(ChatMessage::assistant(resp.text.clone()));

        let obs = annotate(obs, &resp).output(resp.text.clone()).usage(usage).end();
        Ok(ChatTurn {
            output: AgentOutput {
                text: resp.text,
                observations: vec![obs],
                usage,
            },
            history: next,
        })
    }
    .instrument(span)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TraceLabError;
    use crate::provider::ScriptedProvider;

    #[tokio::test]
    async fn history_grows_by_one_exchange_per_turn() {
        let provider = ScriptedProvider::new()
            .reply_text("Hi Ada!")
            .reply_text("Your name is Ada.");
        let ctx = AgentCtx::new(&provider, "llama3.1");

        let first = run(ctx, &[], "Hello, I'm Ada.").await.unwrap();
        assert_eq!(first.output.text, "Hi Ada!");
        assert_eq!(first.history.len(), 2);
        assert_eq!(first.output.observations[0].name, "chat");

        let second = run(ctx, &first.history, "What's my name?").await.unwrap();
        assert_eq!(second.history.len(), 4);
        assert_eq!(second.history[3].content, "Your name is Ada.");

        let sent = provider.requests();
        // system + prior exchange + new user turn
        assert_eq!(sent[1].messages.len(), 4);
        assert_eq!(sent[1].messages[0].role, Role::System);
        assert_eq!(sent[1].messages[1].content, "Hello, I'm Ada.");
        assert_eq!(sent[1].messages[3].content, "What's my name?");
    }

    #[tokio::test]
    async fn system_messages_in_history_are_not_duplicated() {
        let provider = ScriptedProvider::new().reply_text("ok");
        let history = vec![ChatMessage::system("old prompt"), ChatMessage::user("hi")];
        let turn = run(AgentCtx::new(&provider, "m"), &history, "again").await.unwrap();
        let sent = &provider.requests()[0];
        assert_eq!(sent.messages.iter().filter(|m| m.role == Role::System).count(), 1);
        assert!(turn.history.iter().all(|m| m.role != Role::System));
    }

    #[tokio::test]
    async fn blank_message_is_rejected() {
        let provider = ScriptedProvider::new();
        let err = run(AgentCtx::new(&provider, "m"), &[], "").await.unwrap_err();
        assert!(matches!(err, TraceLabError::Validation(_)));
        assert_eq!(provider.calls(), 0);
    }
}
