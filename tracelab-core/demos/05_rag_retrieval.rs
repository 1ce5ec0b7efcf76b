//! Retrieval step nested under the answering generation, queries grouped in a session.
//!
//! `cargo run -p tracelab-core --example rag_retrieval`

#[path = "common/mod.rs"]
mod common;

use common::{Demo, banner};
use serde_json::json;
use tracelab_core::agent::{AgentCtx, rag};
use tracelab_core::telemetry::{Trace, TraceAttributes};

const CONTEXT: &str = "Langfuse is an open-source observability platform for LLM applications. It helps developers
track, debug, and improve their LLM applications by providing detailed traces of all
interactions. Langfuse supports multiple observation types including generations, tool calls,
and retrieval steps. The platform is built on OpenTelemetry and provides a comprehensive
data model with traces, observations, and sessions.
";

const QUESTIONS: [&str; 3] = [
    "What is Langfuse?",
    "What observation types does Langfuse support?",
    "What is Langfuse built on?",
];
const SESSION_ID: &str = "example-05-rag-session";

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    banner(
        "Example 5: RAG Retrieval",
        &["Trace", "  └── Generation (rag)", "      └── Retrieval (retrieve-context)"],
    );
    let demo = Demo::setup()?;
    println!("Context document ({} characters)\n", CONTEXT.chars().count());

    for (i, question) in QUESTIONS.iter().enumerate() {
        println!("--- Question {} ---\nQ: {question}", i + 1);
        let trace = Trace::new(format!("example-05-rag-query-{}", i + 1))
            .input(json!({ "question": question, "context": CONTEXT }))
            .attributes(
                TraceAttributes::new()
                    .session_id(SESSION_ID)
                    .tags(["rag", "retrieval", "example"]),
            );
        let ctx = AgentCtx::new(&demo.provider, demo.model()).with_trace_id(&trace.id);
        let result = rag::run(ctx, question, CONTEXT).await;
        match demo.record(trace, result) {
            Ok(out) => println!("A: {}\n", out.text),
            Err(e) => {
                eprintln!("Error: {e}\n");
                break;
            }
        }
    }

    demo.flush().await;
    println!("View traces in Langfuse: {}", demo.tracer.traces_url());
    println!("  Session ID: {SESSION_ID}");
    Ok(())
}
