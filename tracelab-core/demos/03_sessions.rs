//! Several chat turns grouped into one session, history carried between turns.
//!
//! `cargo run -p tracelab-core --example sessions`

#[path = "common/mod.rs"]
mod common;

use common::{Demo, banner};
use tracelab_core::agent::{AgentCtx, chat};
use tracelab_core::telemetry::{Trace, TraceAttributes};

const CONVERSATION: [&str; 3] = [
    "Hello! What can you help me with?",
    "Can you explain what artificial intelligence is?",
    "What are some applications of AI?",
];
const SESSION_ID: &str = "example-03-session";

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    banner(
        "Example 3: Sessions",
        &[
            "Session",
            "  ├── Trace 1 (first message)",
            "  ├── Trace 2 (second message)",
            "  └── Trace 3 (third message)",
        ],
    );
    let demo = Demo::setup()?;
    println!("Starting conversation with session ID: {SESSION_ID}\n");

    let mut history = Vec::new();
    for (i, message) in CONVERSATION.iter().enumerate() {
        println!("--- Message {} ---\nUser: {message}", i + 1);
        let trace = Trace::new(format!("example-03-session-message-{}", i + 1))
            .input(*message)
            .attributes(TraceAttributes::new().session_id(SESSION_ID));
        let ctx = AgentCtx::new(&demo.provider, demo.model()).with_trace_id(&trace.id);

        let turn = chat::run(ctx, &history, message).await;
        let (output, next) = match turn {
            Ok(t) => (Ok(t.output), Some(t.history)),
            Err(e) => (Err(e), None),
        };
        match demo.record(trace, output) {
            Ok(out) => println!("Assistant: {}\n", out.text),
            Err(e) => {
                eprintln!("Error: {e}");
                break;
            }
        }
        if let Some(next) = next {
            history = next;
        }
    }

    demo.flush().await;
    println!("Session created! View it in Langfuse: {}", demo.tracer.sessions_url());
    println!("  Session ID: {SESSION_ID}");
    Ok(())
}
