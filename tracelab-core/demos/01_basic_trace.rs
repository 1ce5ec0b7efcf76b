//! A trace with a single generation.
//!
//! `cargo run -p tracelab-core --example basic_trace`

#[path = "common/mod.rs"]
mod common;

use common::{Demo, SAMPLE_TEXT, banner};
use tracelab_core::agent::{AgentCtx, summarize};
use tracelab_core::telemetry::Trace;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    banner("Example 1: Basic Trace", &["Trace", "  └── Generation (summarize)"]);
    let demo = Demo::setup()?;

    let trace = Trace::new("example-01-basic-trace").input(SAMPLE_TEXT);
    let ctx = AgentCtx::new(&demo.provider, demo.model()).with_trace_id(&trace.id);
    println!("Summarizing text...");
    let result = summarize::run(ctx, SAMPLE_TEXT).await;
    let result = demo.record(trace, result);
    demo.flush().await;

    let out = result?;
    println!("\nSummary:\n{}\n", out.text);
    println!("Trace created! View it in Langfuse: {}", demo.tracer.traces_url());
    Ok(())
}
