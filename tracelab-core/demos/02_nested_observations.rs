//! Tool calls recorded as child observations of the agent generation.
//!
//! `cargo run -p tracelab-core --example nested_observations`

#[path = "common/mod.rs"]
mod common;

use common::{Demo, SAMPLE_TEXT, banner};
use tracelab_core::agent::{AgentCtx, analyze};
use tracelab_core::telemetry::Trace;
use tracelab_core::tools::ToolRegistry;

const ETHICS: &str = " However, this rapid advancement raises important ethical questions \
about privacy, bias, and the future of human employment.";

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    banner(
        "Example 2: Nested Observations",
        &[
            "Trace",
            "  └── Generation (analyze)",
            "      ├── Tool (count_words)",
            "      └── Tool (extract_keywords)",
        ],
    );
    let demo = Demo::setup()?;
    let text = format!("{SAMPLE_TEXT}{ETHICS}");

    let trace = Trace::new("example-02-nested-observations").input(text.as_str());
    let ctx = AgentCtx::new(&demo.provider, demo.model()).with_trace_id(&trace.id);
    println!("Analyzing text with tools...");
    let result = analyze::run(ctx, &text, &ToolRegistry::builtin()).await;
    let result = demo.record(trace, result);
    demo.flush().await;

    let out = result?;
    println!("\nAnalysis:\n{}\n", out.text);
    for generation in &out.observations {
        for tool in &generation.children {
            match &tool.status_message {
                Some(err) => println!("  tool {} failed: {err}", tool.name),
                None => println!("  tool {} -> {}", tool.name, tool.output),
            }
        }
    }
    println!("\nTrace created! View it in Langfuse: {}", demo.tracer.traces_url());
    println!("Look for the nested tool observations.");
    Ok(())
}
