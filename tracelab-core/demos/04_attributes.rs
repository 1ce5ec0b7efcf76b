//! Environment, tags, user, metadata and release on traces.
//!
//! `cargo run -p tracelab-core --example attributes`

#[path = "common/mod.rs"]
mod common;

use common::{Demo, banner};
use serde_json::{Map, Value, json};
use tracelab_core::agent::{AgentCtx, summarize};
use tracelab_core::telemetry::{Trace, TraceAttributes};

const TEXT: &str = "Artificial intelligence has revolutionized numerous industries, from healthcare to finance, \
by enabling machines to process and analyze vast amounts of data at unprecedented speeds.";

fn metadata(v: Value) -> Map<String, Value> {
    match v {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    banner(
        "Example 4: Attributes",
        &[
            "Environment: separates dev/staging/prod data",
            "Tags:        categorizes traces",
            "User:        who triggered the trace",
            "Metadata:    custom key-value information",
            "Release:     application version",
        ],
    );
    let demo = Demo::setup()?;

    let cases = [
        (
            "environment",
            TraceAttributes::new().environment_opt(Some("development")),
        ),
        (
            "tags",
            TraceAttributes::new().tags(["summarization", "example", "demo"]),
        ),
        ("user", TraceAttributes::new().user_id_opt(Some("user-123"))),
        (
            "metadata",
            TraceAttributes::new().metadata(metadata(json!({
                "source": "cli",
                "feature": "summarization",
                "priority": "high",
                "custom_field": "custom_value"
            }))),
        ),
        ("release", TraceAttributes::new().release_opt(Some("v1.2.3"))),
        (
            "all",
            TraceAttributes::new()
                .environment_opt(Some("production"))
                .tags(["summarization", "production"])
                .user_id_opt(Some("user-456"))
                .metadata(metadata(json!({"source": "api", "endpoint": "/summarize"})))
                .release_opt(Some("v2.0.0")),
        ),
    ];

    for (label, attrs) in cases {
        let trace = Trace::new(format!("example-04-attributes-{label}"))
            .input(TEXT)
            .attributes(attrs);
        let ctx = AgentCtx::new(&demo.provider, demo.model()).with_trace_id(&trace.id);
        let result = summarize::run(ctx, TEXT).await;
        match demo.record(trace, result) {
            Ok(_) => println!("Created trace with {label} attributes"),
            Err(e) => eprintln!("Error ({label}): {e}"),
        }
    }

    demo.flush().await;
    println!("\nView traces in Langfuse: {}", demo.tracer.traces_url());
    println!("Use filters to find traces by environment, tags, user, etc.");
    Ok(())
}
