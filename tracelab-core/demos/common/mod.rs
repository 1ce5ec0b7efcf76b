//! Setup shared by the demo programs.
#![allow(dead_code)]

use std::sync::Arc;

use tracelab_core::agent::{AgentOutput, finish_trace};
use tracelab_core::config::Settings;
use tracelab_core::error::CoreResult;
use tracelab_core::providers::ollama::Ollama;
use tracelab_core::telemetry::{LangfuseSink, Trace, Tracer};
use tracing_subscriber::EnvFilter;

pub const SAMPLE_TEXT: &str = "Artificial intelligence has revolutionized numerous industries, from healthcare to finance, \
by enabling machines to process and analyze vast amounts of data at unprecedented speeds. \
Machine learning algorithms can now identify patterns in medical imaging that might escape \
human detection, predict market trends with remarkable accuracy, and automate complex \
decision-making processes.";

pub struct Demo {
    pub settings: Settings,
    pub provider: Ollama,
    pub tracer: Tracer,
}

impl Demo {
    /// Load `.env`, install logging, connect to Ollama and Langfuse.
    pub fn setup() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
            .with_writer(std::io::stderr)
            .init();

        let settings = Settings::from_env()?;
        let provider = Ollama::from_settings(&settings.inference, &settings.http)?;
        let sink = LangfuseSink::from_settings(&settings.langfuse, &settings.http)?;
        let tracer = Tracer::new(Arc::new(sink), settings.langfuse.host.clone());
        Ok(Self {
            settings,
            provider,
            tracer,
        })
    }

    pub fn model(&self) -> &str {
        &self.settings.inference.model
    }

    /// Record the finished trace; hand the result back for printing.
    pub fn record(&self, trace: Trace, result: CoreResult<AgentOutput>) -> CoreResult<AgentOutput> {
        self.tracer.record(finish_trace(trace, &result));
        result
    }

    pub async fn flush(&self) {
        match self.tracer.flush().await {
            Ok(report) => println!("Sent {} trace(s), {} event(s).", report.traces, report.events),
            Err(e) => eprintln!("Warning: traces were not sent: {e}"),
        }
    }
}

pub fn banner(title: &str, shape: &[&str]) {
    let rule = "=".repeat(60);
    println!("{rule}\n{title}\n{rule}");
    println!("In Langfuse, you'll see:\n");
    for line in shape {
        println!("  {line}");
    }
    println!();
}
