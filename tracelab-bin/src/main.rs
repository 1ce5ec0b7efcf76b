mod cli;

use std::io::IsTerminal;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use serde_json::{Value, json};
use tracelab_core::{
    agent::{self, AgentCtx, AgentOutput, finish_trace},
    config::Settings,
    error::CoreResult,
    providers::ollama::Ollama,
    telemetry::{LangfuseSink, MemorySink, Trace, TraceSink, Tracer},
    tools::ToolRegistry,
};
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands, ContextInput, TextInput, default_trace_name};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Real environment variables win over .env entries.
    let dotenv = dotenvy::dotenv();
    init_logging(cli.verbose);
    if let Err(e) = dotenv
        && !e.not_found()
    {
        tracing::warn!(error = %e, ".env file could not be loaded");
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose {
        "warn,tracelab=debug,tracelab_core=debug"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .init();
}

/// Task input, read up front so bad paths fail before any network call.
enum TaskInput {
    Summarize(String),
    Analyze(String),
    Chat(String),
    Rag { question: String, context: String },
}

impl TaskInput {
    fn read(command: &Commands) -> anyhow::Result<Self> {
        Ok(match command {
            Commands::Summarize { input, .. } => Self::Summarize(read_text(input)?),
            Commands::Analyze { input, .. } => Self::Analyze(read_text(input)?),
            Commands::Chat { message, .. } => Self::Chat(message.clone()),
            Commands::Rag {
                question, context, ..
            } => Self::Rag {
                question: question.clone(),
                context: read_context(context)?,
            },
        })
    }

    fn trace_input(&self) -> Value {
        match self {
            Self::Summarize(text) | Self::Analyze(text) | Self::Chat(text) => json!(text),
            Self::Rag { question, context } => json!({ "question": question, "context": context }),
        }
    }
}

fn read_file(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn read_text(input: &TextInput) -> anyhow::Result<String> {
    match (&input.text, &input.file) {
        (Some(text), _) => Ok(text.clone()),
        (None, Some(path)) => read_file(path),
        (None, None) => anyhow::bail!("either --text or --file is required"),
    }
}

fn read_context(input: &ContextInput) -> anyhow::Result<String> {
    match (&input.context, &input.context_file) {
        (Some(context), _) => Ok(context.clone()),
        (None, Some(path)) => read_file(path),
        (None, None) => anyhow::bail!("either --context or --context-file is required"),
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let task = cli.command.task();
    let input = TaskInput::read(&cli.command)?;
    let settings = Settings::load(cli.config.as_deref())?;

    let common = cli.command.common();
    let session_id = cli.command.session_id();
    let trace_name = common
        .trace_name
        .clone()
        .unwrap_or_else(|| default_trace_name(task));
    tracing::debug!(
        trace.name = %trace_name,
        llm.model = %settings.inference.model,
        inference.url = %settings.inference.base_url,
        tracing.host = %settings.langfuse.host,
        dry_run = cli.dry_run,
        "running {task}"
    );

    let provider = Ollama::from_settings(&settings.inference, &settings.http)?;
    let sink: Arc<dyn TraceSink> = if cli.dry_run {
        Arc::new(MemorySink::new())
    } else {
        Arc::new(LangfuseSink::from_settings(&settings.langfuse, &settings.http)?)
    };
    let tracer = Tracer::new(sink, settings.langfuse.host.clone());

    let trace = Trace::new(trace_name)
        .input(input.trace_input())
        .attributes(common.attributes(session_id));
    let trace_id = trace.id.clone();
    let ctx = AgentCtx::new(&provider, &settings.inference.model).with_trace_id(&trace_id);

    let result = run_task(ctx, &input).await;
    tracer.record(finish_trace(trace, &result));
    if let Ok(out) = &result {
        println!("{}", out.text);
    }

    flush(&tracer).await;
    if cli.dry_run {
        eprintln!("Dry run: trace {trace_id} kept in memory, nothing sent");
    } else {
        eprintln!("View traces at: {}", tracer.traces_url());
        if session_id.is_some() {
            eprintln!("View sessions at: {}", tracer.sessions_url());
        }
    }

    result.map(|_| ()).with_context(|| format!("{task} failed"))
}

async fn run_task(ctx: AgentCtx<'_>, input: &TaskInput) -> CoreResult<AgentOutput> {
    match input {
        TaskInput::Summarize(text) => agent::summarize::run(ctx, text).await,
        TaskInput::Analyze(text) => {
            agent::analyze::run(ctx, text, &ToolRegistry::builtin()).await
        }
        TaskInput::Chat(message) => agent::chat::run(ctx, &[], message)
            .await
            .map(|turn| turn.output),
        TaskInput::Rag { question, context } => agent::rag::run(ctx, question, context).await,
    }
}

/// Submission problems never change the exit status; the result is already printed.
async fn flush(tracer: &Tracer) {
    match tracer.flush().await {
        Ok(report) if report.is_partial() => {
            for e in &report.errors {
                tracing::warn!(event.id = %e.id, status = e.status, "trace event rejected: {}", e.message);
            }
        }
        Ok(report) => {
            tracing::debug!(traces = report.traces, events = report.events, "traces flushed");
        }
        Err(e) => {
            tracing::warn!(error.kind = e.kind(), "failed to flush traces: {e}");
        }
    }
}
