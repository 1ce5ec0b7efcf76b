//! Command-line argument parsing.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use serde_json::{Map, Value};
use tracelab_core::telemetry::TraceAttributes;

/// Run a traced LLM task against a local Ollama server and send the trace to Langfuse.
#[derive(Parser, Debug)]
#[command(name = "tracelab")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable debug logging (RUST_LOG takes precedence).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Settings file (TOML or JSON) for non-secret fields.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Keep traces in memory instead of sending them; print them with -v.
    #[arg(long, global = true)]
    pub dry_run: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Summarize text into key points and a takeaway.
    #[command(after_help = r#"Examples:
  tracelab summarize --text "A cat sat." --trace-name t1
  tracelab summarize --file paper.txt --tags research,draft
"#)]
    Summarize {
        #[command(flatten)]
        input: TextInput,
        /// Group this trace into a session.
        #[arg(long, value_parser = parse_session_id)]
        session_id: Option<String>,
        #[command(flatten)]
        common: CommonArgs,
    },

    /// Analyze text with the count_words and extract_keywords tools.
    Analyze {
        #[command(flatten)]
        input: TextInput,
        /// Group this trace into a session.
        #[arg(long, value_parser = parse_session_id)]
        session_id: Option<String>,
        #[command(flatten)]
        common: CommonArgs,
    },

    /// Send one chat message; traces sharing a session id form a conversation.
    #[command(after_help = r#"Examples:
  tracelab chat "Hello, I'm Ada." --session-id demo-1
  tracelab chat "What's my name?" --session-id demo-1
"#)]
    Chat {
        /// The user message.
        message: String,
        /// Session that groups this turn with earlier ones.
        #[arg(long, value_parser = parse_session_id)]
        session_id: String,
        #[command(flatten)]
        common: CommonArgs,
    },

    /// Answer a question from supplied context, traced as retrieval + generation.
    Rag {
        /// The question to answer.
        #[arg(long)]
        question: String,
        #[command(flatten)]
        context: ContextInput,
        /// Group this trace into a session.
        #[arg(long, value_parser = parse_session_id)]
        session_id: Option<String>,
        #[command(flatten)]
        common: CommonArgs,
    },
}

impl Commands {
    pub fn task(&self) -> &'static str {
        match self {
            Self::Summarize { .. } => "summarize",
            Self::Analyze { .. } => "analyze",
            Self::Chat { .. } => "chat",
            Self::Rag { .. } => "rag",
        }
    }

    pub fn common(&self) -> &CommonArgs {
        match self {
            Self::Summarize { common, .. }
            | Self::Analyze { common, .. }
            | Self::Chat { common, .. }
            | Self::Rag { common, .. } => common,
        }
    }

    pub fn session_id(&self) -> Option<&str> {
        match self {
            Self::Summarize { session_id, .. }
            | Self::Analyze { session_id, .. }
            | Self::Rag { session_id, .. } => session_id.as_deref(),
            Self::Chat { session_id, .. } => Some(session_id.as_str()),
        }
    }
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
pub struct TextInput {
    /// Input text.
    #[arg(long)]
    pub text: Option<String>,
    /// Read input text from a file.
    #[arg(long, value_name = "PATH")]
    pub file: Option<PathBuf>,
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
pub struct ContextInput {
    /// Context text.
    #[arg(long)]
    pub context: Option<String>,
    /// Read context from a file, verbatim.
    #[arg(long, value_name = "PATH")]
    pub context_file: Option<PathBuf>,
}

/// Trace attributes shared by every command.
#[derive(Args, Debug, Default)]
pub struct CommonArgs {
    /// Trace name (default: <task>-YYYYmmdd-HHMMSS).
    #[arg(long)]
    pub trace_name: Option<String>,
    /// Environment label, e.g. dev or production.
    #[arg(long = "env")]
    pub environment: Option<String>,
    /// Comma-separated tags.
    #[arg(long, value_delimiter = ',')]
    pub tags: Vec<String>,
    /// User id.
    #[arg(long = "user")]
    pub user_id: Option<String>,
    /// Metadata as a JSON object.
    #[arg(long, value_parser = parse_metadata)]
    pub metadata: Option<Map<String, Value>>,
    /// Release or version label.
    #[arg(long)]
    pub release: Option<String>,
}

impl CommonArgs {
    pub fn attributes(&self, session_id: Option<&str>) -> TraceAttributes {
        TraceAttributes::new()
            .environment_opt(self.environment.as_deref())
            .tags(
                self.tags
                    .iter()
                    .map(|t| t.trim())
                    .filter(|t| !t.is_empty()),
            )
            .user_id_opt(self.user_id.as_deref())
            .metadata(self.metadata.clone().unwrap_or_default())
            .release_opt(self.release.as_deref())
            .session_id_opt(session_id)
    }
}

pub fn parse_metadata(raw: &str) -> Result<Map<String, Value>, String> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(format!("expected a JSON object, got {}", json_type(&other))),
        Err(e) => Err(format!("invalid JSON: {e}")),
    }
}

pub fn parse_session_id(raw: &str) -> Result<String, String> {
    let id = raw.trim();
    if id.is_empty() {
        return Err("session id must not be blank".into());
    }
    Ok(id.to_string())
}

fn json_type(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

pub fn default_trace_name(task: &str) -> String {
    format!("{task}-{}", chrono::Local::now().format("%Y%m%d-%H%M%S"))
}
