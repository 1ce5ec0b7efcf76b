use thiserror::Error;

/// Core error type for tracelab.
/// Internally, modules can use `anyhow::Result<T>` for convenience,
/// but public boundaries should expose `CoreResult<T>` with this error.
#[derive(Debug, Error)]
pub enum TraceLabError {
    #[error(
        "missing required environment variables: {}. Set them in your .env file or environment",
        .0.join(", ")
    )]
    MissingConfig(Vec<String>),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error(
        "{service} unavailable at {endpoint}; ensure the server is running and the base URL is correct"
    )]
    Unavailable { service: String, endpoint: String },

    #[error("rate limited by {service}")]
    RateLimited {
        service: String,
        retry_after: Option<u64>,
    },

    #[error("upstream error from {service}: {code} {message}")]
    Upstream {
        service: String,
        code: String,
        message: String,
    },

    #[error("tool `{tool}` could not be invoked: {message}")]
    ToolInvocation { tool: String, message: String },

    #[error("trace submission failed: {0}")]
    Tracing(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TraceLabError {
    /// Stable short name, used as a log field and as the status of failed traces.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingConfig(_) | Self::Config(_) => "config",
            Self::Validation(_) => "validation",
            Self::Unavailable { .. } => "unavailable",
            Self::RateLimited { .. } => "rate_limited",
            Self::Upstream { .. } => "upstream",
            Self::ToolInvocation { .. } => "tool_invocation",
            Self::Tracing(_) => "tracing",
            Self::Io(_) => "io",
            Self::Other(_) => "other",
        }
    }

    /// True for failures talking to a remote endpoint.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Unavailable { .. } | Self::RateLimited { .. } | Self::Upstream { .. }
        )
    }
}

pub type CoreResult<T> = std::result::Result<T, TraceLabError>;
