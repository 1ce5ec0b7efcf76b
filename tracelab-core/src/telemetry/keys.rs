/// Metadata keys written onto ingestion events.
/// Keep these stable; dashboards and saved filters match on them.
pub const META_OBSERVATION_TYPE: &str = "observation_type";
pub const META_PROVIDER: &str = "provider";
pub const META_STOP_REASON: &str = "stop_reason";
pub const META_LATENCY_MS: &str = "latency_ms";
pub const META_TOOL_CALLS: &str = "tool_calls";

/// Keys merged into a failed trace's output.
pub const KEY_ERROR_KIND: &str = "error.kind";
pub const KEY_ERROR_MESSAGE: &str = "error.message";

/// Langfuse ingestion event types.
pub const EVENT_TRACE_CREATE: &str = "trace-create";
pub const EVENT_GENERATION_CREATE: &str = "generation-create";
pub const EVENT_SPAN_CREATE: &str = "span-create";
