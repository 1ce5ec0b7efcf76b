//! Trace model and submission.
//!
//! Agents build `Observation` trees; the caller wraps them in a `Trace` and
//! hands it to a `Tracer`. Nothing leaves the process until `Tracer::flush`,
//! which drains the buffer through a `TraceSink` (Langfuse over HTTP, or the
//! in-memory sink for tests and dry runs).

pub mod keys;
pub mod langfuse;
pub mod types;
#[cfg(test)]
pub mod test_span;

pub use keys::*;
pub use langfuse::LangfuseSink;
pub use types::*;

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::{CoreResult, TraceLabError};

/// One event the backend refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventError {
    pub id: String,
    pub status: u16,
    pub message: String,
}

/// Outcome of one submission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmitReport {
    pub traces: usize,
    pub events: usize,
    pub errors: Vec<EventError>,
}

impl SubmitReport {
    /// Some events were rejected while the request itself succeeded.
    pub fn is_partial(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Where flushed traces go.
///
/// `submit` receives every buffered trace at once and should send them as a
/// single request where the backend allows it.
#[async_trait]
pub trait TraceSink: Send + Sync {
    fn name(&self) -> &str;
    async fn submit(&self, traces: &[Trace]) -> CoreResult<SubmitReport>;
}

/// Explicit tracing handle. Buffers traces until `flush`.
pub struct Tracer {
    sink: Arc<dyn TraceSink>,
    host: String,
    buffer: Mutex<Vec<Trace>>,
}

impl std::fmt::Debug for Tracer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tracer")
            .field("sink", &self.sink.name())
            .field("host", &self.host)
            .field("pending", &self.pending())
            .finish()
    }
}

impl Tracer {
    /// `host` is the backend UI base, used only for the printed links.
    pub fn new(sink: Arc<dyn TraceSink>, host: impl Into<String>) -> Self {
        Self {
            sink,
            host: host.into().trim_end_matches('/').to_string(),
            buffer: Mutex::new(Vec::new()),
        }
    }

    pub fn record(&self, trace: Trace) {
        tracing::debug!(
            trace.id = %trace.id,
            trace.name = %trace.name,
            session.id = trace.attributes.session_id.as_deref().unwrap_or(""),
            observations = trace.observation_count(),
            "trace recorded"
        );
        self.buffer
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(trace);
    }

    pub fn pending(&self) -> usize {
        self.buffer.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Drain the buffer through the sink. An empty buffer is not sent.
    ///
    /// The buffer is emptied even when submission fails; a flush is never retried.
    pub async fn flush(&self) -> CoreResult<SubmitReport> {
        let batch: Vec<Trace> =
            std::mem::take(&mut *self.buffer.lock().unwrap_or_else(|e| e.into_inner()));
        if batch.is_empty() {
            return Ok(SubmitReport::default());
        }
        let report = self.sink.submit(&batch).await?;
        tracing::debug!(
            sink = self.sink.name(),
            traces = report.traces,
            events = report.events,
            rejected = report.errors.len(),
            "traces flushed"
        );
        Ok(report)
    }

    pub fn traces_url(&self) -> String {
        format!("{}/traces", self.host)
    }

    pub fn sessions_url(&self) -> String {
        format!("{}/sessions", self.host)
    }
}

/// Keeps submitted traces in memory. Stands in for the backend in tests and
/// `--dry-run`.
#[derive(Default)]
pub struct MemorySink {
    traces: Mutex<Vec<Trace>>,
    submissions: Mutex<usize>,
    fail_with: Option<String>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink whose every submission fails with `Tracing(message)`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            fail_with: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn traces(&self) -> Vec<Trace> {
        self.traces.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Number of `submit` calls, successful or not.
    pub fn submissions(&self) -> usize {
        *self.submissions.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl TraceSink for MemorySink {
    fn name(&self) -> &str {
        "memory"
    }

    async fn submit(&self, traces: &[Trace]) -> CoreResult<SubmitReport> {
        *self.submissions.lock().unwrap_or_else(|e| e.into_inner()) += 1;
        if let Some(msg) = &self.fail_with {
            return Err(TraceLabError::Tracing(msg.clone()));
        }
        for t in traces {
            match serde_json::to_string_pretty(t) {
                Ok(json) => tracing::debug!(trace.id = %t.id, "dry-run trace\n{json}"),
                Err(e) => tracing::warn!(trace.id = %t.id, error = %e, "trace not serializable"),
            }
        }
        let events = traces.iter().map(|t| 1 + t.observation_count()).sum();
        self.traces
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .extend_from_slice(traces);
        Ok(SubmitReport {
            traces: traces.len(),
            events,
            errors: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracer_with(sink: Arc<MemorySink>) -> Tracer {
        Tracer::new(sink, "https://cloud.langfuse.com/")
    }

    #[tokio::test]
    async fn flush_drains_buffer_once() {
        let sink = Arc::new(MemorySink::new());
        let tracer = tracer_with(sink.clone());
        tracer.record(Trace::new("a").observation(Observation::generation("g")));
        tracer.record(Trace::new("b"));
        assert_eq!(tracer.pending(), 2);

        let report = tracer.flush().await.expect("flush ok");
        assert_eq!(report.traces, 2);
        assert_eq!(report.events, 3);
        assert!(!report.is_partial());
        assert_eq!(tracer.pending(), 0);
        assert_eq!(sink.traces().len(), 2);

        // nothing buffered: no second submission
        tracer.flush().await.expect("empty flush ok");
        assert_eq!(sink.submissions(), 1);
    }

    #[tokio::test]
    async fn failed_flush_still_empties_buffer() {
        let sink = Arc::new(MemorySink::failing("backend down"));
        let tracer = tracer_with(sink.clone());
        tracer.record(Trace::new("a"));
        let err = tracer.flush().await.unwrap_err();
        assert!(matches!(err, TraceLabError::Tracing(_)));
        assert_eq!(err.kind(), "tracing");
        assert_eq!(tracer.pending(), 0);
        assert_eq!(sink.submissions(), 1);
    }

    #[test]
    fn urls_use_host_without_trailing_slash() {
        let tracer = tracer_with(Arc::new(MemorySink::new()));
        assert_eq!(tracer.traces_url(), "https://cloud.langfuse.com/traces");
        assert_eq!(tracer.sessions_url(), "https://cloud.langfuse.com/sessions");
    }
}
