use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::Utc;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use uuid::Uuid;

use crate::config::{HttpCfg, LangfuseCfg};
use crate::error::CoreResult;
use crate::http_client::{HttpClient, RequestCtx, truncate};
use crate::telemetry::keys::*;
use crate::telemetry::{EventError, Observation, ObservationKind, SubmitReport, Trace, TraceSink};

/// Sends traces to Langfuse's public ingestion endpoint as one batch.
#[derive(Clone)]
pub struct LangfuseSink {
    http: HttpClient,
    host: String,
    public_key: SecretString,
    secret_key: SecretString,
}

impl std::fmt::Debug for LangfuseSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LangfuseSink")
            .field("host", &self.host)
            .finish_non_exhaustive()
    }
}

impl LangfuseSink {
    pub fn new(http: HttpClient, cfg: &LangfuseCfg) -> Self {
        Self {
            http,
            host: cfg.host.clone(),
            public_key: cfg.public_key.clone(),
            secret_key: cfg.secret_key.clone(),
        }
    }

    pub fn from_settings(cfg: &LangfuseCfg, http: &HttpCfg) -> CoreResult<Self> {
        Ok(Self::new(HttpClient::new("langfuse", http)?, cfg))
    }

    fn basic_auth(&self) -> String {
        let pair = format!(
            "{}:{}",
            self.public_key.expose_secret(),
            self.secret_key.expose_secret()
        );
        format!("Basic {}", STANDARD.encode(pair))
    }
}

// ---- Wire structs ----
#[derive(Serialize)]
struct IngestionBatch {
    batch: Vec<IngestionEvent>,
}

#[derive(Debug, Serialize)]
pub(crate) struct IngestionEvent {
    id: String,
    timestamp: String,
    #[serde(rename = "type")]
    kind: &'static str,
    body: Value,
}

#[derive(Deserialize, Default)]
struct IngestionResp {
    #[serde(default)]
    successes: Vec<Value>,
    #[serde(default)]
    errors: Vec<IngestionErr>,
}

#[derive(Deserialize)]
struct IngestionErr {
    #[serde(default)]
    id: String,
    #[serde(default)]
    status: u16,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<Value>,
}

fn event(kind: &'static str, body: Value) -> IngestionEvent {
    IngestionEvent {
        id: Uuid::new_v4().to_string(),
        timestamp: Utc::now().to_rfc3339(),
        kind,
        body,
    }
}

/// `null` fields are dropped so the backend keeps its defaults.
fn compact(mut body: Value) -> Value {
    if let Value::Object(map) = &mut body {
        map.retain(|_, v| !v.is_null());
    }
    body
}

/// Flatten traces into ingestion events: the trace first, then its
/// observations depth-first with parent ids derived from the tree.
pub(crate) fn to_events(traces: &[Trace]) -> Vec<IngestionEvent> {
    let mut out = Vec::new();
    for t in traces {
        let a = &t.attributes;
        out.push(event(
            EVENT_TRACE_CREATE,
            compact(json!({
                "id": t.id,
                "timestamp": t.timestamp.to_rfc3339(),
                "name": t.name,
                "input": t.input,
                "output": t.output,
                "sessionId": a.session_id,
                "userId": a.user_id,
                "release": a.release,
                "environment": a.environment,
                "tags": a.tags,
                "metadata": a.metadata,
            })),
        ));
        for o in &t.observations {
            push_observation(&mut out, t, o, None);
        }
    }
    out
}

fn push_observation(out: &mut Vec<IngestionEvent>, t: &Trace, o: &Observation, parent: Option<&str>) {
    let mut metadata: Map<String, Value> = o.metadata.clone();
    metadata.insert(META_OBSERVATION_TYPE.into(), json!(o.kind.as_str()));

    let mut body = json!({
        "id": o.id,
        "traceId": t.id,
        "parentObservationId": parent,
        "name": o.name,
        "startTime": o.start_time.to_rfc3339(),
        "endTime": o.end_time.map(|e| e.to_rfc3339()),
        "input": o.input,
        "output": o.output,
        "level": o.level,
        "statusMessage": o.status_message,
        "environment": t.attributes.environment,
        "metadata": metadata,
    });
    let kind = if o.kind == ObservationKind::Generation {
        if let Value::Object(map) = &mut body {
            map.insert("model".into(), json!(o.model));
            if let Some(u) = o.usage {
                map.insert(
                    "usage".into(),
                    json!({"input": u.input, "output": u.output, "total": u.total(), "unit": "TOKENS"}),
                );
            }
        }
        EVENT_GENERATION_CREATE
    } else {
        EVENT_SPAN_CREATE
    };
    out.push(event(kind, compact(body)));
    for c in &o.children {
        push_observation(out, t, c, Some(&o.id));
    }
}

#[async_trait]
impl TraceSink for LangfuseSink {
    fn name(&self) -> &str {
        "langfuse"
    }

    async fn submit(&self, traces: &[Trace]) -> CoreResult<SubmitReport> {
        let batch = IngestionBatch {
            batch: to_events(traces),
        };
        let events = batch.batch.len();
        let url = format!("{}/api/public/ingestion", self.host);
        let auth = self.basic_auth();
        let ctx = RequestCtx {
            trace_id: traces.first().map(|t| t.id.as_str()),
        };
        let (resp, latency_ms) = self
            .http
            .post_json::<_, IngestionResp>(&url, &batch, &[("Authorization", auth.as_str())], &ctx)
            .await?;

        let errors: Vec<EventError> = resp
            .errors
            .into_iter()
            .map(|e| EventError {
                id: e.id,
                status: e.status,
                message: e
                    .message
                    .or_else(|| e.error.map(|v| truncate(&v.to_string(), 300)))
                    .unwrap_or_default(),
            })
            .collect();
        if !errors.is_empty() {
            tracing::warn!(
                sink = "langfuse",
                rejected = errors.len(),
                accepted = resp.successes.len(),
                "ingestion partially rejected"
            );
        }
        tracing::debug!(sink = "langfuse", events, latency.ms = latency_ms, "ingestion batch sent");
        Ok(SubmitReport {
            traces: traces.len(),
            events,
            errors,
        })
    }
}
