use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// What an observation records. Only generations carry model and usage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObservationKind {
    Generation,
    Tool,
    Retrieval,
    Span,
}

impl ObservationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Generation => "generation",
            Self::Tool => "tool",
            Self::Retrieval => "retrieval",
            Self::Span => "span",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Level {
    #[default]
    Default,
    Warning,
    Error,
}

/// Token counts reported by the model server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Usage {
    pub input: u32,
    pub output: u32,
}

impl Usage {
    pub fn new(input: u32, output: u32) -> Self {
        Self { input, output }
    }

    pub fn total(&self) -> u32 {
        self.input + self.output
    }

    pub fn add(self, other: Usage) -> Usage {
        Usage {
            input: self.input + other.input,
            output: self.output + other.output,
        }
    }
}

/// One recorded step of a trace. Children are owned, so a child always
/// belongs to the same trace as its parent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub id: String,
    pub kind: ObservationKind,
    pub name: String,
    pub input: Value,
    pub output: Value,
    pub model: Option<String>,
    pub usage: Option<Usage>,
    pub level: Level,
    pub status_message: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Observation>,
}

impl Observation {
    pub fn new(kind: ObservationKind, name: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            kind,
            name: name.into(),
            input: Value::Null,
            output: Value::Null,
            model: None,
            usage: None,
            level: Level::Default,
            status_message: None,
            metadata: Map::new(),
            start_time: Utc::now(),
            end_time: None,
            children: Vec::new(),
        }
    }

    pub fn generation(name: impl Into<String>) -> Self {
        Self::new(ObservationKind::Generation, name)
    }
    pub fn tool(name: impl Into<String>) -> Self {
        Self::new(ObservationKind::Tool, name)
    }
    pub fn retrieval(name: impl Into<String>) -> Self {
        Self::new(ObservationKind::Retrieval, name)
    }
    pub fn span(name: impl Into<String>) -> Self {
        Self::new(ObservationKind::Span, name)
    }

    pub fn input(mut self, v: impl Into<Value>) -> Self {
        self.input = v.into();
        self
    }
    pub fn output(mut self, v: impl Into<Value>) -> Self {
        self.output = v.into();
        self
    }
    pub fn model(mut self, model: &str) -> Self {
        self.model = Some(model.to_string());
        self
    }
    pub fn usage(mut self, usage: Usage) -> Self {
        self.usage = Some(usage);
        self
    }
    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }
    pub fn status_message(mut self, msg: impl Into<String>) -> Self {
        self.status_message = Some(msg.into());
        self
    }
    pub fn meta(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }
    /// Mark as failed: `Error` level with the message as status.
    pub fn error(self, msg: impl Into<String>) -> Self {
        self.level(Level::Error).status_message(msg)
    }
    pub fn child(mut self, child: Observation) -> Self {
        self.children.push(child);
        self
    }
    pub fn children(mut self, children: impl IntoIterator<Item = Observation>) -> Self {
        self.children.extend(children);
        self
    }
    /// Stamp the end time. Idempotent.
    pub fn end(mut self) -> Self {
        if self.end_time.is_none() {
            self.end_time = Some(Utc::now());
        }
        self
    }

    /// This observation plus all descendants.
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(Observation::count).sum::<usize>()
    }
}

/// Caller-supplied trace attributes.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TraceAttributes {
    pub environment: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub user_id: Option<String>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    pub release: Option<String>,
    pub session_id: Option<String>,
}

impl TraceAttributes {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn environment_opt(mut self, v: Option<&str>) -> Self {
        self.environment = v.map(|s| s.to_string());
        self
    }
    pub fn tags(mut self, tags: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }
    pub fn user_id_opt(mut self, v: Option<&str>) -> Self {
        self.user_id = v.map(|s| s.to_string());
        self
    }
    pub fn metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }
    pub fn release_opt(mut self, v: Option<&str>) -> Self {
        self.release = v.map(|s| s.to_string());
        self
    }
    pub fn session_id(mut self, v: impl Into<String>) -> Self {
        self.session_id = Some(v.into());
        self
    }
    pub fn session_id_opt(mut self, v: Option<&str>) -> Self {
        self.session_id = v.map(|s| s.to_string());
        self
    }
}

/// One end-to-end operation submitted to the tracing backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    pub id: String,
    pub name: String,
    pub timestamp: DateTime<Utc>,
    pub input: Value,
    pub output: Value,
    pub attributes: TraceAttributes,
    #[serde(default)]
    pub observations: Vec<Observation>,
}

impl Trace {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            name: name.into(),
            timestamp: Utc::now(),
            input: Value::Null,
            output: Value::Null,
            attributes: TraceAttributes::default(),
            observations: Vec::new(),
        }
    }

    pub fn input(mut self, v: impl Into<Value>) -> Self {
        self.input = v.into();
        self
    }
    pub fn output(mut self, v: impl Into<Value>) -> Self {
        self.output = v.into();
        self
    }
    pub fn attributes(mut self, attrs: TraceAttributes) -> Self {
        self.attributes = attrs;
        self
    }
    pub fn observation(mut self, o: Observation) -> Self {
        self.observations.push(o);
        self
    }
    pub fn observations(mut self, os: impl IntoIterator<Item = Observation>) -> Self {
        self.observations.extend(os);
        self
    }

    /// Total observations at every depth.
    pub fn observation_count(&self) -> usize {
        self.observations.iter().map(Observation::count).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn observation_builders_and_counts() {
        let gen_obs = Observation::generation("analyze")
            .model("llama3.1")
            .usage(Usage::new(10, 5).add(Usage::new(1, 2)))
            .child(Observation::tool("count_words").input(json!({"text": "a b"})))
            .child(Observation::tool("extract_keywords").error("bad args"))
            .end();
        assert_eq!(gen_obs.count(), 3);
        assert_eq!(gen_obs.usage.unwrap().total(), 18);
        assert_eq!(gen_obs.children[1].level, Level::Error);
        assert_eq!(gen_obs.children[1].status_message.as_deref(), Some("bad args"));
        assert!(gen_obs.end_time.is_some());

        let trace = Trace::new("t1").observation(gen_obs).observation(Observation::span("s"));
        assert_eq!(trace.observation_count(), 4);
    }

    #[test]
    fn trace_serializes() {
        let mut meta = Map::new();
        meta.insert("k".into(), json!(1));
        let trace = Trace::new("t1")
            .input("hi")
            .attributes(
                TraceAttributes::new()
                    .environment_opt(Some("dev"))
                    .tags(["a", "b"])
                    .metadata(meta)
                    .session_id("s-1"),
            )
            .observation(Observation::retrieval("retrieve-context"));

        let v = serde_json::to_value(&trace).unwrap();
        assert_eq!(v["name"], json!("t1"));
        assert_eq!(v["input"], json!("hi"));
        assert_eq!(v["attributes"]["tags"], json!(["a", "b"]));
        assert_eq!(v["attributes"]["metadata"]["k"], json!(1));
        assert_eq!(v["attributes"]["session_id"], json!("s-1"));
        assert_eq!(v["observations"][0]["kind"], json!("retrieval"));
        assert_eq!(v["observations"][0]["level"], json!("DEFAULT"));
        assert_eq!(Uuid::parse_str(&trace.id).map(|u| u.get_version_num()).unwrap(), 4);
    }
}
