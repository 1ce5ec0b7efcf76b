#![cfg(test)]

//! Span capture for asserting what agents put on their `tracing` spans.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::{Subscriber, span};
use tracing_core::field::{Field, Visit};
use tracing_subscriber::registry::{self, LookupSpan};
use tracing_subscriber::{Layer, layer::Context};

#[derive(Debug, Clone, Default)]
pub struct CapturedSpan {
    pub name: String,
    pub fields: HashMap<String, String>,
}

#[derive(Default, Debug)]
pub struct SpanStore {
    spans: Mutex<Vec<(span::Id, CapturedSpan)>>,
}

impl SpanStore {
    /// First span with this name, fields as recorded so far.
    pub fn find(&self, name: &str) -> Option<CapturedSpan> {
        self.spans
            .lock()
            .unwrap()
            .iter()
            .find(|(_, s)| s.name == name)
            .map(|(_, s)| s.clone())
    }

    pub fn names(&self) -> Vec<String> {
        self.spans.lock().unwrap().iter().map(|(_, s)| s.name.clone()).collect()
    }
}

struct FieldVisitor<'a>(&'a mut HashMap<String, String>);

impl Visit for FieldVisitor<'_> {
    fn record_debug(&mut self, field: &Field, value: &dyn core::fmt::Debug) {
        self.0.insert(field.name().to_string(), format!("{value:?}"));
    }
    fn record_str(&mut self, field: &Field, value: &str) {
        self.0.insert(field.name().to_string(), value.to_string());
    }
    fn record_i64(&mut self, field: &Field, value: i64) {
        self.0.insert(field.name().to_string(), value.to_string());
    }
    fn record_u64(&mut self, field: &Field, value: u64) {
        self.0.insert(field.name().to_string(), value.to_string());
    }
    fn record_bool(&mut self, field: &Field, value: bool) {
        self.0.insert(field.name().to_string(), value.to_string());
    }
}

#[derive(Clone)]
struct CaptureLayer {
    store: Arc<SpanStore>,
}

impl<S> Layer<S> for CaptureLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &span::Attributes<'_>, id: &span::Id, _ctx: Context<'_, S>) {
        let mut span = CapturedSpan {
            name: attrs.metadata().name().to_string(),
            ..Default::default()
        };
        attrs.record(&mut FieldVisitor(&mut span.fields));
        self.store.spans.lock().unwrap().push((id.clone(), span));
    }

    // Fields declared `Empty` and filled in later arrive here.
    fn on_record(&self, id: &span::Id, values: &span::Record<'_>, _ctx: Context<'_, S>) {
        let mut spans = self.store.spans.lock().unwrap();
        if let Some((_, span)) = spans.iter_mut().rev().find(|(sid, _)| sid == id) {
            values.record(&mut FieldVisitor(&mut span.fields));
        }
    }
}

/// Install a capturing subscriber for the current thread until the guard drops.
///
/// Use with `#[tokio::test]` (current-thread runtime) so the agent's spans land
/// on the same thread.
pub fn install_capture() -> (Arc<SpanStore>, tracing::subscriber::DefaultGuard) {
    use tracing_subscriber::prelude::*;
    let store = Arc::new(SpanStore::default());
    let subscriber = registry::Registry::default().with(CaptureLayer { store: store.clone() });
    let guard = tracing::subscriber::set_default(subscriber);
    (store, guard)
}
