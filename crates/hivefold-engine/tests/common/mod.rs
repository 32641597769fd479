//! Shared helpers for engine integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use hivefold_core::KeyPath;
use hivefold_engine::{bootstrap, Engine, EngineConfig, ExclusionList};
use hivefold_host_mock::MockHostRegistry;
use parking_lot::Mutex;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::Layer;

pub fn path(raw: &str) -> KeyPath {
    KeyPath::parse(raw).unwrap()
}

/// An engine over a fresh mock host.
pub struct Harness {
    pub host: Arc<MockHostRegistry>,
    pub exclusions: Arc<ExclusionList>,
    pub engine: Engine,
}

pub fn harness() -> Harness {
    harness_with(&EngineConfig::default())
}

pub fn harness_with(config: &EngineConfig) -> Harness {
    let host = Arc::new(MockHostRegistry::new());
    let exclusions = Arc::new(ExclusionList::new());
    let engine = bootstrap(config, host.clone(), exclusions.clone()).unwrap();
    Harness {
        host,
        exclusions,
        engine,
    }
}

// ========== Log capture ==========

/// One captured tracing event.
#[derive(Clone, Debug)]
pub struct CapturedEvent {
    pub level: Level,
    pub message: String,
    pub fields: Vec<(String, String)>,
}

impl CapturedEvent {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

struct EventVisitor<'a>(&'a mut CapturedEvent);

impl Visit for EventVisitor<'_> {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.0.message = format!("{:?}", value);
        } else {
            self.0
                .fields
                .push((field.name().to_string(), format!("{:?}", value)));
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.0.message = value.to_string();
        } else {
            self.0
                .fields
                .push((field.name().to_string(), value.to_string()));
        }
    }
}

/// A [`Layer`] that records every event it sees.
struct CaptureLayer {
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

impl<S: Subscriber> Layer<S> for CaptureLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut captured = CapturedEvent {
            level: *event.metadata().level(),
            message: String::new(),
            fields: Vec::new(),
        };
        event.record(&mut EventVisitor(&mut captured));
        self.events.lock().push(captured);
    }
}

/// Run `f` with a thread-local subscriber and return what it logged.
pub fn capture_logs<T>(f: impl FnOnce() -> T) -> (T, Vec<CapturedEvent>) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let subscriber = tracing_subscriber::registry().with(CaptureLayer {
        events: events.clone(),
    });
    let result = tracing::subscriber::with_default(subscriber, f);
    let events = events.lock().clone();
    (result, events)
}

pub fn count_at(events: &[CapturedEvent], level: Level, message: &str) -> usize {
    events
        .iter()
        .filter(|event| event.level == level && event.message.contains(message))
        .count()
}
