// SPDX-License-Identifier: MIT OR Apache-2.0
//! Records emitted by the sink, observed through a capturing subscriber.

use faultline::{Code, Fault};
use serial_test::serial;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id, Record};
use tracing::{Event, Level, Metadata, Subscriber};

#[derive(Clone, Default)]
struct Captured {
    level: Option<Level>,
    message: String,
    fields: HashMap<String, String>,
}

struct CaptureSubscriber {
    events: Arc<Mutex<Vec<Captured>>>,
}

impl Subscriber for CaptureSubscriber {
    fn enabled(&self, _: &Metadata<'_>) -> bool {
        true
    }

    fn new_span(&self, _: &Attributes<'_>) -> Id {
        Id::from_u64(1)
    }

    fn record(&self, _: &Id, _: &Record<'_>) {}

    fn record_follows_from(&self, _: &Id, _: &Id) {}

    fn event(&self, event: &Event<'_>) {
        let mut captured = Captured {
            level: Some(*event.metadata().level()),
            ..Captured::default()
        };
        event.record(&mut FieldCollector(&mut captured));
        self.events.lock().unwrap().push(captured);
    }

    fn enter(&self, _: &Id) {}

    fn exit(&self, _: &Id) {}
}

struct FieldCollector<'a>(&'a mut Captured);

impl Visit for FieldCollector<'_> {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        let rendered = format!("{value:?}");
        if field.name() == "message" {
            self.0.message = rendered;
        } else {
            self.0.fields.insert(field.name().to_owned(), rendered);
        }
    }
}

fn capture(run: impl FnOnce()) -> Vec<Captured> {
    let events = Arc::new(Mutex::new(Vec::new()));
    let subscriber = CaptureSubscriber {
        events: Arc::clone(&events),
    };
    tracing::subscriber::with_default(subscriber, run);
    let captured = events.lock().unwrap().clone();
    captured
}

#[test]
#[serial]
fn one_record_with_rendered_message_and_flattened_fields() {
    let root = Fault::bad_input("invalid id", None).with_detail("id", "x");
    let fault = Fault::wrap(root, Code::NEUTRAL, "handle request", None);

    let events = capture(|| faultline_log::log(&fault));

    assert_eq!(events.len(), 1);
    let record = &events[0];
    assert_eq!(record.level, Some(Level::ERROR));
    assert_eq!(record.message, "handle request: invalid id");
    assert_eq!(record.fields["code"], "bad-input");

    let fields: serde_json::Value = serde_json::from_str(&record.fields["fields"]).unwrap();
    assert_eq!(fields["1/id"], serde_json::json!("x"));
    assert_eq!(fields["x_code"], serde_json::json!("bad-input"));
}

#[test]
#[serial]
fn translator_routes_severity() {
    faultline_log::set_level_translator(Box::new(|code| {
        if *code == Code::NOT_FOUND {
            Level::INFO
        } else {
            Level::ERROR
        }
    }));

    let events = capture(|| {
        faultline_log::log(&Fault::not_found("no such user", None));
        faultline_log::log(&Fault::internal("db down", None));
    });

    faultline_log::set_level_translator(Box::new(|_| Level::ERROR));

    assert_eq!(events[0].level, Some(Level::INFO));
    assert_eq!(events[1].level, Some(Level::ERROR));
}

#[test]
#[serial]
fn wrap_and_log_adds_context_level() {
    let events = capture(|| {
        faultline_log::wrap_and_log(Fault::bad_input("invalid id", None), "handle request");
    });

    assert_eq!(events.len(), 1);
    assert_eq!(events[0].message, "handle request: invalid id");
}

#[test]
#[serial]
fn log_at_overrides_resolved_level() {
    let events = capture(|| {
        faultline_log::log_at(Level::DEBUG, &Fault::internal("noisy", None));
    });

    assert_eq!(events[0].level, Some(Level::DEBUG));
}

#[test]
#[serial]
fn emits_under_a_fmt_subscriber_without_panicking() {
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(Level::ERROR)
        .finish();
    tracing::subscriber::with_default(subscriber, || {
        faultline_log::log(&Fault::internal("smoke", None));
    });
}
