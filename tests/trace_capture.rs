//! Captures the diagnostic events emitted on the allocation paths
//! and checks they fire in the documented order.

use std::sync::{Arc, Mutex};

use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
use tracing_subscriber::{EnvFilter, Registry};

use chunkfit::FirstFit;

/// Records the message of every event it sees.
#[derive(Clone, Default)]
struct RecordMessagesLayer {
    messages: Arc<Mutex<Vec<String>>>,
}

impl RecordMessagesLayer {
    fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.messages.lock().unwrap())
    }
}

struct MessageVisitor<'a> {
    messages: &'a mut Vec<String>,
}

impl Visit for MessageVisitor<'_> {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.messages.push(format!("{value:?}"));
        }
    }
}

impl<S: Subscriber> Layer<S> for RecordMessagesLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut messages = self.messages.lock().unwrap();
        event.record(&mut MessageVisitor { messages: &mut messages });
    }
}

fn position(messages: &[String], needle: &str) -> usize {
    messages
        .iter()
        .position(|m| m == needle)
        .unwrap_or_else(|| panic!("No {needle:?} event among {messages:?}."))
}

#[test]
fn trace_test_1() {
    let recorder = RecordMessagesLayer::default();
    let subscriber = Registry::default().with(recorder.clone());
    let _guard = tracing::subscriber::set_default(subscriber);

    let mut heap = FirstFit::with_chunk_capacity(256);
    heap.allocate(100).unwrap();

    let messages = recorder.take();
    let bootstrap = position(&messages, "Initializing first chunk.");
    let reserved = position(&messages, "Reserved chunk.");
    let found = position(&messages, "Found suitable block.");
    let split = position(&messages, "Splitting block.");

    assert!(bootstrap < reserved);
    assert!(reserved < found);
    assert!(found < split);
}

#[test]
fn trace_test_2() {
    let recorder = RecordMessagesLayer::default();
    let subscriber = Registry::default().with(recorder.clone());
    let _guard = tracing::subscriber::set_default(subscriber);

    let mut heap = FirstFit::with_chunk_capacity(256);
    heap.allocate(200).unwrap();
    heap.allocate(200).unwrap();

    let messages = recorder.take();

    // Only the very first allocation bootstraps the arena.
    assert_eq!(messages.iter().filter(|m| *m == "Initializing first chunk.").count(), 1);

    // The second allocation misses, grows, then succeeds from the new chunk.
    let miss = position(&messages, "No suitable block found, growing arena.");
    let found = messages
        .iter()
        .enumerate()
        .filter(|(_, m)| *m == "Found suitable block.")
        .map(|(i, _)| i)
        .last()
        .unwrap();
    assert!(miss < found);
    assert_eq!(messages.iter().filter(|m| *m == "Reserved chunk.").count(), 2);
}

#[test]
fn trace_test_3() {
    // A successful allocation emits no error events.
    let recorder = RecordMessagesLayer::default();
    let subscriber = Registry::default()
        .with(EnvFilter::new("chunkfit=error"))
        .with(recorder.clone());
    let _guard = tracing::subscriber::set_default(subscriber);

    let mut heap = FirstFit::new();
    heap.allocate(64).unwrap();
    assert_eq!(recorder.take(), Vec::<String>::new());
}

#[test]
fn trace_test_4() {
    // The debug directive lets the chunk bookkeeping through.
    let recorder = RecordMessagesLayer::default();
    let subscriber = Registry::default()
        .with(EnvFilter::new("chunkfit=debug"))
        .with(recorder.clone());
    let _guard = tracing::subscriber::set_default(subscriber);

    let mut heap = FirstFit::new();
    heap.allocate(64).unwrap();

    let messages = recorder.take();
    assert!(messages.iter().any(|m| m == "Reserved chunk."));
}
