//! Domain event fan-out: ordering, counts, failure isolation.

use std::fmt;
use std::sync::{Arc, Mutex};

use standards_rs::chrono::{DateTime, Utc};
use standards_rs::{
    async_trait, DispatchContext, DomainError, DomainEvent, DomainEventDispatcher, EventHandler, RegistryBuilder,
};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::Layer;

#[derive(Debug, DomainEvent)]
struct UserCreatedEvent {
    name: String,
    occurred_at: DateTime<Utc>,
}

#[derive(Debug, DomainEvent)]
struct UserDeletedEvent {
    occurred_at: DateTime<Utc>,
}

#[derive(Debug, DomainEvent)]
struct NobodyListensEvent {
    occurred_at: DateTime<Utc>,
}

type Journal = Arc<Mutex<Vec<String>>>;

fn record(journal: &Journal, entry: String) {
    journal.lock().unwrap().push(entry);
}

struct EmailHandler {
    journal: Journal,
}

#[async_trait]
impl EventHandler<UserCreatedEvent> for EmailHandler {
    async fn handle(&self, event: &UserCreatedEvent, _ctx: &DispatchContext) -> Result<(), DomainError> {
        record(&self.journal, format!("email:{}", event.name));
        Err(DomainError::internal("SmtpUnavailable"))
    }
}

struct AuditHandler {
    journal: Journal,
}

#[async_trait]
impl EventHandler<UserCreatedEvent> for AuditHandler {
    async fn handle(&self, event: &UserCreatedEvent, _ctx: &DispatchContext) -> Result<(), DomainError> {
        record(&self.journal, format!("audit:{}", event.name));
        Ok(())
    }
}

#[async_trait]
impl EventHandler<UserDeletedEvent> for AuditHandler {
    async fn handle(&self, _event: &UserDeletedEvent, _ctx: &DispatchContext) -> Result<(), DomainError> {
        record(&self.journal, "audit:deleted".to_string());
        Ok(())
    }
}

struct PanickingHandler;

#[async_trait]
impl EventHandler<UserDeletedEvent> for PanickingHandler {
    async fn handle(&self, _event: &UserDeletedEvent, _ctx: &DispatchContext) -> Result<(), DomainError> {
        panic!("subscriber bug");
    }
}

fn dispatcher(journal: &Journal) -> DomainEventDispatcher {
    let mut builder = RegistryBuilder::new();
    builder.container_mut().register_instance(Arc::clone(journal));
    builder
        .event_handler::<UserCreatedEvent, _, _>(|scope| EmailHandler {
            journal: scope.resolve().unwrap_or_default(),
        })
        .event_handler::<UserCreatedEvent, _, _>(|scope| AuditHandler {
            journal: scope.resolve().unwrap_or_default(),
        })
        .event_handler::<UserDeletedEvent, _, _>(|_| PanickingHandler)
        .event_handler::<UserDeletedEvent, _, _>(|scope| AuditHandler {
            journal: scope.resolve().unwrap_or_default(),
        });
    let registry = builder.build();
    assert_eq!(registry.event_handler_count::<UserCreatedEvent>(), 2);
    assert_eq!(registry.event_handler_count::<NobodyListensEvent>(), 0);
    DomainEventDispatcher::new(registry)
}

fn created(name: &str) -> Box<dyn DomainEvent> {
    Box::new(UserCreatedEvent {
        name: name.to_string(),
        occurred_at: Utc::now(),
    })
}

fn entries(journal: &Journal) -> Vec<String> {
    journal.lock().unwrap().clone()
}

#[tokio::test]
async fn failing_subscriber_does_not_stop_siblings() {
    let journal = Journal::default();
    let dispatcher = dispatcher(&journal);

    dispatcher
        .dispatch_events(vec![created("Ann")], &DispatchContext::default())
        .await;

    let entries = entries(&journal);
    assert_eq!(entries.len(), 2);
    assert!(entries.contains(&"email:Ann".to_string()));
    assert!(entries.contains(&"audit:Ann".to_string()));
}

#[tokio::test]
async fn panicking_subscriber_is_isolated() {
    let journal = Journal::default();
    let dispatcher = dispatcher(&journal);
    let deleted: Box<dyn DomainEvent> = Box::new(UserDeletedEvent { occurred_at: Utc::now() });

    dispatcher
        .dispatch_events(vec![deleted, created("Bob")], &DispatchContext::default())
        .await;

    let entries = entries(&journal);
    assert!(entries.contains(&"audit:deleted".to_string()));
    assert!(entries.contains(&"audit:Bob".to_string()));
}

#[tokio::test]
async fn events_are_processed_in_input_order() {
    let journal = Journal::default();
    let dispatcher = dispatcher(&journal);

    dispatcher
        .dispatch_events(vec![created("e1"), created("e2")], &DispatchContext::default())
        .await;

    let entries = entries(&journal);
    let last_e1 = entries.iter().rposition(|e| e.ends_with(":e1")).unwrap();
    let first_e2 = entries.iter().position(|e| e.ends_with(":e2")).unwrap();
    assert!(last_e1 < first_e2, "{entries:?}");
    assert_eq!(entries.len(), 4);
}

#[tokio::test]
async fn unsubscribed_and_empty_batches_complete() {
    let journal = Journal::default();
    let dispatcher = dispatcher(&journal);
    let ctx = DispatchContext::default();

    dispatcher.dispatch_events(Vec::new(), &ctx).await;
    dispatcher
        .dispatch_event(Box::new(NobodyListensEvent { occurred_at: Utc::now() }), &ctx)
        .await;
    assert!(entries(&journal).is_empty());
}

#[test]
fn derived_event_exposes_occurrence_time() {
    let at = Utc::now();
    let event = UserDeletedEvent { occurred_at: at };
    assert_eq!(event.occurred_at(), at);
}

/// Records (level, message) of every log event emitted while installed.
#[derive(Clone, Default)]
struct LogCapture(Arc<Mutex<Vec<(Level, String)>>>);

struct MessageVisitor(String);

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.0 = format!("{value:?}");
        }
    }
}

impl<S: Subscriber> Layer<S> for LogCapture {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = MessageVisitor(String::new());
        event.record(&mut visitor);
        self.0.lock().unwrap().push((*event.metadata().level(), visitor.0));
    }
}

#[tokio::test]
async fn every_event_is_logged_before_handler_lookup() {
    let capture = LogCapture::default();
    let _guard = tracing::subscriber::set_default(tracing_subscriber::registry().with(capture.clone()));
    let journal = Journal::default();
    let dispatcher = dispatcher(&journal);
    capture.0.lock().unwrap().clear();

    dispatcher
        .dispatch_event(Box::new(NobodyListensEvent { occurred_at: Utc::now() }), &DispatchContext::default())
        .await;

    let logs = capture.0.lock().unwrap().clone();
    let dispatching = logs
        .iter()
        .position(|(level, msg)| *level == Level::DEBUG && msg == "dispatching event")
        .expect("per-event debug log");
    let missing = logs
        .iter()
        .position(|(level, msg)| *level == Level::WARN && msg == "no handlers found for event")
        .expect("missing-handlers warning");
    assert!(dispatching < missing, "{logs:?}");
}

#[tokio::test]
async fn empty_batch_logs_nothing() {
    let capture = LogCapture::default();
    let _guard = tracing::subscriber::set_default(tracing_subscriber::registry().with(capture.clone()));
    let journal = Journal::default();
    let dispatcher = dispatcher(&journal);
    capture.0.lock().unwrap().clear();

    dispatcher.dispatch_events(Vec::new(), &DispatchContext::default()).await;

    assert!(capture.0.lock().unwrap().is_empty());
}
