//! Domain event fan-out. Events run in input order, subscribers in registration order,
//! and a failing subscriber is logged and skipped.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use standards_core::Scope;

use crate::cqrs::handlers::DispatchContext;
use crate::cqrs::registry::HandlerRegistry;
use crate::cqrs::requests::{DomainEvent, EventAny};

/// Delivers domain events to every subscribed handler; one per unit of work.
pub struct DomainEventDispatcher {
    registry: Arc<HandlerRegistry>,
    scope: Arc<Scope>,
}

impl DomainEventDispatcher {
    pub fn new(registry: Arc<HandlerRegistry>) -> Self {
        let scope = Arc::new(registry.create_scope());
        Self::with_scope(registry, scope)
    }

    pub fn with_scope(registry: Arc<HandlerRegistry>, scope: Arc<Scope>) -> Self {
        Self { registry, scope }
    }

    pub async fn dispatch_event(&self, event: Box<dyn DomainEvent>, ctx: &DispatchContext) {
        self.dispatch_events(vec![event], ctx).await
    }

    /// Deliver every event to all of its subscribers. Never fails; failures are logged.
    pub async fn dispatch_events(&self, events: Vec<Box<dyn DomainEvent>>, ctx: &DispatchContext) {
        if events.is_empty() {
            return;
        }
        let count = events.len();
        tracing::info!(count, correlation_id = ctx.correlation_id(), "dispatching domain events");
        for event in &events {
            self.deliver(&**event, ctx).await;
        }
        tracing::info!(count, "finished dispatching domain events");
    }

    async fn deliver(&self, event: &dyn DomainEvent, ctx: &DispatchContext) {
        let event_type = EventAny::event_type_name(event);
        let payload = EventAny::as_event_any(event);
        tracing::debug!(event_type, "dispatching event");
        let Some(entry) = self.registry.event((*payload).type_id()) else {
            tracing::warn!(event_type, "no handlers found for event");
            return;
        };
        let handlers = match entry.resolver.resolve(&self.scope) {
            Ok(handlers) => handlers,
            Err(err) => {
                tracing::error!(event_type, error = %err, "could not resolve event handlers");
                return;
            }
        };
        if handlers.is_empty() {
            tracing::warn!(event_type, "no handlers found for event");
            return;
        }
        tracing::debug!(event_type, handler_count = handlers.len(), "found handlers for event");

        for handler in &handlers {
            let handler_type = handler.handler_type();
            let outcome = AssertUnwindSafe(handler.handle(payload, ctx))
                .catch_unwind()
                .await;
            match outcome {
                Ok(Ok(())) => {
                    tracing::debug!(event_type, handler_type, "event handled");
                }
                Ok(Err(err)) => {
                    tracing::error!(event_type, handler_type, error = %err, "error handling event");
                }
                Err(panic) => {
                    let message = panic
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_default();
                    tracing::error!(event_type, handler_type, panic = %message, "event handler panicked");
                }
            }
        }
    }
}
