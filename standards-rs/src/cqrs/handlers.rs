//! Handler capabilities and the context passed to every handler call.

use std::any::type_name;

use async_trait::async_trait;
use standards_core::{CancellationSignal, DomainError, RequestContext};

use crate::cqrs::requests::{Command, DomainEvent, Query};

/// Per-unit-of-work context: cancellation plus tenant, user and correlation data.
#[derive(Clone, Debug, Default)]
pub struct DispatchContext {
    request: RequestContext,
    cancellation: CancellationSignal,
}

impl DispatchContext {
    pub fn new(request: RequestContext, cancellation: CancellationSignal) -> Self {
        Self {
            request,
            cancellation,
        }
    }

    /// Context that is never cancelled.
    pub fn from_request(request: RequestContext) -> Self {
        Self::new(request, CancellationSignal::never())
    }

    pub fn request(&self) -> &RequestContext {
        &self.request
    }

    pub fn cancellation(&self) -> &CancellationSignal {
        &self.cancellation
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    pub fn tenant_id(&self) -> Option<&str> {
        self.request.tenant_id()
    }

    pub fn user_id(&self) -> Option<&str> {
        self.request.user_id()
    }

    pub fn correlation_id(&self) -> Option<&str> {
        self.request.correlation_id_opt()
    }
}

#[async_trait]
pub trait CommandHandler<C: Command>: Send + Sync {
    async fn handle(&self, command: C, ctx: &DispatchContext) -> Result<C::Response, DomainError>;
}

#[async_trait]
pub trait QueryHandler<Q: Query>: Send + Sync {
    async fn handle(&self, query: Q, ctx: &DispatchContext) -> Result<Q::Response, DomainError>;
}

/// One of possibly many subscribers of `E`. A failure here never reaches the publisher.
#[async_trait]
pub trait EventHandler<E: DomainEvent>: Send + Sync {
    async fn handle(&self, event: &E, ctx: &DispatchContext) -> Result<(), DomainError>;

    /// Name used in logs.
    fn handler_type(&self) -> &'static str {
        type_name::<Self>()
    }
}
