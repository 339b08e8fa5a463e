//! Command/query dispatch: one handler per concrete request type, errors passed through.

use std::any::{type_name, Any, TypeId};
use std::sync::Arc;

use http::StatusCode;
use standards_core::{ContainerError, DomainError, ErrorCode, Scope};
use thiserror::Error;

use crate::cqrs::handlers::DispatchContext;
use crate::cqrs::registry::{HandlerRegistry, RequestKind};
use crate::cqrs::requests::{AsAny, Command, Query};

#[derive(Error, Debug)]
pub enum DispatchError {
    /// Wiring defect: nothing registered for the request type. Never retried.
    #[error("no {kind} handler registered for {request_type}")]
    NoHandler {
        request_type: &'static str,
        kind: RequestKind,
    },
    #[error("{kind} handler for {request_type} could not be resolved: {source}")]
    Unresolved {
        request_type: &'static str,
        kind: RequestKind,
        #[source]
        source: ContainerError,
    },
    #[error("{kind} handler for {request_type} received or returned a value of another type")]
    TypeMismatch {
        request_type: &'static str,
        kind: RequestKind,
    },
    #[error(transparent)]
    Handler(#[from] DomainError),
}

impl DispatchError {
    pub(crate) fn unresolved<R>(kind: RequestKind, source: ContainerError) -> Self {
        DispatchError::Unresolved {
            request_type: type_name::<R>(),
            kind,
            source,
        }
    }

    pub(crate) fn mismatch<R>(kind: RequestKind) -> Self {
        DispatchError::TypeMismatch {
            request_type: type_name::<R>(),
            kind,
        }
    }

    /// Configuration errors are deployment defects, not user errors.
    pub fn is_configuration_error(&self) -> bool {
        !matches!(self, DispatchError::Handler(_))
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            DispatchError::Handler(err) => err.code(),
            _ => ErrorCode::InternalError,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.code().status()
    }
}

impl From<DispatchError> for DomainError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::Handler(err) => err,
            other => DomainError::internal_from(other.to_string(), other),
        }
    }
}

/// Routes a request to the single handler registered for its runtime type.
/// One per unit of work; handler instances come from its scope.
pub struct CommandQueryDispatcher {
    registry: Arc<HandlerRegistry>,
    scope: Arc<Scope>,
}

impl CommandQueryDispatcher {
    pub fn new(registry: Arc<HandlerRegistry>) -> Self {
        let scope = Arc::new(registry.create_scope());
        Self::with_scope(registry, scope)
    }

    /// Share a scope with other dispatchers of the same unit of work.
    pub fn with_scope(registry: Arc<HandlerRegistry>, scope: Arc<Scope>) -> Self {
        Self { registry, scope }
    }

    pub fn scope(&self) -> &Arc<Scope> {
        &self.scope
    }

    pub async fn dispatch_command<C: Command>(
        &self,
        command: C,
        ctx: &DispatchContext,
    ) -> Result<C::Response, DispatchError> {
        self.dispatch_boxed_command(Box::new(command), ctx).await
    }

    /// Dispatch by the runtime type behind the box, not the declared one.
    pub async fn dispatch_boxed_command<R: Send + 'static>(
        &self,
        command: Box<dyn Command<Response = R>>,
        ctx: &DispatchContext,
    ) -> Result<R, DispatchError> {
        let request_type = AsAny::request_type_name(&*command);
        self.dispatch(RequestKind::Command, request_type, AsAny::into_any(command), ctx)
            .await
    }

    pub async fn dispatch_query<Q: Query>(
        &self,
        query: Q,
        ctx: &DispatchContext,
    ) -> Result<Q::Response, DispatchError> {
        self.dispatch_boxed_query(Box::new(query), ctx).await
    }

    pub async fn dispatch_boxed_query<R: Send + 'static>(
        &self,
        query: Box<dyn Query<Response = R>>,
        ctx: &DispatchContext,
    ) -> Result<R, DispatchError> {
        let request_type = AsAny::request_type_name(&*query);
        self.dispatch(RequestKind::Query, request_type, AsAny::into_any(query), ctx)
            .await
    }

    async fn dispatch<R: Send + 'static>(
        &self,
        kind: RequestKind,
        request_type: &'static str,
        request: Box<dyn Any + Send>,
        ctx: &DispatchContext,
    ) -> Result<R, DispatchError> {
        let key = ((*request).type_id(), TypeId::of::<R>());
        let entry = self
            .registry
            .request(kind, key)
            .ok_or(DispatchError::NoHandler { request_type, kind })?;
        tracing::debug!(
            %kind,
            request_type,
            handler = entry.handler_type,
            correlation_id = ctx.correlation_id(),
            "dispatching"
        );
        let response = entry.invoker.invoke(&self.scope, request, ctx).await?;
        response
            .downcast::<R>()
            .map(|response| *response)
            .map_err(|_| DispatchError::TypeMismatch { request_type, kind })
    }
}
