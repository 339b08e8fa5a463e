//! Handler registry: type-indexed table from request type to a type-erased invoker.
//! Built once at startup from handler modules, immutable afterwards.

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use standards_core::{Container, ContainerError, DomainError, Scope};
use thiserror::Error;

use crate::cqrs::dispatcher::DispatchError;
use crate::cqrs::handlers::{CommandHandler, DispatchContext, EventHandler, QueryHandler};
use crate::cqrs::requests::{Command, DomainEvent, Query};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestKind {
    Command,
    Query,
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestKind::Command => f.write_str("command"),
            RequestKind::Query => f.write_str("query"),
        }
    }
}

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("{kind} {request_type} already handled by {existing}; cannot also register {duplicate}")]
    DuplicateHandler {
        kind: RequestKind,
        request_type: &'static str,
        existing: &'static str,
        duplicate: &'static str,
    },
}

/// Module boundary that declares its handlers (and any services they depend on).
pub trait HandlerModule {
    fn register(&self, registry: &mut RegistryBuilder) -> Result<(), RegistryError>;

    fn name(&self) -> &'static str {
        type_name::<Self>()
    }
}

/// (request type, response type).
type RequestKey = (TypeId, TypeId);

#[async_trait]
pub(crate) trait RequestInvoker: Send + Sync {
    async fn invoke(
        &self,
        scope: &Scope,
        request: Box<dyn Any + Send>,
        ctx: &DispatchContext,
    ) -> Result<Box<dyn Any + Send>, DispatchError>;
}

struct CommandInvoker<C>(PhantomData<fn() -> C>);

#[async_trait]
impl<C: Command> RequestInvoker for CommandInvoker<C> {
    async fn invoke(
        &self,
        scope: &Scope,
        request: Box<dyn Any + Send>,
        ctx: &DispatchContext,
    ) -> Result<Box<dyn Any + Send>, DispatchError> {
        let command = request
            .downcast::<C>()
            .map_err(|_| DispatchError::mismatch::<C>(RequestKind::Command))?;
        let handler = scope
            .resolve::<Arc<dyn CommandHandler<C>>>()
            .map_err(|source| DispatchError::unresolved::<C>(RequestKind::Command, source))?;
        let response = handler.handle(*command, ctx).await?;
        Ok(Box::new(response))
    }
}

struct QueryInvoker<Q>(PhantomData<fn() -> Q>);

#[async_trait]
impl<Q: Query> RequestInvoker for QueryInvoker<Q> {
    async fn invoke(
        &self,
        scope: &Scope,
        request: Box<dyn Any + Send>,
        ctx: &DispatchContext,
    ) -> Result<Box<dyn Any + Send>, DispatchError> {
        let query = request
            .downcast::<Q>()
            .map_err(|_| DispatchError::mismatch::<Q>(RequestKind::Query))?;
        let handler = scope
            .resolve::<Arc<dyn QueryHandler<Q>>>()
            .map_err(|source| DispatchError::unresolved::<Q>(RequestKind::Query, source))?;
        let response = handler.handle(*query, ctx).await?;
        Ok(Box::new(response))
    }
}

pub(crate) struct RequestEntry {
    pub(crate) handler_type: &'static str,
    pub(crate) invoker: Arc<dyn RequestInvoker>,
}

/// Event handler with the event type erased.
#[async_trait]
pub(crate) trait ErasedEventHandler: Send + Sync {
    fn handler_type(&self) -> &'static str;

    async fn handle(
        &self,
        event: &(dyn Any + Send + Sync),
        ctx: &DispatchContext,
    ) -> Result<(), DomainError>;
}

struct TypedEventHandler<E: DomainEvent>(Arc<dyn EventHandler<E>>);

#[async_trait]
impl<E: DomainEvent> ErasedEventHandler for TypedEventHandler<E> {
    fn handler_type(&self) -> &'static str {
        self.0.handler_type()
    }

    async fn handle(
        &self,
        event: &(dyn Any + Send + Sync),
        ctx: &DispatchContext,
    ) -> Result<(), DomainError> {
        match event.downcast_ref::<E>() {
            Some(event) => self.0.handle(event, ctx).await,
            None => Err(DomainError::internal(format!(
                "event handed to {} is not a {}",
                self.0.handler_type(),
                type_name::<E>()
            ))),
        }
    }
}

/// Resolves every subscriber of one event type from a scope.
pub(crate) trait EventResolver: Send + Sync {
    fn resolve(&self, scope: &Scope) -> Result<Vec<Box<dyn ErasedEventHandler>>, ContainerError>;
}

struct TypedEventResolver<E>(PhantomData<fn() -> E>);

impl<E: DomainEvent> EventResolver for TypedEventResolver<E> {
    fn resolve(&self, scope: &Scope) -> Result<Vec<Box<dyn ErasedEventHandler>>, ContainerError> {
        Ok(scope
            .resolve_all::<Arc<dyn EventHandler<E>>>()?
            .into_iter()
            .map(|handler| Box::new(TypedEventHandler(handler)) as Box<dyn ErasedEventHandler>)
            .collect())
    }
}

pub(crate) struct EventEntry {
    pub(crate) handler_types: Vec<&'static str>,
    pub(crate) resolver: Arc<dyn EventResolver>,
}

/// Collects handler registrations. Freeze with [`RegistryBuilder::build`].
pub struct RegistryBuilder {
    container: Container,
    commands: HashMap<RequestKey, RequestEntry>,
    queries: HashMap<RequestKey, RequestEntry>,
    events: HashMap<TypeId, EventEntry>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::with_container(Container::new())
    }

    /// Start from a container that already holds the services handlers depend on.
    pub fn with_container(container: Container) -> Self {
        Self {
            container,
            commands: HashMap::new(),
            queries: HashMap::new(),
            events: HashMap::new(),
        }
    }

    pub fn container_mut(&mut self) -> &mut Container {
        &mut self.container
    }

    pub fn add_module(&mut self, module: &dyn HandlerModule) -> Result<&mut Self, RegistryError> {
        module.register(self)?;
        tracing::debug!(module = module.name(), "handler module registered");
        Ok(self)
    }

    /// Register `H` as the only handler of command `C`. `factory` runs once per scope.
    pub fn command_handler<C, H, F>(&mut self, factory: F) -> Result<&mut Self, RegistryError>
    where
        C: Command,
        H: CommandHandler<C> + 'static,
        F: Fn(&Scope) -> H + Send + Sync + 'static,
    {
        let key = (TypeId::of::<C>(), TypeId::of::<C::Response>());
        if let Some(existing) = self.commands.get(&key) {
            return Err(RegistryError::DuplicateHandler {
                kind: RequestKind::Command,
                request_type: type_name::<C>(),
                existing: existing.handler_type,
                duplicate: type_name::<H>(),
            });
        }
        self.container
            .register_scoped::<Arc<dyn CommandHandler<C>>, _>(move |scope| {
                Arc::new(factory(scope)) as Arc<dyn CommandHandler<C>>
            });
        self.commands.insert(
            key,
            RequestEntry {
                handler_type: type_name::<H>(),
                invoker: Arc::new(CommandInvoker::<C>(PhantomData)),
            },
        );
        tracing::debug!(command = type_name::<C>(), handler = type_name::<H>(), "command handler registered");
        Ok(self)
    }

    /// Register `H` as the only handler of query `Q`. `factory` runs once per scope.
    pub fn query_handler<Q, H, F>(&mut self, factory: F) -> Result<&mut Self, RegistryError>
    where
        Q: Query,
        H: QueryHandler<Q> + 'static,
        F: Fn(&Scope) -> H + Send + Sync + 'static,
    {
        let key = (TypeId::of::<Q>(), TypeId::of::<Q::Response>());
        if let Some(existing) = self.queries.get(&key) {
            return Err(RegistryError::DuplicateHandler {
                kind: RequestKind::Query,
                request_type: type_name::<Q>(),
                existing: existing.handler_type,
                duplicate: type_name::<H>(),
            });
        }
        self.container
            .register_scoped::<Arc<dyn QueryHandler<Q>>, _>(move |scope| {
                Arc::new(factory(scope)) as Arc<dyn QueryHandler<Q>>
            });
        self.queries.insert(
            key,
            RequestEntry {
                handler_type: type_name::<H>(),
                invoker: Arc::new(QueryInvoker::<Q>(PhantomData)),
            },
        );
        tracing::debug!(query = type_name::<Q>(), handler = type_name::<H>(), "query handler registered");
        Ok(self)
    }

    /// Add `H` to the subscribers of `E`. Subscribers run in registration order.
    pub fn event_handler<E, H, F>(&mut self, factory: F) -> &mut Self
    where
        E: DomainEvent,
        H: EventHandler<E> + 'static,
        F: Fn(&Scope) -> H + Send + Sync + 'static,
    {
        self.container
            .register_scoped::<Arc<dyn EventHandler<E>>, _>(move |scope| {
                Arc::new(factory(scope)) as Arc<dyn EventHandler<E>>
            });
        self.events
            .entry(TypeId::of::<E>())
            .or_insert_with(|| EventEntry {
                handler_types: Vec::new(),
                resolver: Arc::new(TypedEventResolver::<E>(PhantomData)),
            })
            .handler_types
            .push(type_name::<H>());
        tracing::debug!(event = type_name::<E>(), handler = type_name::<H>(), "event handler registered");
        self
    }

    pub fn build(self) -> Arc<HandlerRegistry> {
        tracing::info!(
            commands = self.commands.len(),
            queries = self.queries.len(),
            event_types = self.events.len(),
            "handler registry built"
        );
        Arc::new(HandlerRegistry {
            container: Arc::new(self.container),
            commands: self.commands,
            queries: self.queries,
            events: self.events,
        })
    }
}

impl Default for RegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RegistryBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryBuilder")
            .field("commands", &self.commands.len())
            .field("queries", &self.queries.len())
            .field("event_types", &self.events.len())
            .finish()
    }
}

/// Frozen registry. Safe to share across concurrent units of work.
pub struct HandlerRegistry {
    container: Arc<Container>,
    commands: HashMap<RequestKey, RequestEntry>,
    queries: HashMap<RequestKey, RequestEntry>,
    events: HashMap<TypeId, EventEntry>,
}

impl HandlerRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    pub fn container(&self) -> &Arc<Container> {
        &self.container
    }

    /// Fresh scope for one unit of work.
    pub fn create_scope(&self) -> Scope {
        self.container.create_scope()
    }

    pub fn has_command_handler<C: Command>(&self) -> bool {
        self.commands
            .contains_key(&(TypeId::of::<C>(), TypeId::of::<C::Response>()))
    }

    pub fn has_query_handler<Q: Query>(&self) -> bool {
        self.queries
            .contains_key(&(TypeId::of::<Q>(), TypeId::of::<Q::Response>()))
    }

    pub fn event_handler_count<E: DomainEvent>(&self) -> usize {
        self.events
            .get(&TypeId::of::<E>())
            .map_or(0, |entry| entry.handler_types.len())
    }

    pub(crate) fn request(&self, kind: RequestKind, key: RequestKey) -> Option<&RequestEntry> {
        match kind {
            RequestKind::Command => self.commands.get(&key),
            RequestKind::Query => self.queries.get(&key),
        }
    }

    pub(crate) fn event(&self, event_type: TypeId) -> Option<&EventEntry> {
        self.events.get(&event_type)
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("commands", &self.commands.len())
            .field("queries", &self.queries.len())
            .field("event_types", &self.events.len())
            .finish()
    }
}
