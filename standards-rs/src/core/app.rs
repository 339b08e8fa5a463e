//! Composition root: handler modules and options in, a host that runs requests through
//! the pipeline and hands each one a unit of work.

use std::future::Future;
use std::sync::Arc;

use standards_core::{
    error_outcome, CancellationSignal, Container, DomainError, Middleware, Outcome, Pipeline, RequestHead,
    StandardsOptions,
};

use crate::cqrs::{
    Command, CommandQueryDispatcher, DispatchContext, DispatchError, DomainEvent, DomainEventDispatcher,
    HandlerModule, HandlerRegistry, Query, RegistryBuilder, RegistryError,
};

/// Startup builder. Register modules, then [`Application::build`].
pub struct Application {
    options: StandardsOptions,
    registry: RegistryBuilder,
    extra_stages: Vec<Box<dyn FnOnce(Pipeline) -> Pipeline>>,
}

impl Application {
    pub fn new(options: StandardsOptions) -> Self {
        Self {
            options,
            registry: RegistryBuilder::new(),
            extra_stages: Vec::new(),
        }
    }

    pub fn options(&self) -> &StandardsOptions {
        &self.options
    }

    /// Services handlers depend on (repositories, clients, ...).
    pub fn container_mut(&mut self) -> &mut Container {
        self.registry.container_mut()
    }

    pub fn register(&mut self, module: &dyn HandlerModule) -> Result<&mut Self, RegistryError> {
        self.registry.add_module(module)?;
        Ok(self)
    }

    /// Append a stage after the default ones.
    pub fn middleware(&mut self, stage: impl Middleware + 'static) -> &mut Self {
        self.extra_stages.push(Box::new(move |pipeline| pipeline.with(stage)));
        self
    }

    pub fn build(self) -> ApiHost {
        let mut pipeline = Pipeline::from_options(&self.options);
        for add in self.extra_stages {
            pipeline = add(pipeline);
        }
        ApiHost {
            registry: self.registry.build(),
            pipeline,
            options: self.options,
        }
    }
}

impl Default for Application {
    fn default() -> Self {
        Self::new(StandardsOptions::default())
    }
}

/// Built application. Cheap to share; every request gets its own [`UnitOfWork`].
#[derive(Clone)]
pub struct ApiHost {
    registry: Arc<HandlerRegistry>,
    pipeline: Pipeline,
    options: StandardsOptions,
}

impl ApiHost {
    pub fn registry(&self) -> &Arc<HandlerRegistry> {
        &self.registry
    }

    pub fn options(&self) -> &StandardsOptions {
        &self.options
    }

    pub fn begin_unit_of_work(&self, context: DispatchContext) -> UnitOfWork {
        UnitOfWork::new(Arc::clone(&self.registry), context)
    }

    /// Run the pipeline around `endpoint`. Endpoint errors become the error envelope.
    pub async fn handle<F, Fut>(&self, head: RequestHead, cancellation: CancellationSignal, endpoint: F) -> Outcome
    where
        F: FnOnce(UnitOfWork) -> Fut,
        Fut: Future<Output = Result<Outcome, DomainError>>,
    {
        self.pipeline
            .run(head, |request| async move {
                let uow = self.begin_unit_of_work(DispatchContext::new(request, cancellation));
                match endpoint(uow).await {
                    Ok(outcome) => outcome,
                    Err(err) => error_outcome(&err),
                }
            })
            .await
    }
}

/// Dispatchers of one unit of work, sharing a DI scope and a context.
pub struct UnitOfWork {
    context: DispatchContext,
    commands: CommandQueryDispatcher,
    events: DomainEventDispatcher,
}

impl UnitOfWork {
    pub fn new(registry: Arc<HandlerRegistry>, context: DispatchContext) -> Self {
        let scope = Arc::new(registry.create_scope());
        Self {
            context,
            commands: CommandQueryDispatcher::with_scope(Arc::clone(&registry), Arc::clone(&scope)),
            events: DomainEventDispatcher::with_scope(registry, scope),
        }
    }

    pub fn context(&self) -> &DispatchContext {
        &self.context
    }

    pub fn commands(&self) -> &CommandQueryDispatcher {
        &self.commands
    }

    pub fn events(&self) -> &DomainEventDispatcher {
        &self.events
    }

    pub async fn dispatch_command<C: Command>(&self, command: C) -> Result<C::Response, DispatchError> {
        self.commands.dispatch_command(command, &self.context).await
    }

    pub async fn dispatch_query<Q: Query>(&self, query: Q) -> Result<Q::Response, DispatchError> {
        self.commands.dispatch_query(query, &self.context).await
    }

    /// Publish after the state change is persisted.
    pub async fn dispatch_events(&self, events: Vec<Box<dyn DomainEvent>>) {
        self.events.dispatch_events(events, &self.context).await
    }
}
