//! Standards for Rust: CQRS commands, queries and domain events dispatched to handlers
//! resolved from a scoped DI container, on top of `standards-core`.

extern crate self as standards_rs;

pub mod core;
pub mod cqrs;

pub use crate::core::{ApiHost, Application, UnitOfWork};
pub use cqrs::{
    AsAny, Command, CommandHandler, CommandQueryDispatcher, DispatchContext, DispatchError, DomainEvent,
    DomainEventDispatcher, EventAny, EventHandler, HandlerModule, HandlerRegistry, Query, QueryHandler,
    RegistryBuilder, RegistryError, RequestKind,
};
pub use standards_core::{
    ApiResponse, CancellationSignal, Canceller, Container, DomainError, IntoDomainError, Lifetime, PagedResult,
    RequestContext, Scope, StandardsOptions,
};
pub use standards_rs_macros::{Command, DomainEvent, Query};

pub use async_trait::async_trait;
pub use chrono;
