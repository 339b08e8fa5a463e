//! CQRS: request kinds, handler capabilities, registry and dispatchers.

pub mod dispatcher;
pub mod events;
pub mod handlers;
pub mod registry;
pub mod requests;

pub use dispatcher::{CommandQueryDispatcher, DispatchError};
pub use events::DomainEventDispatcher;
pub use handlers::{CommandHandler, DispatchContext, EventHandler, QueryHandler};
pub use registry::{HandlerModule, HandlerRegistry, RegistryBuilder, RegistryError, RequestKind};
pub use requests::{AsAny, Command, DomainEvent, EventAny, Query};
