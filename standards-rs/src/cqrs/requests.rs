//! Request kinds. The concrete type of a request is its dispatch key.

use std::any::{type_name, Any};

use chrono::{DateTime, Utc};

/// Recovers the concrete type from a boxed request. Implemented for every `Any + Send` type.
pub trait AsAny: Any + Send {
    fn into_any(self: Box<Self>) -> Box<dyn Any + Send>;

    fn request_type_name(&self) -> &'static str;
}

impl<T: Any + Send> AsAny for T {
    fn into_any(self: Box<Self>) -> Box<dyn Any + Send> {
        self
    }

    fn request_type_name(&self) -> &'static str {
        type_name::<T>()
    }
}

/// Write intent with a single handler. Use `()` as `Response` when there is nothing to return.
///
/// ```ignore
/// #[derive(Command)]
/// #[response(u64)]
/// struct CreateUser { name: String }
/// ```
pub trait Command: AsAny {
    type Response: Send + 'static;
}

/// Read intent with a single handler.
pub trait Query: AsAny {
    type Response: Send + 'static;
}

/// Shared-reference counterpart of [`AsAny`] for events, which are handed to several handlers.
pub trait EventAny: Any + Send + Sync {
    fn as_event_any(&self) -> &(dyn Any + Send + Sync);

    fn event_type_name(&self) -> &'static str;
}

impl<T: Any + Send + Sync> EventAny for T {
    fn as_event_any(&self) -> &(dyn Any + Send + Sync) {
        self
    }

    fn event_type_name(&self) -> &'static str {
        type_name::<T>()
    }
}

/// Fact about a committed state change. Dispatch after persisting, never before.
pub trait DomainEvent: EventAny {
    fn occurred_at(&self) -> DateTime<Utc>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::any::TypeId;

    struct Rename;

    impl Command for Rename {
        type Response = ();
    }

    #[test]
    fn boxed_command_keeps_concrete_type() {
        let boxed: Box<dyn Command<Response = ()>> = Box::new(Rename);
        assert!(AsAny::request_type_name(&*boxed).ends_with("Rename"));
        let any = AsAny::into_any(boxed);
        assert_eq!((*any).type_id(), TypeId::of::<Rename>());
    }
}
