//! DI container: register factories by service type with a lifetime, resolve through a per-unit-of-work scope.

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ContainerError {
    #[error("no registration for {0}")]
    NotFound(&'static str),
    #[error("registration for {0} produced a value of another type")]
    TypeMismatch(&'static str),
}

/// How long a resolved instance lives.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lifetime {
    /// One instance for the container.
    Singleton,
    /// One instance per scope (unit of work).
    Scoped,
    /// A new instance on every resolve.
    Transient,
}

type Erased = Box<dyn Any + Send + Sync>;
type FactoryFn = Arc<dyn Fn(&Scope) -> Erased + Send + Sync>;

struct Registration {
    id: usize,
    lifetime: Lifetime,
    factory: FactoryFn,
}

/// Registration table. Services are keyed by type; several registrations per type
/// are kept in order, `resolve` returns the last one and `resolve_all` every one.
/// Frozen once wrapped in an `Arc`; scopes borrow it for resolution.
pub struct Container {
    registrations: HashMap<TypeId, Vec<Registration>>,
    singletons: Mutex<HashMap<usize, Erased>>,
    next_id: usize,
}

impl Container {
    pub fn new() -> Self {
        Self {
            registrations: HashMap::new(),
            singletons: Mutex::new(HashMap::new()),
            next_id: 0,
        }
    }

    /// Register a ready-made value. Every resolve returns a clone of it.
    pub fn register_instance<T>(&mut self, value: T)
    where
        T: Clone + Send + Sync + 'static,
    {
        self.register::<T, _>(Lifetime::Singleton, move |_| value.clone());
    }

    pub fn register_singleton<T, F>(&mut self, f: F)
    where
        T: Clone + Send + Sync + 'static,
        F: Fn(&Scope) -> T + Send + Sync + 'static,
    {
        self.register(Lifetime::Singleton, f);
    }

    pub fn register_scoped<T, F>(&mut self, f: F)
    where
        T: Clone + Send + Sync + 'static,
        F: Fn(&Scope) -> T + Send + Sync + 'static,
    {
        self.register(Lifetime::Scoped, f);
    }

    pub fn register_transient<T, F>(&mut self, f: F)
    where
        T: Clone + Send + Sync + 'static,
        F: Fn(&Scope) -> T + Send + Sync + 'static,
    {
        self.register(Lifetime::Transient, f);
    }

    pub fn register<T, F>(&mut self, lifetime: Lifetime, f: F)
    where
        T: Clone + Send + Sync + 'static,
        F: Fn(&Scope) -> T + Send + Sync + 'static,
    {
        let id = self.next_id;
        self.next_id += 1;
        let factory: FactoryFn = Arc::new(move |scope: &Scope| Box::new(f(scope)) as Erased);
        self.registrations
            .entry(TypeId::of::<T>())
            .or_default()
            .push(Registration {
                id,
                lifetime,
                factory,
            });
    }

    pub fn is_registered<T: 'static>(&self) -> bool {
        self.registration_count::<T>() > 0
    }

    pub fn registration_count<T: 'static>(&self) -> usize {
        self.registrations
            .get(&TypeId::of::<T>())
            .map_or(0, Vec::len)
    }

    /// Open a scope: one unit of work. Scoped services are built once per scope.
    pub fn create_scope(self: &Arc<Self>) -> Scope {
        Scope {
            container: Arc::clone(self),
            instances: Mutex::new(HashMap::new()),
        }
    }

    fn singleton<T: Clone + 'static>(&self, reg: &Registration, scope: &Scope) -> Result<T, ContainerError> {
        if let Some(value) = cached::<T>(&self.singletons, reg.id) {
            return value;
        }
        // Built outside the lock: factories may resolve their own dependencies.
        let value = (reg.factory)(scope);
        let mut singletons = self.singletons.lock().unwrap_or_else(PoisonError::into_inner);
        let stored = singletons.entry(reg.id).or_insert(value);
        downcast_clone(stored)
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolution scope. Holds the scoped instances of one unit of work; dropped with it.
pub struct Scope {
    container: Arc<Container>,
    instances: Mutex<HashMap<usize, Erased>>,
}

impl Scope {
    pub fn container(&self) -> &Arc<Container> {
        &self.container
    }

    /// Resolve the last registration for `T`.
    pub fn resolve<T: Clone + 'static>(&self) -> Result<T, ContainerError> {
        let reg = self
            .container
            .registrations
            .get(&TypeId::of::<T>())
            .and_then(|regs| regs.last())
            .ok_or(ContainerError::NotFound(type_name::<T>()))?;
        self.build(reg)
    }

    pub fn resolve_optional<T: Clone + 'static>(&self) -> Option<T> {
        self.resolve().ok()
    }

    /// Resolve every registration for `T`, in registration order. Empty when none.
    pub fn resolve_all<T: Clone + 'static>(&self) -> Result<Vec<T>, ContainerError> {
        match self.container.registrations.get(&TypeId::of::<T>()) {
            Some(regs) => regs.iter().map(|reg| self.build(reg)).collect(),
            None => Ok(Vec::new()),
        }
    }

    fn build<T: Clone + 'static>(&self, reg: &Registration) -> Result<T, ContainerError> {
        match reg.lifetime {
            Lifetime::Transient => downcast_clone(&(reg.factory)(self)),
            Lifetime::Singleton => self.container.singleton(reg, self),
            Lifetime::Scoped => {
                if let Some(value) = cached::<T>(&self.instances, reg.id) {
                    return value;
                }
                let value = (reg.factory)(self);
                let mut instances = self.instances.lock().unwrap_or_else(PoisonError::into_inner);
                let stored = instances.entry(reg.id).or_insert(value);
                downcast_clone(stored)
            }
        }
    }
}

fn cached<T: Clone + 'static>(
    store: &Mutex<HashMap<usize, Erased>>,
    id: usize,
) -> Option<Result<T, ContainerError>> {
    let store = store.lock().unwrap_or_else(PoisonError::into_inner);
    store.get(&id).map(downcast_clone)
}

fn downcast_clone<T: Clone + 'static>(value: &Erased) -> Result<T, ContainerError> {
    value
        .downcast_ref::<T>()
        .cloned()
        .ok_or(ContainerError::TypeMismatch(type_name::<T>()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn scoped_is_shared_within_scope_only() {
        let built = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&built);
        let mut c = Container::new();
        c.register_scoped(move |_| Arc::new(counter.fetch_add(1, Ordering::SeqCst)));
        let c = Arc::new(c);

        let first = c.create_scope();
        let a: Arc<usize> = first.resolve().unwrap();
        let b: Arc<usize> = first.resolve().unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        let second = c.create_scope();
        let other: Arc<usize> = second.resolve().unwrap();
        assert!(!Arc::ptr_eq(&a, &other));
        assert_eq!(built.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn singleton_survives_scopes() {
        let mut c = Container::new();
        c.register_singleton(|_| Arc::new(String::from("config")));
        let c = Arc::new(c);
        let a: Arc<String> = c.create_scope().resolve().unwrap();
        let b: Arc<String> = c.create_scope().resolve().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn factories_resolve_dependencies() {
        let mut c = Container::new();
        c.register_instance(21u32);
        c.register_transient(|s: &Scope| s.resolve::<u32>().map(|n| n * 2).unwrap_or_default() as u64);
        let scope = Arc::new(c).create_scope();
        assert_eq!(scope.resolve::<u64>().unwrap(), 42);
    }

    #[test]
    fn resolve_all_keeps_order_and_resolve_takes_last() {
        let mut c = Container::new();
        c.register_instance("first");
        c.register_instance("second");
        let scope = Arc::new(c).create_scope();
        assert_eq!(scope.resolve_all::<&str>().unwrap(), vec!["first", "second"]);
        assert_eq!(scope.resolve::<&str>().unwrap(), "second");
    }

    #[test]
    fn missing_registration() {
        let scope = Arc::new(Container::new()).create_scope();
        assert!(matches!(scope.resolve::<u8>(), Err(ContainerError::NotFound(_))));
        assert!(scope.resolve_all::<u8>().unwrap().is_empty());
        assert!(scope.resolve_optional::<u8>().is_none());
    }
}
