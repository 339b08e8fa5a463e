//! Per-request context and cancellation. Passed explicitly to handlers; nothing here is ambient or thread-local.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;

/// Tenant, user and correlation data of one inbound request.
#[derive(Clone, Default)]
pub struct RequestContext {
    tenant_id: Option<String>,
    user_id: Option<String>,
    correlation_id: Option<String>,
    ip_address: Option<String>,
    user_agent: Option<String>,
    values: HashMap<String, Arc<dyn Any + Send + Sync>>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tenant_id(&self) -> Option<&str> {
        self.tenant_id.as_deref()
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    /// Correlation id for tracing a request across services. Generated on first access when the
    /// request did not carry one.
    pub fn correlation_id(&mut self) -> &str {
        self.correlation_id
            .get_or_insert_with(|| uuid::Uuid::new_v4().to_string())
    }

    /// Correlation id without generating one.
    pub fn correlation_id_opt(&self) -> Option<&str> {
        self.correlation_id.as_deref()
    }

    pub fn ip_address(&self) -> Option<&str> {
        self.ip_address.as_deref()
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.user_agent.as_deref()
    }

    pub fn set_tenant_id(&mut self, tenant_id: Option<String>) {
        self.tenant_id = tenant_id;
    }

    pub fn set_user_id(&mut self, user_id: Option<String>) {
        self.user_id = user_id;
    }

    pub fn set_correlation_id(&mut self, correlation_id: impl Into<String>) {
        self.correlation_id = Some(correlation_id.into());
    }

    pub fn set_ip_address(&mut self, ip_address: Option<String>) {
        self.ip_address = ip_address;
    }

    pub fn set_user_agent(&mut self, user_agent: Option<String>) {
        self.user_agent = user_agent;
    }

    pub fn with_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    /// Typed custom value. `None` if absent or stored under another type.
    pub fn value<T: Any + Send + Sync>(&self, key: &str) -> Option<&T> {
        self.values.get(key).and_then(|v| v.downcast_ref::<T>())
    }

    /// Store a custom value; `None` removes the key.
    pub fn set_value<T: Any + Send + Sync>(&mut self, key: impl Into<String>, value: Option<T>) {
        let key = key.into();
        match value {
            Some(v) => {
                self.values.insert(key, Arc::new(v));
            }
            None => {
                self.values.remove(&key);
            }
        }
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("tenant_id", &self.tenant_id)
            .field("user_id", &self.user_id)
            .field("correlation_id", &self.correlation_id)
            .field("ip_address", &self.ip_address)
            .field("user_agent", &self.user_agent)
            .field("values", &self.values.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Cooperative cancellation signal threaded through every handler call.
/// Cheap to clone; all clones observe the same [`Canceller`].
#[derive(Clone, Debug)]
pub struct CancellationSignal {
    rx: watch::Receiver<bool>,
    // Keeps `never()` signals from reporting a dropped sender as closed.
    _keep: Option<Arc<watch::Sender<bool>>>,
}

/// Trigger side of a [`CancellationSignal`].
#[derive(Debug)]
pub struct Canceller {
    tx: watch::Sender<bool>,
}

impl CancellationSignal {
    /// A linked canceller/signal pair.
    pub fn new() -> (Canceller, CancellationSignal) {
        let (tx, rx) = watch::channel(false);
        (Canceller { tx }, CancellationSignal { rx, _keep: None })
    }

    /// A signal that is never cancelled.
    pub fn never() -> Self {
        let (tx, rx) = watch::channel(false);
        CancellationSignal {
            rx,
            _keep: Some(Arc::new(tx)),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Completes once cancellation is requested. Pending forever if the canceller is dropped first.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        if rx.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

impl Default for CancellationSignal {
    fn default() -> Self {
        Self::never()
    }
}

impl Canceller {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn signal(&self) -> CancellationSignal {
        CancellationSignal {
            rx: self.tx.subscribe(),
            _keep: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn correlation_id_generated_once() {
        let mut ctx = RequestContext::new();
        assert!(ctx.correlation_id_opt().is_none());
        let id = ctx.correlation_id().to_string();
        assert_eq!(ctx.correlation_id(), id);
        assert_eq!(id.len(), 36);
    }

    #[test]
    fn custom_values_are_typed() {
        let mut ctx = RequestContext::new();
        ctx.set_value("Route_id", Some(String::from("42")));
        assert_eq!(ctx.value::<String>("Route_id").map(String::as_str), Some("42"));
        assert!(ctx.value::<u32>("Route_id").is_none());
        ctx.set_value::<String>("Route_id", None);
        assert!(ctx.value::<String>("Route_id").is_none());
    }

    #[tokio::test]
    async fn cancel_is_observed_by_clones() {
        let (canceller, signal) = CancellationSignal::new();
        let clone = signal.clone();
        assert!(!clone.is_cancelled());
        canceller.cancel();
        assert!(clone.is_cancelled());
        signal.cancelled().await;
    }

    #[test]
    fn never_is_not_cancelled() {
        assert!(!CancellationSignal::never().is_cancelled());
    }
}
