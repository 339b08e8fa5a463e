//! Request pipeline stages: security headers, request logging, request context, tenant validation.
//! Transport-agnostic: the host converts its HTTP request into a [`RequestHead`], runs the
//! [`Pipeline`] around its endpoint and writes the resulting [`Outcome`] back.

use std::collections::HashMap;
use std::future::Future;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use http::header::{HeaderName, HeaderValue, SERVER, USER_AGENT};
use http::{HeaderMap, Method, StatusCode};

use crate::options::StandardsOptions;
use crate::response::ApiResponse;
use crate::RequestContext;

/// Claims of an already authenticated principal (signature validated by the host).
pub type Claims = HashMap<String, String>;

/// What the pipeline sees of an inbound request.
#[derive(Clone, Debug)]
pub struct RequestHead {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
    pub remote_addr: Option<IpAddr>,
    /// `None` for anonymous requests.
    pub claims: Option<Claims>,
}

impl RequestHead {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            remote_addr: None,
            claims: None,
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
    }

    pub fn claim(&self, claim_type: &str) -> Option<&str> {
        self.claims
            .as_ref()
            .and_then(|c| c.get(claim_type))
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    pub fn is_authenticated(&self) -> bool {
        self.claims.is_some()
    }
}

/// Response produced by the endpoint or by a short-circuiting stage.
#[derive(Clone, Debug)]
pub struct Outcome {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl Outcome {
    pub fn new(status: StatusCode, body: Vec<u8>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body,
        }
    }

    /// JSON body with content type set.
    pub fn json<T: serde::Serialize>(status: StatusCode, value: &T) -> Self {
        let body = serde_json::to_vec(value).unwrap_or_default();
        let mut outcome = Self::new(status, body);
        outcome.headers.insert(
            http::header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        outcome
    }
}

/// State shared by the stages while one request flows through the pipeline.
#[derive(Debug)]
pub struct Exchange {
    pub head: RequestHead,
    pub context: RequestContext,
    pub started: Instant,
}

/// One pipeline stage. `before` may short-circuit with an outcome; `after` runs in reverse order
/// for every stage whose `before` ran.
#[async_trait]
pub trait Middleware: Send + Sync {
    async fn before(&self, _exchange: &mut Exchange) -> Option<Outcome> {
        None
    }

    fn after(&self, _exchange: &Exchange, _outcome: &mut Outcome) {}
}

/// Ordered middleware chain.
#[derive(Clone, Default)]
pub struct Pipeline {
    stages: Vec<Arc<dyn Middleware>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Default chain for the given options, in order: security headers, request logging,
    /// request context, tenant validation.
    pub fn from_options(options: &StandardsOptions) -> Self {
        let mut pipeline = Self::new();
        if options.enable_security_headers {
            pipeline = pipeline.with(SecurityHeaders);
        }
        if options.enable_request_logging {
            pipeline = pipeline.with(RequestLogging);
        }
        if options.enable_request_context {
            pipeline = pipeline.with(RequestContextStage::new(options.clone()));
        }
        if options.enable_multi_tenancy && options.validate_tenant_from_jwt {
            pipeline = pipeline.with(TenantValidation::new(options.clone()));
        }
        pipeline
    }

    pub fn with(mut self, stage: impl Middleware + 'static) -> Self {
        self.stages.push(Arc::new(stage));
        self
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Run the chain around `endpoint`. The endpoint receives the populated request context.
    pub async fn run<F, Fut>(&self, head: RequestHead, endpoint: F) -> Outcome
    where
        F: FnOnce(RequestContext) -> Fut,
        Fut: Future<Output = Outcome>,
    {
        let mut exchange = Exchange {
            head,
            context: RequestContext::new(),
            started: Instant::now(),
        };
        let mut ran = 0;
        let mut short_circuit = None;
        for stage in &self.stages {
            ran += 1;
            if let Some(outcome) = stage.before(&mut exchange).await {
                short_circuit = Some(outcome);
                break;
            }
        }
        let mut outcome = match short_circuit {
            Some(outcome) => outcome,
            None => endpoint(exchange.context.clone()).await,
        };
        for stage in self.stages[..ran].iter().rev() {
            stage.after(&exchange, &mut outcome);
        }
        outcome
    }
}

const SECURITY_HEADERS: &[(&str, &str)] = &[
    ("x-content-type-options", "nosniff"),
    ("x-frame-options", "DENY"),
    ("x-xss-protection", "1; mode=block"),
    ("referrer-policy", "strict-origin-when-cross-origin"),
    (
        "content-security-policy",
        "default-src 'self'; frame-ancestors 'none'; upgrade-insecure-requests;",
    ),
    (
        "permissions-policy",
        "accelerometer=(), camera=(), geolocation=(), gyroscope=(), magnetometer=(), microphone=(), payment=(), usb=()",
    ),
];

const REMOVED_HEADERS: &[&str] = &["x-powered-by", "x-aspnet-version", "x-aspnetmvc-version"];

/// Add the hardening headers and strip server fingerprint headers.
pub fn apply_security_headers(headers: &mut HeaderMap) {
    for &(name, value) in SECURITY_HEADERS {
        headers.append(
            HeaderName::from_static(name),
            HeaderValue::from_static(value),
        );
    }
    headers.remove(SERVER);
    for name in REMOVED_HEADERS {
        headers.remove(*name);
    }
}

pub struct SecurityHeaders;

#[async_trait]
impl Middleware for SecurityHeaders {
    fn after(&self, _exchange: &Exchange, outcome: &mut Outcome) {
        apply_security_headers(&mut outcome.headers);
        tracing::debug!("security headers added to response");
    }
}

/// Logs request start and completion; level follows the status class.
pub struct RequestLogging;

#[async_trait]
impl Middleware for RequestLogging {
    async fn before(&self, exchange: &mut Exchange) -> Option<Outcome> {
        let head = &exchange.head;
        let ip = head
            .remote_addr
            .map_or_else(|| "Unknown".to_string(), |ip| ip.to_string());
        tracing::info!(method = %head.method, path = %head.path, ip = %ip, "request started");
        None
    }

    fn after(&self, exchange: &Exchange, outcome: &mut Outcome) {
        let head = &exchange.head;
        let elapsed_ms = exchange.started.elapsed().as_millis() as u64;
        let status = outcome.status.as_u16();
        let correlation_id = exchange.context.correlation_id_opt().unwrap_or("");
        let tenant_id = exchange.context.tenant_id().unwrap_or("N/A");
        let user_id = exchange.context.user_id().unwrap_or("Anonymous");
        if outcome.status.is_server_error() {
            tracing::error!(method = %head.method, path = %head.path, status, elapsed_ms, correlation_id, tenant_id, user_id, "request completed");
        } else if outcome.status.is_client_error() {
            tracing::warn!(method = %head.method, path = %head.path, status, elapsed_ms, correlation_id, tenant_id, user_id, "request completed");
        } else {
            tracing::info!(method = %head.method, path = %head.path, status, elapsed_ms, correlation_id, tenant_id, user_id, "request completed");
        }
    }
}

/// Fills the [`RequestContext`] from headers and claims; echoes the correlation id.
pub struct RequestContextStage {
    options: StandardsOptions,
}

impl RequestContextStage {
    pub fn new(options: StandardsOptions) -> Self {
        Self { options }
    }

    fn tenant_id(&self, head: &RequestHead) -> Option<String> {
        head.claim(&self.options.jwt.tenant_id_claim_type)
            .or_else(|| head.header(&self.options.tenant_id_header))
            .map(str::to_string)
    }

    fn user_id(&self, head: &RequestHead) -> Option<String> {
        head.claim(&self.options.jwt.user_id_claim_type)
            .or_else(|| head.claim("sub"))
            .map(str::to_string)
    }
}

#[async_trait]
impl Middleware for RequestContextStage {
    async fn before(&self, exchange: &mut Exchange) -> Option<Outcome> {
        let head = &exchange.head;
        let ctx = &mut exchange.context;
        if self.options.enable_correlation_id {
            match head.header(&self.options.correlation_id_header) {
                Some(id) => ctx.set_correlation_id(id),
                None => {
                    ctx.correlation_id();
                }
            }
            tracing::debug!(correlation_id = ctx.correlation_id_opt(), "correlation id set");
        }
        if self.options.enable_multi_tenancy {
            let tenant_id = self.tenant_id(head);
            tracing::debug!(tenant_id = tenant_id.as_deref(), "tenant id resolved");
            ctx.set_tenant_id(tenant_id);
        }
        ctx.set_user_id(self.user_id(head));
        ctx.set_ip_address(head.remote_addr.map(|ip| ip.to_string()));
        ctx.set_user_agent(head.header(USER_AGENT.as_str()).map(str::to_string));
        None
    }

    fn after(&self, exchange: &Exchange, outcome: &mut Outcome) {
        if !self.options.enable_correlation_id {
            return;
        }
        let Some(id) = exchange.context.correlation_id_opt() else {
            return;
        };
        if let (Ok(name), Ok(value)) = (
            HeaderName::try_from(self.options.correlation_id_header.as_str()),
            HeaderValue::from_str(id),
        ) {
            outcome.headers.append(name, value);
        }
    }
}

/// Rejects authenticated requests whose tenant header disagrees with the token's tenant claim.
pub struct TenantValidation {
    options: StandardsOptions,
}

impl TenantValidation {
    pub fn new(options: StandardsOptions) -> Self {
        Self { options }
    }
}

#[async_trait]
impl Middleware for TenantValidation {
    async fn before(&self, exchange: &mut Exchange) -> Option<Outcome> {
        if !self.options.enable_multi_tenancy || !self.options.validate_tenant_from_jwt {
            return None;
        }
        let head = &exchange.head;
        if !head.is_authenticated() {
            return None;
        }
        let claim = head.claim(&self.options.jwt.tenant_id_claim_type)?;
        let header = head.header(&self.options.tenant_id_header)?;
        if claim.eq_ignore_ascii_case(header) {
            return None;
        }
        tracing::warn!(
            jwt_tenant_id = claim,
            header_name = %self.options.tenant_id_header,
            header_tenant_id = header,
            "tenant mismatch detected"
        );
        let body = ApiResponse::<()>::error(
            "Tenant context mismatch. You cannot access resources from a different tenant.",
            None,
        );
        Some(Outcome::json(StatusCode::FORBIDDEN, &body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn security_headers_replace_fingerprints() {
        let mut headers = HeaderMap::new();
        headers.insert(SERVER, HeaderValue::from_static("kestrel"));
        headers.insert("x-powered-by", HeaderValue::from_static("me"));
        apply_security_headers(&mut headers);
        assert!(headers.get(SERVER).is_none());
        assert!(headers.get("x-powered-by").is_none());
        assert_eq!(headers["x-frame-options"], "DENY");
        assert_eq!(headers["x-content-type-options"], "nosniff");
    }

    #[tokio::test]
    async fn after_hooks_run_only_for_entered_stages() {
        let mut options = StandardsOptions::default();
        options.enable_multi_tenancy = true;
        let pipeline = Pipeline::from_options(&options);

        let mut head = RequestHead::new(Method::GET, "/orders");
        head.headers.insert("x-tenant-id", HeaderValue::from_static("acme"));
        head.claims = Some(Claims::from([("tenant_id".to_string(), "globex".to_string())]));

        let outcome = pipeline
            .run(head, |_| async { Outcome::new(StatusCode::OK, Vec::new()) })
            .await;
        assert_eq!(outcome.status, StatusCode::FORBIDDEN);
        assert_eq!(outcome.headers["x-frame-options"], "DENY");
        assert!(outcome.headers.get("x-correlation-id").is_some());
    }
}
