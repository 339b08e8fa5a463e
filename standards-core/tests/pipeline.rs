//! Pipeline end to end, without a transport.

use http::{HeaderValue, Method, StatusCode};
use standards_core::{ApiResponse, Claims, DomainError, Outcome, Pipeline, RequestHead, StandardsOptions};

fn tenant_options() -> StandardsOptions {
    StandardsOptions {
        enable_multi_tenancy: true,
        enable_request_logging: true,
        ..StandardsOptions::default()
    }
}

#[tokio::test]
async fn context_is_populated_from_headers_and_claims() {
    let pipeline = Pipeline::from_options(&tenant_options());
    assert_eq!(pipeline.len(), 4);

    let mut head = RequestHead::new(Method::POST, "/users");
    head.headers.insert("x-correlation-id", HeaderValue::from_static("corr-1"));
    head.headers.insert("x-tenant-id", HeaderValue::from_static("ACME"));
    head.headers.insert("user-agent", HeaderValue::from_static("curl/8"));
    head.remote_addr = Some("10.0.0.1".parse().unwrap());
    head.claims = Some(Claims::from([
        ("tenant_id".to_string(), "acme".to_string()),
        ("sub".to_string(), "u-9".to_string()),
    ]));

    let outcome = pipeline
        .run(head, |ctx| async move {
            assert_eq!(ctx.correlation_id_opt(), Some("corr-1"));
            assert_eq!(ctx.tenant_id(), Some("acme"));
            assert_eq!(ctx.user_id(), Some("u-9"));
            assert_eq!(ctx.ip_address(), Some("10.0.0.1"));
            assert_eq!(ctx.user_agent(), Some("curl/8"));
            Outcome::json(StatusCode::CREATED, &ApiResponse::ok(42))
        })
        .await;

    assert_eq!(outcome.status, StatusCode::CREATED);
    assert_eq!(outcome.headers["x-correlation-id"], "corr-1");
    assert_eq!(outcome.headers["x-content-type-options"], "nosniff");
}

#[tokio::test]
async fn correlation_id_is_generated_when_absent() {
    let pipeline = Pipeline::from_options(&StandardsOptions::default());
    let outcome = pipeline
        .run(RequestHead::new(Method::GET, "/"), |ctx| async move {
            assert!(ctx.correlation_id_opt().is_some());
            Outcome::new(StatusCode::OK, Vec::new())
        })
        .await;
    let id = outcome.headers["x-correlation-id"].to_str().unwrap();
    assert_eq!(id.len(), 36);
}

#[tokio::test]
async fn tenant_mismatch_short_circuits() {
    let pipeline = Pipeline::from_options(&tenant_options());
    let mut head = RequestHead::new(Method::GET, "/orders");
    head.headers.insert("x-tenant-id", HeaderValue::from_static("globex"));
    head.claims = Some(Claims::from([("tenant_id".to_string(), "acme".to_string())]));

    let outcome = pipeline
        .run(head, |_| -> std::future::Ready<Outcome> { panic!("endpoint must not run") })
        .await;
    assert_eq!(outcome.status, StatusCode::FORBIDDEN);
    let body: serde_json::Value = serde_json::from_slice(&outcome.body).unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(
        body["message"],
        "Tenant context mismatch. You cannot access resources from a different tenant."
    );
}

#[tokio::test]
async fn anonymous_requests_skip_tenant_validation() {
    let pipeline = Pipeline::from_options(&tenant_options());
    let mut head = RequestHead::new(Method::GET, "/orders");
    head.headers.insert("x-tenant-id", HeaderValue::from_static("globex"));

    let outcome = pipeline
        .run(head, |ctx| async move {
            assert_eq!(ctx.tenant_id(), Some("globex"));
            standards_core::error_outcome(&DomainError::not_found("Order", 1))
        })
        .await;
    assert_eq!(outcome.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn disabled_stages_are_left_out() {
    let options = StandardsOptions {
        enable_security_headers: false,
        enable_request_context: false,
        ..StandardsOptions::default()
    };
    let pipeline = Pipeline::from_options(&options);
    assert!(pipeline.is_empty());
    let outcome = pipeline
        .run(RequestHead::new(Method::GET, "/"), |_| async {
            Outcome::new(StatusCode::NO_CONTENT, Vec::new())
        })
        .await;
    assert!(outcome.headers.is_empty());
}
