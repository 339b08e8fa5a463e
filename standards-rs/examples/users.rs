//! Example: users context. One command, one query, an event with two subscribers, and an
//! extra middleware stage that requires an `X-Demo-Key` header.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use http::{HeaderValue, Method, StatusCode};
use serde::Serialize;
use standards_core::middleware::{Exchange, Middleware, Outcome};
use standards_core::telemetry::{self, LogFormat};
use standards_core::RequestHead;
use standards_rs::chrono::{DateTime, Utc};
use standards_rs::{
    async_trait, ApiResponse, Application, CancellationSignal, Command, CommandHandler, DispatchContext,
    DomainError, DomainEvent, EventHandler, HandlerModule, Query, QueryHandler, RegistryBuilder, RegistryError,
    StandardsOptions,
};

#[derive(Clone, Debug, Serialize)]
struct User {
    id: u64,
    name: String,
}

#[derive(Clone, Default)]
struct UserStore {
    users: Arc<Mutex<HashMap<u64, User>>>,
}

impl UserStore {
    fn insert(&self, name: &str) -> u64 {
        let mut users = self.users.lock().unwrap_or_else(|e| e.into_inner());
        let id = users.len() as u64 + 42;
        users.insert(id, User { id, name: name.to_string() });
        id
    }

    fn get(&self, id: u64) -> Option<User> {
        self.users.lock().unwrap_or_else(|e| e.into_inner()).get(&id).cloned()
    }
}

#[derive(Debug, Command)]
#[response(u64)]
struct CreateUser {
    name: String,
}

#[derive(Debug, Query)]
#[response(User)]
struct GetUser {
    id: u64,
}

#[derive(Debug, DomainEvent)]
struct UserCreated {
    user_id: u64,
    occurred_at: DateTime<Utc>,
}

struct CreateUserHandler {
    store: UserStore,
}

#[async_trait]
impl CommandHandler<CreateUser> for CreateUserHandler {
    async fn handle(&self, command: CreateUser, _ctx: &DispatchContext) -> Result<u64, DomainError> {
        if command.name.trim().is_empty() {
            return Err(DomainError::validation(["Name is required"]));
        }
        Ok(self.store.insert(&command.name))
    }
}

struct GetUserHandler {
    store: UserStore,
}

#[async_trait]
impl QueryHandler<GetUser> for GetUserHandler {
    async fn handle(&self, query: GetUser, _ctx: &DispatchContext) -> Result<User, DomainError> {
        self.store
            .get(query.id)
            .ok_or_else(|| DomainError::not_found("User", query.id))
    }
}

struct WelcomeEmail;

#[async_trait]
impl EventHandler<UserCreated> for WelcomeEmail {
    async fn handle(&self, event: &UserCreated, _ctx: &DispatchContext) -> Result<(), DomainError> {
        Err(DomainError::internal(format!("SMTP unavailable, no welcome mail for user {}", event.user_id)))
    }
}

struct AuditLog;

#[async_trait]
impl EventHandler<UserCreated> for AuditLog {
    async fn handle(&self, event: &UserCreated, ctx: &DispatchContext) -> Result<(), DomainError> {
        tracing::info!(user_id = event.user_id, tenant_id = ctx.tenant_id(), "audit: user created");
        Ok(())
    }
}

struct UsersModule;

impl HandlerModule for UsersModule {
    fn register(&self, registry: &mut RegistryBuilder) -> Result<(), RegistryError> {
        registry.container_mut().register_instance(UserStore::default());
        registry.command_handler::<CreateUser, _, _>(|scope| CreateUserHandler {
            store: scope.resolve().unwrap_or_default(),
        })?;
        registry.query_handler::<GetUser, _, _>(|scope| GetUserHandler {
            store: scope.resolve().unwrap_or_default(),
        })?;
        registry
            .event_handler::<UserCreated, _, _>(|_| WelcomeEmail)
            .event_handler::<UserCreated, _, _>(|_| AuditLog);
        Ok(())
    }
}

struct RequireDemoKey;

#[async_trait]
impl Middleware for RequireDemoKey {
    async fn before(&self, exchange: &mut Exchange) -> Option<Outcome> {
        if exchange.head.header("x-demo-key").is_some() {
            return None;
        }
        let body = ApiResponse::<()>::error("Missing X-Demo-Key header", None);
        Some(Outcome::json(StatusCode::UNAUTHORIZED, &body))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    telemetry::init(LogFormat::Pretty);

    let options = StandardsOptions {
        enable_request_logging: true,
        ..StandardsOptions::from_env()?
    };
    let mut app = Application::new(options);
    app.register(&UsersModule)?;
    app.middleware(RequireDemoKey);
    let host = app.build();

    let mut head = RequestHead::new(Method::POST, "/users");
    head.headers.insert("x-demo-key", HeaderValue::from_static("demo"));
    let outcome = host
        .handle(head, CancellationSignal::never(), |uow| async move {
            let id = uow.dispatch_command(CreateUser { name: "Ann".into() }).await?;
            let created: Box<dyn DomainEvent> = Box::new(UserCreated {
                user_id: id,
                occurred_at: Utc::now(),
            });
            uow.dispatch_events(vec![created]).await;
            let user = uow.dispatch_query(GetUser { id }).await?;
            Ok::<_, DomainError>(Outcome::json(StatusCode::CREATED, &ApiResponse::ok(user)))
        })
        .await;
    println!("{} {}", outcome.status, String::from_utf8_lossy(&outcome.body));

    let outcome = host
        .handle(RequestHead::new(Method::GET, "/users/7"), CancellationSignal::never(), |uow| async move {
            let user = uow.dispatch_query(GetUser { id: 7 }).await?;
            Ok::<_, DomainError>(Outcome::json(StatusCode::OK, &ApiResponse::ok(user)))
        })
        .await;
    println!("{} {}", outcome.status, String::from_utf8_lossy(&outcome.body));
    Ok(())
}
