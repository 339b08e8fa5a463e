//! CLI for standards-rs: scaffold commands, queries and event handlers into a context module.

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

fn snake_case(s: &str) -> String {
    let mut out = String::new();
    for (i, c) in s.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

#[derive(Parser)]
#[command(name = "standards")]
#[command(about = "standards-rs scaffolding")]
struct Cli {
    /// Directory that holds the context folders.
    #[arg(long, default_value = ".")]
    root: PathBuf,
    /// Overwrite files that already exist.
    #[arg(long)]
    force: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a command and its handler (e.g. `add-command users CreateUser --response u64`).
    AddCommand {
        /// Context name (e.g. users)
        context: String,
        /// Command name in PascalCase (e.g. CreateUser)
        name: String,
        /// Response type; `()` when omitted.
        #[arg(long)]
        response: Option<String>,
    },
    /// Add a query and its handler.
    AddQuery {
        context: String,
        /// Query name in PascalCase (e.g. GetUser)
        name: String,
        #[arg(long, default_value = "serde_json::Value")]
        response: String,
    },
    /// Add a domain event and one handler subscribed to it.
    AddEvent {
        context: String,
        /// Event name in PascalCase (e.g. UserCreated)
        name: String,
    },
}

const COMMAND_RS: &str = r#"//! Command NAME.
use standards_rs::async_trait;
use standards_rs::{Command, CommandHandler, DispatchContext, DomainError};

#[derive(Clone, Debug, Command)]
#[response(RESPONSE)]
pub struct NAME {}

pub struct NAMEHandler;

#[async_trait]
impl CommandHandler<NAME> for NAMEHandler {
    async fn handle(&self, _command: NAME, _ctx: &DispatchContext) -> Result<RESPONSE, DomainError> {
        Err(DomainError::internal("NAME is not implemented"))
    }
}
"#;

const QUERY_RS: &str = r#"//! Query NAME.
use standards_rs::async_trait;
use standards_rs::{DispatchContext, DomainError, Query, QueryHandler};

#[derive(Clone, Debug, Query)]
#[response(RESPONSE)]
pub struct NAME {}

pub struct NAMEHandler;

#[async_trait]
impl QueryHandler<NAME> for NAMEHandler {
    async fn handle(&self, _query: NAME, _ctx: &DispatchContext) -> Result<RESPONSE, DomainError> {
        Err(DomainError::internal("NAME is not implemented"))
    }
}
"#;

const EVENT_RS: &str = r#"//! Domain event NAME.
use standards_rs::async_trait;
use standards_rs::chrono::{DateTime, Utc};
use standards_rs::{DispatchContext, DomainError, DomainEvent, EventHandler};

#[derive(Clone, Debug, DomainEvent)]
pub struct NAME {
    pub occurred_at: DateTime<Utc>,
}

pub struct NAMEHandler;

#[async_trait]
impl EventHandler<NAME> for NAMEHandler {
    async fn handle(&self, _event: &NAME, _ctx: &DispatchContext) -> Result<(), DomainError> {
        Ok(())
    }
}
"#;

const MODULE_RS: &str = r#"//! Context «CONTEXT»: handler module.
use standards_rs::{HandlerModule, RegistryBuilder, RegistryError};

pub struct CONTEXT_PASCALModule;

impl HandlerModule for CONTEXT_PASCALModule {
    fn register(&self, registry: &mut RegistryBuilder) -> Result<(), RegistryError> {
        // registrations
        Ok(())
    }
}
"#;

enum Kind {
    Command,
    Query,
    Event,
}

fn pascal_case(s: &str) -> String {
    s.split(['_', '-'])
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

fn registration_line(kind: &Kind, file: &str, name: &str) -> String {
    match kind {
        Kind::Command => format!(
            "        registry.command_handler::<{file}::{name}, _, _>(|_| {file}::{name}Handler)?;"
        ),
        Kind::Query => format!(
            "        registry.query_handler::<{file}::{name}, _, _>(|_| {file}::{name}Handler)?;"
        ),
        Kind::Event => format!(
            "        registry.event_handler::<{file}::{name}, _, _>(|_| {file}::{name}Handler);"
        ),
    }
}

fn write_file(path: &Path, contents: &str, force: bool) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    if path.exists() && !force {
        return Err(format!("{} already exists (use --force to overwrite)", path.display()).into());
    }
    fs::write(path, contents)?;
    Ok(())
}

/// Add `mod file;` and the registration line to the context's `mod.rs`, creating it if needed.
fn update_module(dir: &Path, context: &str, file: &str, registration: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let path = dir.join("mod.rs");
    let mut module = if path.exists() {
        fs::read_to_string(&path)?
    } else {
        MODULE_RS
            .replace("CONTEXT_PASCAL", &pascal_case(context))
            .replace("CONTEXT", context)
    };
    let decl = format!("pub mod {};\n", file);
    if !module.contains(&decl) {
        match module.find("use standards_rs") {
            Some(at) => module.insert_str(at, &decl),
            None => module.insert_str(0, &decl),
        }
    }
    if !module.contains(registration.trim()) {
        let marker = "        // registrations\n";
        match module.find(marker) {
            Some(at) => module.insert_str(at + marker.len(), &format!("{}\n", registration)),
            None => return Err(format!("{}: registration marker not found", path.display()).into()),
        }
    }
    fs::write(path, module)?;
    Ok(())
}

fn run_add(
    root: &Path,
    force: bool,
    kind: Kind,
    context: &str,
    name: &str,
    response: &str,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let file = snake_case(name);
    let dir = root.join(context);
    fs::create_dir_all(&dir)?;

    let template = match kind {
        Kind::Command => COMMAND_RS,
        Kind::Query => QUERY_RS,
        Kind::Event => EVENT_RS,
    };
    let contents = template.replace("RESPONSE", response).replace("NAME", name);
    write_file(&dir.join(format!("{}.rs", file)), &contents, force)?;
    update_module(&dir, context, &file, &registration_line(&kind, &file, name))?;

    println!("Generated {}/{}.rs and registered it in {}/mod.rs", context, file, context);
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cli = Cli::parse();
    match cli.command {
        Commands::AddCommand {
            context,
            name,
            response,
        } => run_add(
            &cli.root,
            cli.force,
            Kind::Command,
            &context,
            &name,
            response.as_deref().unwrap_or("()"),
        ),
        Commands::AddQuery {
            context,
            name,
            response,
        } => run_add(&cli.root, cli.force, Kind::Query, &context, &name, &response),
        Commands::AddEvent { context, name } => {
            run_add(&cli.root, cli.force, Kind::Event, &context, &name, "()")
        }
    }
}
