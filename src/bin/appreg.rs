//! Application registry management CLI.
//!
//! Creates, reads, lists, updates and deletes applications against the
//! storage backend selected by the environment (`STORAGE_BACKEND`,
//! `DATABASE_URL`, `CACHE_BACKEND`, ...).
//!
//! ```bash
//! STORAGE_BACKEND=sqlite appreg create --file app.json
//! appreg --format table get --client-id 3f1c...
//! appreg list --offset 0 --limit 20
//! appreg update --id <app-id> --file app.json
//! appreg delete --id <app-id>
//! ```
//!
//! Exit codes: 0 success, 1 general error, 2 rejected request, 3 registry failure.

use appreg::certificates::MemoryCertificateService;
use appreg::config::Config;
use appreg::errors::{ApplicationError, ErrorType};
use appreg::registry::{
    ApplicationRequest, ApplicationService, Page, StaticFlowRegistry, load_applications,
};
use appreg::storage::cache::{ApplicationCaches, parse_cache_backend};
use appreg::storage::{
    ApplicationStore, CachedApplicationStore, ImmutableApplicationStore, create_storage_backend,
    parse_storage_backend,
};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use tracing_subscriber::prelude::*;

#[derive(Parser)]
#[command(
    name = "appreg",
    about = "Application registry management CLI",
    version = env!("CARGO_PKG_VERSION")
)]
struct Cli {
    /// Output format
    #[arg(long, value_enum, default_value = "json-pretty")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

/// Output format options
#[derive(Debug, Clone, ValueEnum)]
enum OutputFormat {
    /// JSON formatted output
    Json,
    /// Pretty-printed JSON output
    JsonPretty,
    /// Human-readable table format
    Table,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an application from a JSON request file
    Create(CreateArgs),
    /// Show one application
    Get(GetArgs),
    /// List applications
    List(ListArgs),
    /// Replace an application from a JSON request file
    Update(UpdateArgs),
    /// Delete an application
    Delete(DeleteArgs),
}

#[derive(Args)]
struct CreateArgs {
    /// Path to the application request (JSON)
    #[arg(long)]
    file: PathBuf,
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct GetArgs {
    /// Application id
    #[arg(long)]
    id: Option<String>,

    /// Application name
    #[arg(long)]
    name: Option<String>,

    /// OAuth client id
    #[arg(long)]
    client_id: Option<String>,
}

#[derive(Args)]
struct ListArgs {
    #[arg(long, default_value_t = 0)]
    offset: usize,

    /// Page size; all applications when omitted
    #[arg(long)]
    limit: Option<usize>,
}

#[derive(Args)]
struct UpdateArgs {
    /// Application id
    #[arg(long)]
    id: String,

    /// Path to the application request (JSON)
    #[arg(long)]
    file: PathBuf,
}

#[derive(Args)]
struct DeleteArgs {
    /// Application id
    #[arg(long)]
    id: String,
}

/// CLI errors
#[derive(Debug)]
enum AppError {
    /// Startup and wiring failures
    Setup(anyhow::Error),
    /// Unreadable or malformed input files
    Input(String),
    /// JSON serialization errors
    Json(serde_json::Error),
    /// Registry operation failures
    Registry(ApplicationError),
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Setup(err)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Json(err)
    }
}

impl From<ApplicationError> for AppError {
    fn from(err: ApplicationError) -> Self {
        AppError::Registry(err)
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppError::Setup(err) => write!(f, "Setup error: {:#}", err),
            AppError::Input(msg) => write!(f, "Input error: {}", msg),
            AppError::Json(err) => write!(f, "JSON error: {}", err),
            AppError::Registry(err) => write!(f, "{}", err),
        }
    }
}

impl AppError {
    fn exit_code(&self) -> i32 {
        match self {
            AppError::Registry(err) => match err.error_type() {
                ErrorType::Client => 2,
                ErrorType::Server => 3,
            },
            _ => 1,
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "appreg=debug,info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().pretty().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    if let Err(err) = run(&cli).await {
        eprintln!("Error: {}", err);
        process::exit(err.exit_code());
    }
}

async fn run(cli: &Cli) -> Result<(), AppError> {
    let config = Config::new()?;
    tracing::info!(version = %config.version, "starting appreg");

    let service = build_service(&config).await?;

    match &cli.command {
        Commands::Create(args) => {
            let request = read_request(&args.file).await?;
            let view = service.create_application(&request).await?;
            output_response(&cli.format, &view)
        }
        Commands::Get(args) => {
            if let Some(id) = &args.id {
                output_response(&cli.format, &service.get_application(id).await?)
            } else if let Some(name) = &args.name {
                output_response(&cli.format, &service.get_application_by_name(name).await?)
            } else if let Some(client_id) = &args.client_id {
                output_response(&cli.format, &service.get_oauth_client(client_id).await?)
            } else {
                Err(AppError::Input(
                    "one of --id, --name or --client-id is required".to_string(),
                ))
            }
        }
        Commands::List(args) => {
            let page = args.limit.map(|limit| Page {
                offset: args.offset,
                limit,
            });
            output_response(&cli.format, &service.list_applications(page).await?)
        }
        Commands::Update(args) => {
            let request = read_request(&args.file).await?;
            let view = service.update_application(&args.id, &request).await?;
            output_response(&cli.format, &view)
        }
        Commands::Delete(args) => {
            service.delete_application(&args.id).await?;
            output_response(&cli.format, &serde_json::json!({ "deleted": args.id }))
        }
    }
}

/// Wire storage, cache and collaborators from configuration
async fn build_service(config: &Config) -> Result<ApplicationService, AppError> {
    let certificates = Arc::new(MemoryCertificateService::new());
    let flows = Arc::new(StaticFlowRegistry::new(config.flow_graph_ids.as_ref().clone()));

    let cache_backend = parse_cache_backend(
        &config.cache_backend,
        config.redis_url.as_deref(),
        *config.cache_ttl.as_ref(),
        *config.cache_max_entries.as_ref(),
    )
    .map_err(anyhow::Error::from)?;
    let caches = ApplicationCaches::new(&cache_backend).map_err(anyhow::Error::from)?;

    if *config.immutable_resources_enabled.as_ref() {
        let immutable = Arc::new(ImmutableApplicationStore::new());
        let store: Arc<dyn ApplicationStore> =
            Arc::new(CachedApplicationStore::new(immutable.clone(), caches));
        let service = ApplicationService::new(
            store,
            certificates,
            flows,
            config.registry_settings(),
        );
        load_applications(Path::new(&config.immutable_resources_path), &service).await?;
        immutable.seal();
        return Ok(service);
    }

    let backend = parse_storage_backend(&config.storage_backend, config.database_url.as_deref())
        .map_err(anyhow::Error::from)?;
    tracing::info!(backend = %config.storage_backend, "using storage backend");
    let inner = create_storage_backend(backend, &config.deployment_id)
        .await
        .map_err(anyhow::Error::from)?;
    let store: Arc<dyn ApplicationStore> = Arc::new(CachedApplicationStore::new(inner, caches));

    Ok(ApplicationService::new(
        store,
        certificates,
        flows,
        config.registry_settings(),
    ))
}

async fn read_request(path: &Path) -> Result<ApplicationRequest, AppError> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| AppError::Input(format!("Failed to read {}: {}", path.display(), e)))?;
    serde_json::from_str(&contents)
        .map_err(|e| AppError::Input(format!("Invalid request in {}: {}", path.display(), e)))
}

/// Output response data in the specified format
fn output_response<T: Serialize>(format: &OutputFormat, data: &T) -> Result<(), AppError> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string(data)?);
        }
        OutputFormat::JsonPretty => {
            println!("{}", serde_json::to_string_pretty(data)?);
        }
        OutputFormat::Table => {
            let json_value: Value = serde_json::to_value(data)?;
            print_table(&json_value, 0);
        }
    }
    Ok(())
}

/// Print data in table format (recursive for nested objects)
fn print_table(value: &Value, indent: usize) {
    let prefix = "  ".repeat(indent);

    match value {
        Value::Object(map) => {
            for (key, val) in map {
                match val {
                    Value::Object(_) => {
                        println!("{}{}:", prefix, key);
                        print_table(val, indent + 1);
                    }
                    Value::Array(items) => {
                        println!("{}{}:", prefix, key);
                        for item in items {
                            print_table(item, indent + 1);
                        }
                    }
                    _ => println!("{}{}: {}", prefix, key, format_value(val)),
                }
            }
        }
        _ => println!("{}- {}", prefix, format_value(value)),
    }
}

fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "-".to_string(),
        other => other.to_string(),
    }
}
