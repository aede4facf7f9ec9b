use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use cloudmirror::remote::http::extract_items;
use cloudmirror::resource::generic::field_str;
use cloudmirror::{
    Config, ErrorLog, GenericKind, HttpRemoteClient, InMemoryRemote, Module, NotificationLog,
    RemoteClient, Resource, ResourceKind, RootScope, Scope, SyncContext,
};
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// Parent id used for fixtures when none is given
const DEFAULT_PARENT: &str = "/cloudmirror";

/// Mirror a remote resource collection locally and inspect it
#[derive(Parser, Debug)]
#[command(name = "cloudmirror", version = cloudmirror::VERSION, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Serve the collection from a JSON file instead of a REST endpoint
    #[arg(long, global = true, conflicts_with = "endpoint")]
    fixture: Option<PathBuf>,

    /// REST endpoint (remembered in the config file)
    #[arg(long, global = true)]
    endpoint: Option<String>,

    /// Collection path under the endpoint, e.g. "subscriptions/s1/sites"
    #[arg(long, global = true)]
    collection: Option<String>,

    /// Bearer token for the endpoint
    #[arg(long, global = true, env = "CLOUDMIRROR_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Resource group of the parent scope
    #[arg(short, long, global = true)]
    group: Option<String>,

    /// Identity of the parent scope (defaults to the collection's parent path)
    #[arg(long, global = true)]
    parent: Option<String>,

    /// Answer 403 as "not found" (for backends that hide missing items)
    #[arg(long, global = true)]
    forbidden_is_not_found: bool,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value = "json")]
    output: OutputFormat,

    /// Log level for debugging
    #[arg(long, global = true, value_enum, default_value = "off")]
    log_level: LogLevel,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the collection
    List,
    /// Show one resource with its remote snapshot
    Get { name: String },
    /// Delete one resource remotely
    Delete { name: String },
    /// Refresh and list periodically, printing change notifications
    Watch {
        #[arg(long, default_value_t = 3)]
        rounds: u32,
        #[arg(long, default_value_t = 5)]
        interval_secs: u64,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Json,
    Yaml,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

fn setup_logging(level: LogLevel) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let tracing_level = level.to_tracing_level()?;

    let log_path = get_log_path();

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let file = match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
    {
        Ok(file) => file,
        Err(e) => {
            eprintln!("Failed to open log file {:?}: {}", log_path, e);
            return None;
        }
    };

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::fmt()
        .with_max_level(tracing_level)
        .with_writer(non_blocking.with_max_level(tracing_level))
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("cloudmirror started with log level: {:?}", level);
    tracing::info!("Log file: {:?}", log_path);

    Some(guard)
}

fn get_log_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("cloudmirror").join("cloudmirror.log");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".cloudmirror").join("cloudmirror.log");
    }
    PathBuf::from("cloudmirror.log")
}

/// One printed resource
#[derive(Debug, Serialize)]
struct Row {
    name: String,
    id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    resource_group: Option<String>,
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    remote: Option<Value>,
}

impl Row {
    fn new(resource: &Resource<Value>, with_remote: bool) -> Self {
        Self {
            name: resource.name().to_string(),
            id: resource.id().to_string(),
            resource_group: resource.resource_group().map(str::to_string),
            status: resource.status().to_string(),
            remote: if with_remote { resource.remote() } else { None },
        }
    }
}

fn print_output<T: Serialize>(format: OutputFormat, value: &T) -> Result<()> {
    let rendered = match format {
        OutputFormat::Json => serde_json::to_string_pretty(value)?,
        OutputFormat::Yaml => serde_yaml::to_string(value)?,
    };
    println!("{}", rendered.trim_end());
    Ok(())
}

fn load_fixture(path: &Path) -> Result<InMemoryRemote<Value>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read fixture {:?}", path))?;
    let document: Value = serde_json::from_str(&content)
        .with_context(|| format!("Fixture {:?} is not valid JSON", path))?;
    let items = if document.is_array() {
        extract_items(&document, "")
    } else {
        extract_items(&document, "value")
    };
    tracing::info!("Loaded {} fixture items from {:?}", items.len(), path);

    Ok(InMemoryRemote::new(items, |item: &Value| {
        field_str(item, "name").unwrap_or_default()
    })
    .with_group(|item: &Value| field_str(item, "resourceGroup")))
}

/// Remote client plus where its module sits in the resource tree
struct Source {
    client: Arc<dyn RemoteClient<Value>>,
    module_name: String,
    parent_id: String,
}

/// Build the remote client, the module name and the parent id from the arguments
fn build_client(args: &Args, config: &mut Config) -> Result<Source> {
    if let Some(ref fixture) = args.fixture {
        let collection = args.collection.as_deref().unwrap_or("items").trim_matches('/');
        let module_name = collection.rsplit('/').next().unwrap_or("items").to_string();
        return Ok(Source {
            client: Arc::new(load_fixture(fixture)?),
            module_name,
            parent_id: args.parent.clone().unwrap_or_else(|| DEFAULT_PARENT.to_string()),
        });
    }

    let endpoint = args.endpoint.clone().or_else(|| config.endpoint.clone());
    let collection = args.collection.clone().or_else(|| config.collection.clone());
    let (Some(endpoint), Some(collection)) = (endpoint, collection) else {
        bail!("Pass --fixture, or --endpoint and --collection");
    };

    let mut client = HttpRemoteClient::<Value>::new(&endpoint, &collection)?;
    if let Some(ref token) = args.token {
        client = client.with_token(token.clone());
    }

    if args.endpoint.is_some() || args.collection.is_some() {
        if let Err(e) = config.set_endpoint(&endpoint, &collection) {
            tracing::warn!("Failed to save config: {}", e);
        }
    }

    // ids built under the collection's own scope resolve beside the listing URL
    let parent_id = args.parent.clone().unwrap_or_else(|| client.scope_id());
    if parent_id != client.scope_id() {
        tracing::warn!(
            "parent {} differs from the collection scope {}, lookups by id may miss",
            parent_id,
            client.scope_id()
        );
    }
    Ok(Source {
        module_name: client.collection_name().to_string(),
        parent_id,
        client: Arc::new(client),
    })
}

fn print_errors(errors: &ErrorLog) {
    for message in errors.messages() {
        eprintln!("warning: {}", message);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let _log_guard = setup_logging(args.log_level);

    let mut config = Config::load();
    let options = config.cache_options();
    let Source {
        client,
        module_name,
        parent_id,
    } = build_client(&args, &mut config)?;

    let events = Arc::new(NotificationLog::new(config.notification_history));
    let errors = Arc::new(ErrorLog::new());
    let context = SyncContext::new(events.clone(), errors.clone(), options);

    let mut root = RootScope::new(parent_id);
    if let Some(ref group) = args.group {
        root = root.with_resource_group(group);
    }
    let root = Arc::new(root);
    let parent: Weak<dyn Scope> = Arc::downgrade(&root) as Weak<dyn Scope>;

    let mut kind = GenericKind::new(&module_name);
    if args.forbidden_is_not_found {
        kind = kind.with_not_found_status(403);
    }
    let kind: Arc<dyn ResourceKind<Value>> = Arc::new(kind);
    let module = Module::new(module_name, parent, kind, client, context);
    let group = args.group.as_deref();

    match args.command {
        Command::List => {
            let rows: Vec<Row> = module.list().await.iter().map(|r| Row::new(r, false)).collect();
            print_errors(&errors);
            print_output(args.output, &rows)?;
        }
        Command::Get { ref name } => {
            let resource = module
                .get(name, group)
                .await
                .map_err(|e| anyhow!(e.user_message()))?
                .ok_or_else(|| anyhow!("resource \"{}\" not found", name))?;
            print_output(args.output, &Row::new(&resource, true))?;
        }
        Command::Delete { ref name } => {
            module
                .delete(name, group)
                .await
                .map_err(|e| anyhow!(e.user_message()))?;
            eprintln!("deleted {}", name);
        }
        Command::Watch {
            rounds,
            interval_secs,
        } => {
            for round in 0..rounds {
                if round > 0 {
                    tokio::time::sleep(Duration::from_secs(interval_secs)).await;
                    module.refresh();
                }
                let rows: Vec<Row> = module
                    .list()
                    .await
                    .iter()
                    .map(|r| Row::new(r, false))
                    .collect();
                print_output(args.output, &rows)?;

                // let the debounced notifications of this round land
                tokio::time::sleep(options.debounce_delay + Duration::from_millis(50)).await;
                for notification in events.drain() {
                    eprintln!("# {}", notification);
                }
                print_errors(&errors);
            }
        }
    }

    drop(root);
    Ok(())
}
