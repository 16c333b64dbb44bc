use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use client::cache::{CacheStore, FileCache, MemoryCache};
use client::endpoints::{EndpointCandidates, probe_target};
use client::fetch::HttpFetcher;
use client::network::{DEFAULT_PROBE_INTERVAL, NetworkMonitor};
use client::transport::WsConnector;
use client::{ClientError, Collaborators, ConnectionState, DashboardView, ManagerConfig, ManagerHandle, StatusIndicator};
use events::{Action, DomainEvent, Origin};
use serde_json::{Map, Value};
use tokio::io::{AsyncBufReadExt, BufReader};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned {status}: {message}")]
    ServerError { status: u16, message: String },
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error(transparent)]
    Client(#[from] ClientError),
}

#[derive(Parser, Debug)]
#[command(name = "fleet", about = "Fleet maintenance API and live dashboard CLI")]
struct Cli {
    #[arg(long, env = "FLEET_BASE_URL", default_value = "http://127.0.0.1:3000")]
    base_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone)]
struct CliContext {
    base_url: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    Ping,
    Api(ApiCommand),
    /// Follow the live dashboard with polling and offline fallback.
    Watch(WatchArgs),
}

#[derive(Args, Debug)]
struct ApiCommand {
    #[command(subcommand)]
    command: ApiSubcommand,
}

#[derive(Subcommand, Debug)]
enum ApiSubcommand {
    Stats,
    Trash,
    Truck(TruckCommand),
    Maintenance(MaintenanceCommand),
}

#[derive(Args, Debug)]
struct TruckCommand {
    #[command(subcommand)]
    command: TruckSubcommand,
}

#[derive(Subcommand, Debug)]
enum TruckSubcommand {
    List {
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        limit: Option<usize>,
    },
    Get {
        truck_id: Uuid,
    },
    Create(TruckFields),
    Update {
        truck_id: Uuid,
        #[command(flatten)]
        fields: TruckFields,
    },
    Delete {
        truck_id: Uuid,
    },
    Restore {
        truck_id: Uuid,
    },
}

#[derive(Args, Debug, Default)]
struct TruckFields {
    #[arg(long)]
    vin: Option<String>,
    #[arg(long)]
    make: Option<String>,
    #[arg(long)]
    model: Option<String>,
    #[arg(long)]
    year: Option<i32>,
    #[arg(long)]
    license_plate: Option<String>,
    #[arg(long)]
    mileage: Option<i64>,
    #[arg(long)]
    status: Option<String>,
}

#[derive(Args, Debug)]
struct MaintenanceCommand {
    #[command(subcommand)]
    command: MaintenanceSubcommand,
}

#[derive(Subcommand, Debug)]
enum MaintenanceSubcommand {
    List {
        #[arg(long)]
        truck_id: Option<Uuid>,
        #[arg(long)]
        limit: Option<usize>,
    },
    Get {
        record_id: Uuid,
    },
    Create {
        #[arg(long, help = "Maintenance record JSON")]
        data: String,
    },
    Update {
        record_id: Uuid,
        #[arg(long, help = "Maintenance record JSON")]
        data: String,
    },
    Delete {
        record_id: Uuid,
    },
    Restore {
        record_id: Uuid,
    },
}

#[derive(Args, Debug)]
struct WatchArgs {
    #[arg(long, help = "Live endpoint tried before every other candidate")]
    socket_url: Option<String>,

    #[arg(long, default_value_t = false)]
    no_polling: bool,

    #[arg(long, default_value_t = false)]
    no_cache: bool,

    #[arg(long, help = "Polling interval in milliseconds")]
    interval_ms: Option<u64>,

    #[arg(long, env = "FLEET_CACHE_DIR", help = "Persist the offline cache in this directory")]
    cache_dir: Option<PathBuf>,

    #[arg(long, default_value_t = false, help = "Probe the server host to detect network loss")]
    probe: bool,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let cli = Cli::parse();
    let ctx = CliContext { base_url: cli.base_url.trim_end_matches('/').to_owned() };

    match cli.command {
        Command::Ping => run_ping(&ctx).await,
        Command::Api(api) => run_api(&ctx, api).await,
        Command::Watch(args) => run_watch(&ctx, args).await,
    }
}

async fn run_ping(cli: &CliContext) -> Result<(), CliError> {
    let client = reqwest::Client::new();
    for path in ["/healthz", "/api/health/db"] {
        let response = client.get(format!("{}{path}", cli.base_url)).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(CliError::ServerError {
                status: status.as_u16(),
                message: format!("{path} check failed"),
            });
        }
    }
    println!("ok");
    Ok(())
}

// =============================================================================
// API
// =============================================================================

async fn run_api(cli: &CliContext, api: ApiCommand) -> Result<(), CliError> {
    let json = match api.command {
        ApiSubcommand::Stats => api_request(cli, reqwest::Method::GET, "/api/dashboard/stats", &[], None).await?,
        ApiSubcommand::Trash => api_request(cli, reqwest::Method::GET, "/api/admin/trash", &[], None).await?,
        ApiSubcommand::Truck(truck) => run_api_truck(cli, truck).await?,
        ApiSubcommand::Maintenance(maintenance) => run_api_maintenance(cli, maintenance).await?,
    };
    print_json(&json)
}

async fn run_api_truck(cli: &CliContext, truck: TruckCommand) -> Result<Value, CliError> {
    match truck.command {
        TruckSubcommand::List { search, status, limit } => {
            let query = [("search", search), ("status", status), ("limit", limit.map(|limit| limit.to_string()))];
            api_request(cli, reqwest::Method::GET, "/api/trucks", &query, None).await
        }
        TruckSubcommand::Get { truck_id } => {
            api_request(cli, reqwest::Method::GET, &format!("/api/trucks/{truck_id}"), &[], None).await
        }
        TruckSubcommand::Create(fields) => {
            api_request(cli, reqwest::Method::POST, "/api/trucks", &[], Some(truck_body(fields))).await
        }
        TruckSubcommand::Update { truck_id, fields } => {
            let path = format!("/api/trucks/{truck_id}");
            api_request(cli, reqwest::Method::PUT, &path, &[], Some(truck_body(fields))).await
        }
        TruckSubcommand::Delete { truck_id } => {
            api_request(cli, reqwest::Method::DELETE, &format!("/api/trucks/{truck_id}"), &[], None).await
        }
        TruckSubcommand::Restore { truck_id } => restore(cli, "truck", truck_id).await,
    }
}

async fn run_api_maintenance(cli: &CliContext, maintenance: MaintenanceCommand) -> Result<Value, CliError> {
    match maintenance.command {
        MaintenanceSubcommand::List { truck_id, limit } => {
            let query = [("truck_id", truck_id.map(|id| id.to_string())), ("limit", limit.map(|limit| limit.to_string()))];
            api_request(cli, reqwest::Method::GET, "/api/maintenance", &query, None).await
        }
        MaintenanceSubcommand::Get { record_id } => {
            api_request(cli, reqwest::Method::GET, &format!("/api/maintenance/{record_id}"), &[], None).await
        }
        MaintenanceSubcommand::Create { data } => {
            let body = serde_json::from_str::<Value>(&data)?;
            api_request(cli, reqwest::Method::POST, "/api/maintenance", &[], Some(body)).await
        }
        MaintenanceSubcommand::Update { record_id, data } => {
            let body = serde_json::from_str::<Value>(&data)?;
            let path = format!("/api/maintenance/{record_id}");
            api_request(cli, reqwest::Method::PUT, &path, &[], Some(body)).await
        }
        MaintenanceSubcommand::Delete { record_id } => {
            api_request(cli, reqwest::Method::DELETE, &format!("/api/maintenance/{record_id}"), &[], None).await
        }
        MaintenanceSubcommand::Restore { record_id } => restore(cli, "maintenance", record_id).await,
    }
}

async fn restore(cli: &CliContext, kind: &str, id: Uuid) -> Result<Value, CliError> {
    let body = serde_json::json!({ "type": kind, "id": id.to_string() });
    api_request(cli, reqwest::Method::POST, "/api/admin/trash/restore", &[], Some(body)).await
}

fn truck_body(fields: TruckFields) -> Value {
    let mut body = Map::new();
    if let Some(vin) = fields.vin {
        body.insert("vin".to_owned(), Value::String(vin));
    }
    if let Some(make) = fields.make {
        body.insert("make".to_owned(), Value::String(make));
    }
    if let Some(model) = fields.model {
        body.insert("model".to_owned(), Value::String(model));
    }
    if let Some(year) = fields.year {
        body.insert("year".to_owned(), Value::from(year));
    }
    if let Some(plate) = fields.license_plate {
        body.insert("license_plate".to_owned(), Value::String(plate));
    }
    if let Some(mileage) = fields.mileage {
        body.insert("current_mileage".to_owned(), Value::from(mileage));
    }
    if let Some(status) = fields.status {
        body.insert("status".to_owned(), Value::String(status));
    }
    Value::Object(body)
}

/// Query pairs with a `None` value are left out.
fn build_request(
    client: &reqwest::Client,
    cli: &CliContext,
    method: reqwest::Method,
    path: &str,
    query: &[(&str, Option<String>)],
    body: Option<Value>,
) -> reqwest::RequestBuilder {
    let present: Vec<(&str, &str)> =
        query.iter().filter_map(|(key, value)| value.as_deref().map(|value| (*key, value))).collect();
    let request = client.request(method, format!("{}{}", cli.base_url, path)).query(&present);
    if let Some(json) = body { request.json(&json) } else { request }
}

async fn api_request(
    cli: &CliContext,
    method: reqwest::Method,
    path: &str,
    query: &[(&str, Option<String>)],
    body: Option<Value>,
) -> Result<Value, CliError> {
    let client = reqwest::Client::new();
    let response = build_request(&client, cli, method, path, query, body).send().await?;
    let status = response.status();
    let value = response.json::<Value>().await.unwrap_or_else(|_| Value::Null);

    if !status.is_success() {
        let message = value.get("error").and_then(Value::as_str).map_or_else(|| value.to_string(), ToOwned::to_owned);
        return Err(CliError::ServerError { status: status.as_u16(), message });
    }

    Ok(value)
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}

// =============================================================================
// WATCH
// =============================================================================

fn watch_config(cli: &CliContext, args: &WatchArgs) -> ManagerConfig {
    let mut config = ManagerConfig::from_env_with(
        EndpointCandidates::new()
            .with_overrides(args.socket_url.clone())
            .with_page_origin(Some(cli.base_url.clone())),
    );
    config.polling_enabled &= !args.no_polling;
    config.cache_enabled &= !args.no_cache;
    if let Some(ms) = args.interval_ms {
        config = config.with_polling_interval(Duration::from_millis(ms));
    }
    if args.cache_dir.is_some() {
        config.cache_dir.clone_from(&args.cache_dir);
    }
    config
}

async fn run_watch(cli: &CliContext, args: WatchArgs) -> Result<(), CliError> {
    let config = watch_config(cli, &args);
    let recent_limit = config.recent_limit;

    let cache: Arc<dyn CacheStore> = match &config.cache_dir {
        Some(dir) => Arc::new(FileCache::new(dir)),
        None => Arc::new(MemoryCache::new()),
    };
    let network = NetworkMonitor::new(true);
    let probe = if args.probe {
        probe_target(&cli.base_url).map(|target| network.spawn_probe(target, DEFAULT_PROBE_INTERVAL))
    } else {
        None
    };

    let collaborators = Collaborators {
        connector: Arc::new(WsConnector),
        fetcher: Arc::new(HttpFetcher::new(&cli.base_url, recent_limit)?),
        cache,
        network,
    };
    let (handle, mut events) = ManagerHandle::spawn(config, collaborators);
    let mut state = handle.watch_state();
    let mut view = DashboardView::new(recent_limit);
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    eprintln!("watching {} (r = reconnect, q = quit)", cli.base_url);
    render_status(&state.borrow_and_update());

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                view.apply(&event);
                render_event(&event, &view)?;
            }
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
                render_status(&state.borrow_and_update());
            }
            line = stdin.next_line(), if stdin_open => match line {
                Ok(Some(line)) => match line.trim() {
                    "r" => handle.reconnect(),
                    "q" => break,
                    _ => {}
                },
                Ok(None) | Err(_) => stdin_open = false,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    handle.stop().await;
    if let Some(probe) = probe {
        probe.abort();
    }
    Ok(())
}

fn render_status(state: &ConnectionState) {
    let indicator = StatusIndicator::from_state(state, events::now_ms());
    let endpoint = state.endpoint.as_deref().unwrap_or("-");
    println!(
        "status: {} ({}) endpoint={} retries={} last connected: {}",
        indicator.label, indicator.description, endpoint, state.retry_count, indicator.last_connected
    );
}

fn render_event(event: &DomainEvent, view: &DashboardView) -> Result<(), CliError> {
    println!(
        "[{}] {} {}",
        origin_label(event.origin),
        event.category.cache_key(),
        action_label(event.action)
    );
    let rendered = match event.category {
        events::Category::DashboardStats => view.stats.clone().unwrap_or(Value::Null),
        events::Category::Truck => Value::Array(view.trucks.clone()),
        events::Category::Maintenance => Value::Array(view.maintenance.clone()),
    };
    print_json(&rendered)
}

fn origin_label(origin: Origin) -> &'static str {
    match origin {
        Origin::Live => "live",
        Origin::Poll => "poll",
        Origin::Cache => "cache",
    }
}

fn action_label(action: Action) -> &'static str {
    match action {
        Action::Created => "created",
        Action::Updated => "updated",
        Action::Deleted => "deleted",
        Action::Snapshot => "snapshot",
    }
}
