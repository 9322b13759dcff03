//! Command-line front end for the recipe search service.
//!
//! Loads configuration, hydrates a search surface from a location query
//! string, runs one search through the bus and the controller, and prints
//! the settled page as JSON.

use anyhow::{Context, Result, anyhow};
use recipe_core::bus::{BusMessage, SearchBus};
use recipe_core::RequestLifecycleManager;
use recipe_core::config::{AppConfig, app_config_path, load_config};
use recipe_core::search::url::{QueryScope, to_query_string};
use recipe_core::search::{
    HttpSearchClient, MemoryHistory, SearchController, SearchDispatch, SearchFilters,
};
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*, reload};

type ReloadHandle = reload::Handle<EnvFilter, tracing_subscriber::Registry>;

const USAGE: &str = "Usage: recipe-finder [--config <path>] [<query-string> | <search text>]\n\
                     e.g. recipe-finder 'q=ramen&cuisine=japanese&page=2'";
const LOCATION_PATH: &str = "/search";

struct CliArgs {
    config_path: Option<PathBuf>,
    query: String,
}

fn main() {
    let reload_handle = init_tracing();
    if let Err(err) = run(&reload_handle) {
        error!("{err:?}");
        std::process::exit(1);
    }
}

fn run(reload_handle: &ReloadHandle) -> Result<()> {
    let args = parse_args()?;
    let config_path = args.config_path.unwrap_or_else(app_config_path);
    let config = load_config(&config_path);
    set_log_level(reload_handle, config.log_level.as_filter_str());
    info!(
        endpoint = %config.search_endpoint(),
        level = %config.log_level,
        max_concurrent = config.max_concurrent_requests,
        "Starting recipe finder"
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start the async runtime")?;
    runtime.block_on(search_once(config, args.query))
}

async fn search_once(config: AppConfig, query: String) -> Result<()> {
    let backend = HttpSearchClient::from_config(&config).context("Invalid search endpoint")?;
    let history = MemoryHistory::with_query(LOCATION_PATH, &query);
    let bus = SearchBus::default();
    let mut inbox = bus.subscribe();
    let lifecycle = RequestLifecycleManager::new(config.lifecycle_options());
    let mut controller = SearchController::from_config(
        &config,
        Arc::new(backend),
        Box::new(history.clone()),
        lifecycle,
    )
    .with_bus(bus);

    controller.request_search();
    let message = inbox
        .recv()
        .await
        .ok_or_else(|| anyhow!("Search bus closed before the request was delivered"))?;
    let dispatch = controller
        .handle_message(&message)
        .ok_or_else(|| anyhow!("Unexpected bus message: {}", message.name()))?;

    let results = match dispatch {
        SearchDispatch::Cached(results) => results,
        SearchDispatch::Pending(search) => {
            let outcome = tokio::select! {
                outcome = search.settle() => outcome,
                _ = tokio::signal::ctrl_c() => {
                    warn!("Received Ctrl+C; cancelling search");
                    controller.shutdown();
                    return Ok(());
                }
            };
            controller
                .apply_outcome(outcome)?
                .ok_or_else(|| anyhow!("Search was cancelled before it settled"))?
        }
    };

    while let Some(message) = inbox.try_recv() {
        if let BusMessage::SearchSettled(event) = message {
            info!(
                request_id = event.request_id,
                phase = %event.phase,
                total = ?event.total,
                "Search settled"
            );
        }
    }
    info!(location = %history.href(), "Location after search");
    println!(
        "{}",
        serde_json::to_string_pretty(&results).context("Failed to render results")?
    );
    Ok(())
}

fn parse_args() -> Result<CliArgs> {
    let mut args = env::args().skip(1);
    let mut parsed = CliArgs {
        config_path: None,
        query: String::new(),
    };
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                let path = args.next().ok_or_else(|| anyhow!(USAGE))?;
                parsed.config_path = Some(PathBuf::from(path));
            }
            "-h" | "--help" => return Err(anyhow!(USAGE)),
            _ if parsed.query.is_empty() => parsed.query = location_query(&arg),
            _ => return Err(anyhow!(USAGE)),
        }
    }
    Ok(parsed)
}

/// Plain text becomes `q=<text>`; anything with `=` is taken as a query string.
fn location_query(arg: &str) -> String {
    if arg.contains('=') {
        arg.trim_start_matches('?').to_string()
    } else {
        let filters = SearchFilters {
            query: arg.to_string(),
            ..SearchFilters::default()
        };
        to_query_string(&filters, QueryScope::Location)
    }
}

fn init_tracing() -> ReloadHandle {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let (filter_layer, handle) = reload::Layer::new(env_filter);
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_filter(filter_layer),
        )
        .init();
    handle
}

fn set_log_level(handle: &ReloadHandle, level: &str) {
    if env::var_os("RUST_LOG").is_some() {
        return;
    }
    let parsed = EnvFilter::builder()
        .parse(level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    if let Err(err) = handle.modify(|filter| *filter = parsed.clone()) {
        warn!(%level, "Failed to update log level from config: {err}");
    } else {
        info!(%level, "Applied log level from config");
    }
}
