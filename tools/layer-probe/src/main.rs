//! WMS probe CLI.
//!
//! Resolves layers against live WMS services and prints the negotiated
//! tile configuration, for checking what a globe client would end up
//! requesting.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use globe_layers::{
    capabilities_request_url, completion_channel, CapabilitiesFetcher, CreationCallback,
    HttpFetcher, ImageLayer, LayerError, LayerFactory, ResolutionConfig, TaskService,
    TaskServiceConfig,
};
use wms_capabilities::WmsCapabilities;

#[derive(Parser)]
#[command(name = "layer-probe")]
#[command(about = "Probe WMS services and resolve layers into tile pyramids", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level
    #[arg(long, default_value = "warn", global = true)]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a layer and print the negotiated tile source
    Resolve {
        /// WMS service address
        #[arg(short, long, env = "WMS_SERVICE_URL")]
        service: String,

        /// Layer name to resolve
        #[arg(short, long)]
        layer: String,

        /// Connect timeout in seconds
        #[arg(long, default_value = "3")]
        connect_timeout: u64,

        /// Request timeout in seconds
        #[arg(long, default_value = "30")]
        fetch_timeout: u64,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the named layers a service advertises
    Layers {
        /// WMS service address
        #[arg(short, long, env = "WMS_SERVICE_URL")]
        service: String,

        /// Print the list as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(&cli.log_level)?;

    match cli.command {
        Commands::Resolve {
            service,
            layer,
            connect_timeout,
            fetch_timeout,
            json,
        } => resolve(service, layer, connect_timeout, fetch_timeout, json).await,
        Commands::Layers { service, json } => list_layers(service, json).await,
    }
}

fn init_tracing(log_level: &str) -> Result<()> {
    let level = match log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::WARN,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

/// Outcome flag the callback sets, read back by the command after the
/// completion pump runs.
#[derive(Default)]
struct ProbeOutcome {
    failed: AtomicBool,
    message: Mutex<Option<String>>,
}

struct ProbeCallback {
    outcome: Arc<ProbeOutcome>,
    json: bool,
}

impl CreationCallback for ProbeCallback {
    fn creation_succeeded(&self, _factory: &LayerFactory, layer: &Arc<ImageLayer>) {
        print_resolved(layer, self.json);
    }

    fn creation_failed(&self, _factory: &LayerFactory, _layer: &Arc<ImageLayer>, error: LayerError) {
        self.outcome.failed.store(true, Ordering::SeqCst);
        *self.outcome.message.lock().unwrap() = Some(error.to_string());
    }
}

async fn resolve(
    service: String,
    layer: String,
    connect_timeout: u64,
    fetch_timeout: u64,
    json: bool,
) -> Result<()> {
    let (task_service, submitter) = TaskService::new(&TaskServiceConfig::default());
    tokio::spawn(task_service.run());

    let (sender, mut completions) = completion_channel();

    let config = ResolutionConfig {
        connect_timeout: Duration::from_secs(connect_timeout),
        fetch_timeout: Duration::from_secs(fetch_timeout),
    };
    let factory = LayerFactory::with_config(submitter, sender, &config);

    let outcome = Arc::new(ProbeOutcome::default());
    let callback = Arc::new(ProbeCallback {
        outcome: outcome.clone(),
        json,
    });

    if !json {
        println!("Resolving '{layer}' against {service}");
    }

    factory.create_from_wms(&service, &layer, callback)?;

    // A rejected submission fails through the callback before the creation
    // call returns; only wait on the pump when that did not happen.
    if !outcome.failed.load(Ordering::SeqCst) && !completions.deliver_next().await {
        anyhow::bail!("resolution pipeline shut down before delivering an outcome");
    }

    if outcome.failed.load(Ordering::SeqCst) {
        let message = outcome
            .message
            .lock()
            .unwrap()
            .take()
            .unwrap_or_else(|| "unknown failure".to_string());
        anyhow::bail!("{message}");
    }

    Ok(())
}

fn print_resolved(layer: &Arc<ImageLayer>, json: bool) {
    let source = match layer.source() {
        Some(source) => source,
        None => return,
    };

    let levels = source.level_set();
    let sector = levels.sector;
    let sample_url = source.url_for_tile(&sector, levels.tile_width, levels.tile_height);

    if json {
        let value = serde_json::json!({
            "layer": layer.name(),
            "title": layer.display_name(),
            "num_levels": levels.num_levels(),
            "sector": sector,
            "tile_width": levels.tile_width,
            "tile_height": levels.tile_height,
            "sample_tile_url": sample_url,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&value).expect("render JSON")
        );
        return;
    }

    println!("✓ Layer resolved: {}", layer.name());
    if let Some(title) = layer.display_name() {
        println!("  Title:       {title}");
    }
    println!("  Levels:      {}", levels.num_levels());
    println!(
        "  Sector:      {},{} to {},{}",
        sector.min_lat, sector.min_lon, sector.max_lat, sector.max_lon
    );
    println!(
        "  Finest:      {:.6} deg/px",
        levels.last_level().texel_size()
    );
    println!("  Sample tile: {sample_url}");
}

async fn list_layers(service: String, json: bool) -> Result<()> {
    let fetcher = HttpFetcher::new(&ResolutionConfig::default());
    let url = capabilities_request_url(&service);

    let body = fetcher.fetch(&url).await?;
    let caps = WmsCapabilities::parse(&body)?;
    let layers = caps.named_layers();

    if json {
        println!("{}", serde_json::to_string_pretty(&layers)?);
        return Ok(());
    }

    println!(
        "Service: {} (WMS {})",
        caps.service_title.as_deref().unwrap_or("unnamed"),
        caps.version
    );
    println!("Named layers: {}", layers.len());
    for layer in layers {
        let name = layer.name.as_deref().unwrap_or("-");
        let title = layer.title.as_deref().unwrap_or("");
        println!("  {name:<32} {title}");
    }

    Ok(())
}
