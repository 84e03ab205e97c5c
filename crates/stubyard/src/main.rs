use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use stubyard::config::{DEFAULT_ADMIN_PORT, DEFAULT_HOST, DEFAULT_STUBS_PORT};
use stubyard::{
    reload_data_file, AdminServer, CacheConfig, FsReader, ReloadWatcher, ServerConfig,
    StubLoader, StubRepository, StubServer,
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Stubyard - HTTP stub server driven by a YAML data file
#[derive(Parser, Debug)]
#[command(name = "stubyard")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// YAML data file with request/response stubs
    #[arg(short, long, env = "STUBYARD_DATA")]
    data: Option<PathBuf>,

    /// Port for the stub portal
    #[arg(short, long, default_value_t = DEFAULT_STUBS_PORT, env = "STUBYARD_STUBS_PORT")]
    stubs: u16,

    /// Port for the admin portal
    #[arg(short, long, default_value_t = DEFAULT_ADMIN_PORT, env = "STUBYARD_ADMIN_PORT")]
    admin: u16,

    /// Hostname or address to bind both portals to
    #[arg(short, long, default_value = DEFAULT_HOST, env = "STUBYARD_LOCATION")]
    location: String,

    /// Do not start the admin portal
    #[arg(long)]
    disable_admin_portal: bool,

    /// Disable caching of request matches
    #[arg(long)]
    disable_stub_caching: bool,

    /// Reload the data file when it or a referenced file changes; optional
    /// poll interval in milliseconds
    #[arg(short, long, value_name = "MS", num_args = 0..=1, default_missing_value = "100")]
    watch: Option<u64>,

    /// Only log warnings and errors
    #[arg(short, long)]
    mute: bool,

    /// Log every incoming request in full
    #[arg(short = 'o', long)]
    debug: bool,

    /// Load the data file, report the number of stubs and exit
    #[arg(long, requires = "data")]
    validate: bool,
}

impl Args {
    fn server_config(&self) -> ServerConfig {
        let config = ServerConfig {
            data_file: self.data.clone(),
            host: self.location.clone(),
            stubs_port: self.stubs,
            admin_port: self.admin,
            admin_enabled: !self.disable_admin_portal,
            cache: CacheConfig {
                enabled: !self.disable_stub_caching,
                ..CacheConfig::default()
            },
            watch: None,
            debug_requests: self.debug,
        };
        match self.watch {
            Some(ms) => config.with_watch(Some(Duration::from_millis(ms))),
            None => config,
        }
    }
}

fn init_tracing(mute: bool) {
    let default_level = if mute { "warn" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.mute);
    let config = args.server_config();

    if args.validate {
        return validate(&config);
    }
    run(config).await
}

fn validate(config: &ServerConfig) -> Result<()> {
    let data_file = config
        .data_file
        .as_deref()
        .context("--validate requires --data")?;
    let loader = StubLoader::for_data_file(data_file, Arc::new(FsReader));
    let records = loader
        .load_file(data_file)
        .with_context(|| format!("Failed to load {}", data_file.display()))?;
    println!("{}: {} stub(s) OK", data_file.display(), records.len());
    Ok(())
}

async fn run(config: ServerConfig) -> Result<()> {
    let repository = Arc::new(StubRepository::new(config.cache.clone()));
    let shutdown = CancellationToken::new();

    let source = match &config.data_file {
        Some(data_file) => {
            let loader = StubLoader::for_data_file(data_file, Arc::new(FsReader));
            let reloaded = reload_data_file(&loader, &repository, data_file)
                .with_context(|| format!("Failed to load {}", data_file.display()))?;
            Some((data_file.clone(), loader, reloaded.stamps))
        }
        None => {
            info!("No data file given, starting with no stubs");
            None
        }
    };

    let stubs_listener = TcpListener::bind(config.stubs_addr()?)
        .await
        .context("Failed to bind stub portal")?;
    let stub_server =
        StubServer::new(Arc::clone(&repository)).with_debug_requests(config.debug_requests);
    let mut tasks = vec![tokio::spawn(stub_server.run(stubs_listener, shutdown.clone()))];

    if config.admin_enabled {
        let admin_listener = TcpListener::bind(config.admin_addr()?)
            .await
            .context("Failed to bind admin portal")?;
        let mut admin = AdminServer::new(Arc::clone(&repository));
        if let Some((data_file, loader, _)) = &source {
            admin = admin.with_data_file(data_file.clone(), loader.clone());
        }
        tasks.push(tokio::spawn(admin.run(admin_listener, shutdown.clone())));
    }

    let watcher = match (source, config.watch) {
        // Baseline is the initial load, not the first poll
        (Some((data_file, loader, stamps)), Some(interval)) => Some(
            ReloadWatcher::new(data_file, interval, loader, Arc::clone(&repository), stamps)
                .spawn(shutdown.child_token()),
        ),
        (None, Some(_)) => {
            info!("--watch ignored without a data file");
            None
        }
        _ => None,
    };

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;
    info!("Shutdown signal received");
    shutdown.cancel();

    if let Some(watcher) = watcher {
        watcher.stop().await;
    }
    for task in tasks {
        match task.await {
            Ok(Err(e)) => error!("Server error: {:#}", e),
            Err(e) => error!("Server task failed: {}", e),
            Ok(Ok(())) => {}
        }
    }
    Ok(())
}
