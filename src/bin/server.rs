//! FUQLdb Server Binary
//!
//! Starts the TCP server for FUQLdb, or writes a config file with `--init`.

use std::path::PathBuf;

use clap::Parser;
use fuqldb::network::Server;
use fuqldb::{Config, Dispatcher, Engine};
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::iterator::Signals;
use tracing_subscriber::{fmt, EnvFilter};

/// FUQLdb Server
#[derive(Parser, Debug)]
#[command(name = "fuqldb-server")]
#[command(about = "In-memory multi-tenant data store")]
#[command(version)]
struct Args {
    /// Write a config file and exit
    #[arg(long, num_args = 3, value_names = ["NAME", "STORAGE_PATH", "SEX_NUMBER"])]
    init: Option<Vec<String>>,

    /// Config file location (defaults to the platform path)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address (host:port), overrides the config file
    #[arg(short, long)]
    listen: Option<String>,
}

fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,fuqldb=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();
    let config_path = args.config.clone().unwrap_or_else(Config::default_path);

    if let Some(init) = args.init {
        std::process::exit(run_init(&config_path, &init));
    }

    tracing::info!("FUQLdb Server v{}", fuqldb::VERSION);

    let mut config = match Config::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Failed to load config from {}: {}", config_path.display(), e);
            std::process::exit(1);
        }
    };
    if let Some(listen) = args.listen {
        config.listen_addr = listen;
    }

    tracing::info!("Database name: {}", config.database_name);
    tracing::info!("Storage path: {}", config.storage_path.display());
    tracing::info!("Listen address: {}", config.listen_addr);

    let engine = match Engine::open(config.clone()) {
        Ok(engine) => engine,
        Err(e) => {
            tracing::error!("Failed to open engine: {}", e);
            std::process::exit(1);
        }
    };

    let dispatcher = match Dispatcher::spawn(engine) {
        Ok(dispatcher) => dispatcher,
        Err(e) => {
            tracing::error!("Failed to start dispatcher: {}", e);
            std::process::exit(1);
        }
    };

    let server = match Server::bind(config, dispatcher.handle()) {
        Ok(server) => server,
        Err(e) => {
            tracing::error!("Failed to bind: {}", e);
            std::process::exit(1);
        }
    };

    // SIGINT / SIGTERM stop the accept loop; saving happens below
    let mut signals = match Signals::new([SIGINT, SIGTERM]) {
        Ok(signals) => signals,
        Err(e) => {
            tracing::error!("Failed to register signal handlers: {}", e);
            std::process::exit(1);
        }
    };
    let stop = server.shutdown_flag();
    std::thread::spawn(move || {
        if let Some(signal) = signals.forever().next() {
            tracing::info!("Received signal {}, initiating shutdown...", signal);
            stop.store(true, std::sync::atomic::Ordering::SeqCst);
        }
    });

    let served = server.run();
    if let Err(ref e) = served {
        tracing::error!("Server error: {}", e);
    }

    match dispatcher.shutdown() {
        Ok(_) if served.is_ok() => std::process::exit(0),
        Ok(_) => std::process::exit(1),
        Err(e) => {
            tracing::error!("Shutdown failed: {}", e);
            std::process::exit(1);
        }
    }
}

/// `--init <name> <storage_path> <sex_number>`
fn run_init(config_path: &std::path::Path, init: &[String]) -> i32 {
    let [name, storage_path, sex] = init else {
        tracing::error!("--init takes exactly three values");
        return 1;
    };
    let sex_number: i64 = match sex.parse() {
        Ok(n) => n,
        Err(_) => {
            tracing::error!("sex number must be an integer, got '{}'", sex);
            return 1;
        }
    };

    match Config::write_init_file(config_path, name, storage_path, sex_number) {
        Ok(()) => {
            tracing::info!("Wrote config to {}", config_path.display());
            0
        }
        Err(e) => {
            tracing::error!("Failed to write {}: {}", config_path.display(), e);
            1
        }
    }
}
