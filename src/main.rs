use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn};

use device_config_agent::{
    config::{ConfigLoader, RestartMethod},
    events::{ConfigEvent, EventBus},
    logging,
    rest_api::{build_router, RestContext},
    restart::{CommandRestart, ExitProcess, RestartCoordinator, RestartPlatform},
    service::ConfigService,
    state::DeviceConfig,
    store::{ConfigStore, FileBackend},
};

// Command-line arguments
#[derive(Parser, Debug)]
#[command(
    version,
    about = "Configuration control plane for a network-attached GPIO/serial device.",
    long_about = "Serves the device's network, comm and gpio configuration over HTTP. Updates are validated, stored durably, applied live where possible, and network changes trigger a coordinated restart."
)]
struct Args {
    /// Agent configuration file (overrides DEVCFG_CONFIG and the default locations).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to bind the HTTP server to.
    #[arg(long)]
    host: Option<String>,

    /// Port for the HTTP server.
    #[arg(short, long)]
    port: Option<u16>,

    /// Device configuration file.
    #[arg(long)]
    state: Option<PathBuf>,

    /// Print the effective agent configuration as TOML and exit.
    #[arg(long)]
    print_config: bool,
}

// --- Main Application Entry Point ---
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut loader = match &args.config {
        Some(path) => ConfigLoader::load_from(path)?,
        None => ConfigLoader::load()?,
    };
    if let Some(host) = args.host {
        loader.config.server.host = host;
    }
    if let Some(port) = args.port {
        loader.config.server.port = port;
    }
    if let Some(state) = args.state {
        loader.config.storage.path = Some(state);
    }
    loader.config.validate()?;

    if args.print_config {
        print!("{}", loader.to_toml()?);
        return Ok(());
    }

    let config = loader.config.clone();
    logging::init(config.logging.format, &config.server.log_level);
    match &loader.config_path {
        Some(path) => info!(path = %path.display(), "loaded agent configuration"),
        None => info!("no agent configuration file found, using defaults"),
    }

    let state_path = config.storage.state_path();
    let store = Arc::new(ConfigStore::open(
        Arc::new(FileBackend::new(&state_path)),
        DeviceConfig::factory(config.device.mac.clone()),
    )?);

    let platform: Arc<dyn RestartPlatform> = match config.restart.method {
        RestartMethod::Exit => Arc::new(ExitProcess {
            exit_code: config.restart.exit_code,
        }),
        RestartMethod::Command => Arc::new(CommandRestart::from_argv(&config.restart.command)?),
    };

    let events = EventBus::new();
    let coordinator = RestartCoordinator::new(
        platform,
        store.clone(),
        events.clone(),
        config.restart.settings(),
    );
    let service = ConfigService::new(
        store,
        config.validation.policy(),
        coordinator,
        events.clone(),
    );

    tokio::spawn(log_events(events));

    let app = build_router(RestContext { service });
    let addr = config.server.bind_address();
    let listener = TcpListener::bind(&addr).await?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        %addr,
        state = %state_path.display(),
        restart_method = ?config.restart.method,
        "device config agent listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server stopped");
    Ok(())
}

/// Log every configuration event. The data plane components subscribe the same way.
async fn log_events(events: EventBus) {
    let mut rx = events.subscribe();
    loop {
        match rx.recv().await {
            Ok(ConfigEvent::SectionApplied {
                section,
                rebind_tcp_port,
                ..
            }) => info!(%section, ?rebind_tcp_port, "section applied live"),
            Ok(ConfigEvent::SectionStaged { section }) => {
                info!(%section, "section staged until restart")
            }
            Ok(ConfigEvent::RestartScheduled { reason }) => info!(%reason, "restart scheduled"),
            Ok(ConfigEvent::RestartImminent { reason }) => warn!(%reason, "restart imminent"),
            Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "event logger lagged")
            }
            Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
        }
    }
}

// --- Graceful Shutdown Handler ---
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Ctrl+C received, starting graceful shutdown"),
        _ = terminate => info!("SIGTERM received, starting graceful shutdown"),
    }
}
