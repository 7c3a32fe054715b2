use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use peerlink::adapters::{LoggingObserver, TcpConnector, TracingEventLogger};
use peerlink::domain::{ConnectionRegistry, OpenRequest, RegistryConfig};
use peerlink::Registry;

#[derive(Parser, Debug)]
#[command(version = env!("PEERLINK_VERSION"), author = env!("CARGO_PKG_AUTHORS"))]
pub struct Opts {
    /// Configuration file (defaults to the platform config directory)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Device endpoint to connect to, may be repeated
    #[arg(long = "connect", short = 'e')]
    endpoints: Vec<SocketAddr>,

    /// Name of the observer receiving device events
    #[arg(long, short = 'o')]
    observer: Option<String>,
}

fn load_config(path: Option<&PathBuf>) -> Result<RegistryConfig, confy::ConfyError> {
    match path {
        Some(path) => confy::load_path(path),
        None => confy::load("peerlink", None),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let opts = Opts::parse();

    match rlimit::increase_nofile_limit(u64::MAX) {
        Ok(limit) => info!("open file limit set to {}", limit),
        Err(e) => warn!("cannot raise open file limit: {}", e),
    }

    let mut config = load_config(opts.config.as_ref())?;
    config.endpoints.extend(opts.endpoints);
    if opts.observer.is_some() {
        config.observer = opts.observer;
    }
    let observer = config.observer.clone().unwrap_or_else(|| "peerlink".to_string());
    let endpoints = config.endpoints.clone();
    let capabilities = config.capabilities;

    let registry = Registry::bind(ConnectionRegistry::new(
        config,
        Arc::new(TcpConnector::new()),
        Arc::new(TracingEventLogger::new()),
    ));
    let (logging, failures) = LoggingObserver::with_failures(observer.clone());
    registry.add_observer(observer.clone(), Box::new(logging)).await;
    registry.spawn_reaper(failures);

    if endpoints.is_empty() {
        warn!("no endpoint configured, waiting for shutdown");
    }
    for endpoint in endpoints {
        let request = OpenRequest::new(endpoint)
            .with_capabilities(capabilities)
            .with_observer(observer.clone());
        let opened = registry
            .open(request, move |id, status| {
                if status.is_open() {
                    info!("{} ready ({})", endpoint, id);
                } else {
                    error!("{} unavailable: {}", endpoint, status);
                }
            })
            .await;
        if let Err(e) = opened {
            error!("cannot open {}: {}", endpoint, e);
        }
    }

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    registry.shutdown().await;
    Ok(())
}
