use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use muster_adapters::memory::{MemAlerts, MemMarker};
use muster_adapters::notify::TracingNotifier;
use muster_adapters::persistence::sqlite::SqliteDb;
use muster_app::dispatch::Dispatcher;
use muster_app::event_service::EventService;
use muster_ports::outbound::{AlertStore, EventStore};
use muster_server::config::AppConfig;
use muster_server::http::{self, ApiState};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory holding app.yaml.
    #[arg(long, env = "MUSTER_CONFIG_DIR", default_value = "configs")]
    config_dir: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();

    tracing::debug!(config_dir = %cli.config_dir, "loading configuration");
    let config = AppConfig::new(Some(&cli.config_dir))?;
    tracing::debug!(
        database_url = %config.database_url,
        listen_address = %config.listen_address,
        "configuration loaded"
    );

    let db = SqliteDb::new(&config.database_url).await?;
    let mem = Arc::new(MemAlerts::new(config.alert_buffer));

    let dispatcher = Arc::new(Dispatcher::new(
        mem.clone(),
        Arc::new(config.route_tree()?),
        Arc::new(TracingNotifier::new()),
        Arc::new(MemMarker::new()),
        config.dispatcher_config(),
    ));
    let dispatch = tokio::spawn({
        let dispatcher = Arc::clone(&dispatcher);
        async move { dispatcher.run().await }
    });

    let alerts: Arc<dyn AlertStore> = mem;
    let events: Arc<dyn EventStore> = Arc::new(db);
    let state = ApiState {
        dispatcher: Arc::clone(&dispatcher),
        alerts: Arc::clone(&alerts),
        events: Arc::new(EventService::new(events, alerts)),
    };

    let shutdown = CancellationToken::new();
    tokio::spawn(wait_for_signal(shutdown.clone()));

    let listener = TcpListener::bind(&config.listen_address).await?;
    tracing::info!(address = %config.listen_address, "http api listening");
    http::serve(listener, state, shutdown).await?;

    tracing::info!("shutting down dispatcher");
    dispatcher.stop().await;
    dispatch.await?;

    Ok(())
}

async fn wait_for_signal(shutdown: CancellationToken) {
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => {
                tracing::error!(%err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(err) = result {
                tracing::error!(%err, "failed to listen for ctrl-c");
            }
            tracing::info!("received ctrl-c");
        }
        () = terminate => tracing::info!("received SIGTERM"),
    }
    shutdown.cancel();
}
