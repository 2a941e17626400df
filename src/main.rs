use carlos_dashboard_api::{
    config::Config,
    db,
    handlers::AppState,
    routes::{self, RateLimit},
    scheduler,
    sheets_client::{GoogleSheetsClient, SheetSource},
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Main entry point for the application.
///
/// Initializes logging, configuration, the lead store, the optional Google
/// Sheets client and the background jobs, then starts the Axum server.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "carlos_dashboard_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;

    let store = db::open_store(&config).await?;

    // Sheets client is optional; /sincronizar/ reports the missing configuration
    let sheets: Option<Arc<dyn SheetSource>> = match config.sheets_settings() {
        Some(settings) => match GoogleSheetsClient::new(&settings) {
            Ok(client) => {
                tracing::info!("✓ Google Sheets client initialized: {}", settings.api_base_url);
                Some(Arc::new(client) as Arc<dyn SheetSource>)
            }
            Err(e) => {
                tracing::error!("Failed to initialize Google Sheets client: {}", e);
                None
            }
        },
        None => None,
    };

    // Background jobs
    scheduler::spawn_metrics_snapshot(
        store.clone(),
        Duration::from_secs(config.snapshot_interval_secs),
    );
    match (config.sync_interval_secs, sheets.clone()) {
        (Some(secs), Some(source)) => {
            scheduler::spawn_periodic_sync(store.clone(), source, Duration::from_secs(secs));
        }
        (Some(_), None) => {
            tracing::warn!("SYNC_INTERVAL_SECS is set but Google Sheets is not configured")
        }
        _ => {}
    }

    let rate_limit = RateLimit {
        per_second: config.rate_limit_per_second,
        burst: config.rate_limit_burst,
    };
    let port = config.port;

    let app_state = Arc::new(AppState {
        store,
        config,
        sheets,
    });
    let app = routes::router(app_state, Some(rate_limit))?;

    // Start server
    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    // Peer address is the rate limiter's fallback key
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
