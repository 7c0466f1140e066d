//! Entitle API Server
//!
//! Main entry point for the balance engine service. Besides serving HTTP it
//! runs the expiration sweep and the stale-reservation expiry on a timer.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use entitle_api::{AppState, create_router};
use entitle_core::policy::{PassThroughPolicy, PolicyRegistry};
use entitle_core::posting::PostingService;
use entitle_core::sweep::ExpirationSweep;
use entitle_db::{PgLedgerStore, connect_with};
use entitle_shared::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "entitle=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = AppConfig::load()?;

    // Connect to database
    let db = connect_with(
        &config.database.url,
        config.database.max_connections,
        config.database.min_connections,
    )
    .await?;
    info!("Connected to database");

    // Build the engine
    let store = Arc::new(PgLedgerStore::new(db));
    let policies = Arc::new(PolicyRegistry::from_config(&config.ledger));
    let posting = Arc::new(PostingService::new(
        Arc::clone(&store),
        Arc::clone(&policies),
        PassThroughPolicy,
        Duration::hours(config.ledger.reservation_ttl_hours),
    ));
    let sweep = Arc::new(ExpirationSweep::new(store, policies));
    info!(
        reservation_ttl_hours = config.ledger.reservation_ttl_hours,
        sweep_enabled = config.ledger.sweep.enabled,
        "Balance engine configured"
    );

    if config.ledger.sweep.enabled {
        spawn_scheduler(
            Arc::clone(&posting),
            Arc::clone(&sweep),
            config.ledger.sweep.interval_secs,
        );
    }

    // Create router
    let app = create_router(AppState::new(posting, sweep));

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Runs stale-reservation expiry and the expiration sweep every `interval_secs`.
fn spawn_scheduler(
    posting: Arc<PostingService<PgLedgerStore, PassThroughPolicy>>,
    sweep: Arc<ExpirationSweep<PgLedgerStore>>,
    interval_secs: u64,
) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(StdDuration::from_secs(interval_secs.max(1)));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let now = Utc::now();

            match posting.reservations().expire_stale(now).await {
                Ok(expired) if !expired.is_empty() => {
                    info!(count = expired.len(), "Stale reservations expired");
                }
                Ok(_) => {}
                Err(e) => warn!(error = %e, "Stale reservation expiry failed"),
            }

            if let Err(e) = sweep.run(now.date_naive(), None, now).await {
                warn!(error = %e, "Expiration sweep failed");
            }
        }
    });
}
