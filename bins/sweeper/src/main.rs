//! One-shot job runner for Entitle.
//!
//! Meant to be scheduled from cron when the server's own scheduler is
//! disabled:
//!   sweeper sweep [--as-of 2025-07-01] [--run-id manual-1]
//!   sweeper expire-reservations
//!   sweeper reconcile --subject <uuid>
//!
//! Reports are printed as JSON on stdout. The process exits non-zero when a
//! subject failed or a reconciliation found violations.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use chrono::{Duration, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use entitle_core::policy::{PassThroughPolicy, PolicyRegistry};
use entitle_core::posting::PostingService;
use entitle_core::sweep::ExpirationSweep;
use entitle_db::{PgLedgerStore, connect_with};
use entitle_shared::AppConfig;
use entitle_shared::types::SubjectId;

#[derive(Parser)]
#[command(name = "sweeper")]
#[command(about = "Periodic ledger jobs for Entitle")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write off the unused remainder of expired buckets
    Sweep {
        /// Sweep date (defaults to today, UTC)
        #[arg(long)]
        as_of: Option<NaiveDate>,
        /// Run id; re-running with the same id writes nothing new
        #[arg(long)]
        run_id: Option<String>,
    },

    /// Expire pending reservations past their deadline
    ExpireReservations,

    /// Replay one subject's history and report broken invariants
    Reconcile {
        /// Subject to check
        #[arg(long)]
        subject: SubjectId,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "entitle=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load().context("failed to load configuration")?;
    let db = connect_with(
        &config.database.url,
        config.database.max_connections,
        config.database.min_connections,
    )
    .await
    .context("failed to connect to database")?;

    let store = Arc::new(PgLedgerStore::new(db));
    let policies = Arc::new(PolicyRegistry::from_config(&config.ledger));
    let now = Utc::now();

    match cli.command {
        Commands::Sweep { as_of, run_id } => {
            let sweep = ExpirationSweep::new(store, policies);
            let report = sweep
                .run(as_of.unwrap_or_else(|| now.date_naive()), run_id, now)
                .await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            if report.failures.is_empty() {
                Ok(ExitCode::SUCCESS)
            } else {
                warn!(failures = report.failures.len(), "Sweep finished with failures");
                Ok(ExitCode::FAILURE)
            }
        }
        Commands::ExpireReservations => {
            let posting = posting_service(store, policies, &config);
            let expired = posting.reservations().expire_stale(now).await?;
            info!(count = expired.len(), "Stale reservations expired");
            println!("{}", serde_json::to_string_pretty(&expired)?);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Reconcile { subject } => {
            let posting = posting_service(store, policies, &config);
            let report = posting.reconcile(subject).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            if report.is_consistent() {
                Ok(ExitCode::SUCCESS)
            } else {
                warn!(
                    subject_id = %subject,
                    violations = report.violations.len(),
                    "Ledger is inconsistent"
                );
                Ok(ExitCode::FAILURE)
            }
        }
    }
}

fn posting_service(
    store: Arc<PgLedgerStore>,
    policies: Arc<PolicyRegistry>,
    config: &AppConfig,
) -> PostingService<PgLedgerStore, PassThroughPolicy> {
    PostingService::new(
        store,
        policies,
        PassThroughPolicy,
        Duration::hours(config.ledger.reservation_ttl_hours),
    )
}
