//! Database migration runner for Entitle.
//!
//! Usage:
//!   migrator up      - Create the ledger, reservation and lock tables
//!   migrator down    - Drop them again
//!   migrator status  - Show migration status
//!   migrator fresh   - Drop all tables and re-run migrations
//!
//! The connection URL is read from `DATABASE_URL`.

use entitle_db::migration::Migrator;
use sea_orm_migration::prelude::*;

#[tokio::main]
async fn main() {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Run the migrator CLI (it sets up its own tracing)
    cli::run_cli(Migrator).await;
}
