//! Schema CLI for the datasource database (`up`, `down`, `status`, `fresh`).
//!
//! Reads `DATABASE_URL` like the API binary does.

use migration::Migrator;
use sea_orm_migration::cli;

#[tokio::main]
async fn main() {
    cli::run_cli(Migrator).await;
}
