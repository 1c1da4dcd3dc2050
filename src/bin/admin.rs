//! CLI administration tool for cached-shortener.
//!
//! Runs maintenance tasks against the configured database and cache without
//! going through the HTTP API.
//!
//! # Usage
//!
//! ```bash
//! # Fold cache counters into the database once
//! cargo run --bin admin -- reconcile
//!
//! # View statistics
//! cargo run --bin admin -- stats
//!
//! # Check database connection
//! cargo run --bin admin -- db check
//! ```
//!
//! # Environment Variables
//!
//! Same as the service (see `cached_shortener::config`); `DATABASE_URL` and,
//! for `reconcile`, `REDIS_URL` are the ones that matter.

use cached_shortener::application::services::{ReconcileReport, ReconciliationJob};
use cached_shortener::config::{self, CacheBackend, Config};
use cached_shortener::domain::repositories::{MappingRepository, VisitRepository};
use cached_shortener::infrastructure::persistence::{PgMappingRepository, PgVisitRepository};
use cached_shortener::server::{build_cache, connect_pool};

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::*;
use sqlx::PgPool;
use std::sync::Arc;

/// CLI tool for managing cached-shortener.
#[derive(Parser)]
#[command(name = "admin")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one reconciliation pass and print the report
    Reconcile,

    /// Show statistics
    Stats,

    /// Database operations
    Db {
        #[command(subcommand)]
        action: DbAction,
    },
}

/// Database operation subcommands.
#[derive(Subcommand)]
enum DbAction {
    /// Check database connection
    Check,

    /// Show database info
    Info,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = config::load_from_env()?;
    let pool = connect_pool(&config).await?;

    match cli.command {
        Commands::Reconcile => handle_reconcile(&config, &pool).await?,
        Commands::Stats => handle_stats(&pool).await?,
        Commands::Db { action } => handle_db_action(action, &pool).await?,
    }

    Ok(())
}

/// Runs a single pass against the shared cache.
///
/// An in-process cache belongs to the running service, so there is nothing
/// to reconcile from here.
async fn handle_reconcile(config: &Config, pool: &PgPool) -> Result<()> {
    println!("{}", "Reconciling cache counters".bright_blue().bold());
    println!();

    if config.cache_backend != CacheBackend::Redis {
        println!(
            "{}",
            format!(
                "  Cache backend is '{}'; only a shared Redis cache can be reconciled externally",
                config.cache_backend.as_str()
            )
            .yellow()
        );
        return Ok(());
    }

    let cache = build_cache(config).await;
    let mappings: Arc<dyn MappingRepository> =
        Arc::new(PgMappingRepository::new(Arc::new(pool.clone())));

    let job = ReconciliationJob::new(mappings, cache, config.reconcile_batch_size);
    let report = job.run_once().await;

    print_report(&report);

    if report.cache_unavailable {
        anyhow::bail!("cache was unavailable, pass did not complete");
    }

    Ok(())
}

fn print_report(report: &ReconcileReport) {
    let row = |label: &str, value: String| {
        println!("  {:<15} {}", label, value.bright_green().bold());
    };

    row("Scanned:", report.scanned.to_string());
    row("Synced:", report.synced.to_string());
    row("Visits synced:", report.visits_synced.to_string());
    row("Unchanged:", report.unchanged.to_string());
    row("Failed:", report.failed.to_string());
    row("Discarded:", report.discarded.to_string());

    if report.failed > 0 {
        println!();
        println!(
            "{}",
            "  Failed mappings keep their counters and are retried next pass".yellow()
        );
    }
    println!();
}

/// Displays system statistics.
///
/// Shows:
/// - Total number of mappings
/// - Sum of durable visit totals
/// - Number of recorded visit events
async fn handle_stats(pool: &PgPool) -> Result<()> {
    println!("{}", "Statistics".bright_blue().bold());
    println!();

    let pool = Arc::new(pool.clone());
    let mappings = PgMappingRepository::new(pool.clone());
    let visits = PgVisitRepository::new(pool);

    let (mapping_count, total_visits, visit_events) =
        tokio::try_join!(mappings.count(), mappings.total_visits(), visits.count())?;

    println!(
        "  Mappings:      {}",
        mapping_count.to_string().bright_green().bold()
    );
    println!(
        "  Visits:        {}",
        total_visits.to_string().bright_green().bold()
    );
    println!(
        "  Visit events:  {}",
        visit_events.to_string().bright_green().bold()
    );
    println!();

    Ok(())
}

/// Handles database diagnostic commands.
async fn handle_db_action(action: DbAction, pool: &PgPool) -> Result<()> {
    match action {
        DbAction::Check => {
            println!("{}", "Checking database connection...".bright_blue());

            sqlx::query("SELECT 1").fetch_one(pool).await?;

            println!("{}", "Database connection OK".green().bold());
        }
        DbAction::Info => {
            println!("{}", "Database Information".bright_blue().bold());
            println!();

            let version: String = sqlx::query_scalar("SELECT version()")
                .fetch_one(pool)
                .await?;

            println!("  PostgreSQL: {}", version.bright_white());
            println!();
        }
    }

    Ok(())
}
