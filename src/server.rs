//! HTTP server initialization and runtime setup.
//!
//! Handles database connections, cache selection, background task spawning,
//! and the Axum server lifecycle including graceful shutdown.

use crate::application::services::{ReconciliationJob, RedirectResolver, ResolverSettings};
use crate::config::{CacheBackend, Config};
use crate::domain::geo::NoGeoLocator;
use crate::domain::repositories::{MappingRepository, VisitRepository};
use crate::domain::visit_worker::run_visit_worker;
use crate::infrastructure::cache::{CacheService, MemoryCache, NullCache, RedisCache};
use crate::infrastructure::persistence::{PgMappingRepository, PgVisitRepository};
use crate::routes::app_router;
use crate::state::AppState;

use anyhow::{Context, Result};
use axum::ServiceExt;
use axum::extract::Request;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};

/// How long shutdown waits for queued visits to be written.
const VISIT_DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Opens the PostgreSQL pool with the configured limits.
pub async fn connect_pool(config: &Config) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(Duration::from_secs(config.db_connect_timeout))
        .idle_timeout(Duration::from_secs(config.db_idle_timeout))
        .max_lifetime(Duration::from_secs(config.db_max_lifetime))
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;

    tracing::info!("Connected to database");
    Ok(pool)
}

/// Builds the configured cache backend.
///
/// An unreachable Redis is not fatal: the service runs on the database alone
/// through [`NullCache`].
pub async fn build_cache(config: &Config) -> Arc<dyn CacheService> {
    match (config.cache_backend, &config.redis_url) {
        (CacheBackend::Redis, Some(redis_url)) => match RedisCache::connect(redis_url).await {
            Ok(redis) => {
                tracing::info!("Cache enabled (Redis)");
                Arc::new(redis)
            }
            Err(e) => {
                tracing::warn!("Failed to connect to Redis: {}. Using NullCache.", e);
                Arc::new(NullCache::new())
            }
        },
        (CacheBackend::Memory, _) => {
            tracing::info!("Cache enabled (in-process)");
            Arc::new(MemoryCache::new())
        }
        _ => {
            tracing::info!("Cache disabled (NullCache)");
            Arc::new(NullCache::new())
        }
    }
}

/// Runs the HTTP server with the given configuration.
///
/// Initializes:
/// - PostgreSQL connection pool
/// - Apply migrations
/// - Cache backend (Redis, in-process, or none)
/// - Background visit worker
/// - Periodic reconciliation loop
/// - Axum HTTP server
///
/// On Ctrl-C / SIGTERM the server stops accepting requests, queued visits
/// are drained, and a final reconciliation pass runs.
///
/// # Errors
///
/// Returns an error if:
/// - Database connection or migration fails
/// - Server bind fails
/// - Server runtime error occurs
pub async fn run(config: Config) -> Result<()> {
    let pool = connect_pool(&config).await?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to apply migrations")?;

    let cache = build_cache(&config).await;

    let pool = Arc::new(pool);
    let mappings: Arc<dyn MappingRepository> = Arc::new(PgMappingRepository::new(pool.clone()));
    let visits: Arc<dyn VisitRepository> = Arc::new(PgVisitRepository::new(pool.clone()));

    let (visit_tx, visit_rx) = mpsc::channel(config.visit_queue_capacity);
    let worker = tokio::spawn(run_visit_worker(
        visit_rx,
        visits.clone(),
        Arc::new(NoGeoLocator),
        config.visit_worker_concurrency,
    ));
    tracing::info!(
        "Visit worker started ({} concurrent inserts)",
        config.visit_worker_concurrency
    );

    let job = Arc::new(ReconciliationJob::new(
        mappings.clone(),
        cache.clone(),
        config.reconcile_batch_size,
    ));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let reconciler = tokio::spawn(job.run(config.reconcile_interval(), shutdown_rx));

    let resolver = Arc::new(RedirectResolver::new(
        mappings,
        visits,
        cache.clone(),
        visit_tx,
        ResolverSettings {
            mapping_ttl_seconds: Some(config.cache_ttl_seconds),
            recent_visits_limit: config.recent_visits_limit,
        },
    ));

    let state = AppState::new(resolver, cache, &config.base_url, config.behind_proxy);
    let app = app_router(state);

    let addr: SocketAddr = config.listen_addr.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on http://{addr}");

    // The router owns the only visit sender; it is dropped when serving ends.
    axum::serve(
        listener,
        ServiceExt::<Request>::into_make_service_with_connect_info::<SocketAddr>(app),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Server stopped, draining visit queue");
    match tokio::time::timeout(VISIT_DRAIN_TIMEOUT, worker).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!("Visit worker panicked: {}", e),
        Err(_) => tracing::warn!("Visit queue not drained within {:?}", VISIT_DRAIN_TIMEOUT),
    }

    let _ = shutdown_tx.send(true);
    if let Err(e) = reconciler.await {
        tracing::error!("Reconciliation loop panicked: {}", e);
    }

    pool.close().await;
    tracing::info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
