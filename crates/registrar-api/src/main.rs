//! Registrar API server entry point.

use std::sync::Arc;
use std::time::Duration;

use registrar_api::config::AppConfig;
use registrar_api::error::AppError;
use registrar_api::routes;
use registrar_api::state::AppState;
use registrar_api::telemetry;
use registrar_core::catalog::CatalogClient;
use registrar_core::clock::SystemClock;
use registrar_core::repository::EnrollmentRepository;
use registrar_enrollment::application::coordinator::EnrollmentCoordinator;
use registrar_enrollment::application::reconciler::Reconciler;
use registrar_remote::{HttpCatalogClient, HttpDirectoryClient, RetryPolicy};
use registrar_store::schema::MIGRATOR;
use registrar_store::{PgCompensationLog, PgEnrollmentRepository};
use sqlx::postgres::PgPoolOptions;
use tokio::sync::watch;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = AppConfig::from_env()?;
    let telemetry = telemetry::init(config.otlp_endpoint.as_deref())?;

    tracing::info!("Starting Registrar API server");

    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(&config.database_url)
        .await?;
    MIGRATOR.run(&pool).await?;

    let retry = RetryPolicy::new(
        config.remote_retry_attempts,
        Duration::from_millis(100),
        Duration::from_secs(2),
        0.2,
    );
    let catalog: Arc<dyn CatalogClient> = Arc::new(HttpCatalogClient::new(
        config.catalog_url.clone(),
        config.remote_timeout,
        retry,
    )?);
    let directory = Arc::new(HttpDirectoryClient::new(
        config.directory_url.clone(),
        config.remote_timeout,
        retry,
    )?);
    let repository: Arc<dyn EnrollmentRepository> =
        Arc::new(PgEnrollmentRepository::new(pool.clone()));
    let compensations = Arc::new(PgCompensationLog::new(pool));

    let coordinator = EnrollmentCoordinator::new(
        directory,
        Arc::clone(&catalog),
        Arc::clone(&repository),
        compensations.clone(),
        Arc::new(SystemClock),
    );
    let reconciler = Reconciler::new(Arc::clone(&catalog), Arc::clone(&repository), compensations)
        .with_interval(config.reconcile_interval)
        .with_batch_size(config.reconcile_batch_size);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let reconciler_task = tokio::spawn(reconciler.clone().run(shutdown_rx));

    let app_state = AppState::new(coordinator, repository, catalog, reconciler);

    // TODO: Replace CorsLayer::permissive() with restricted origins for production.
    let app = routes::app(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    tracing::info!(addr = %config.listen_addr, "Listening");
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = shutdown_tx.send(true);
    if let Err(err) = reconciler_task.await {
        tracing::warn!(error = %err, "reconciler task ended abnormally");
    }
    telemetry.shutdown();

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
