//! Homepage ETL - chart uploads and intermediate-file retention sweep

use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use homepage_etl::config::AppConfig;
use homepage_etl::db::Database;
use homepage_etl::render::SvgRenderer;
use homepage_etl::routes;
use homepage_etl::state::AppState;
use homepage_etl::storage::{ObjectBlobStore, DOWNLOADS_CONTAINER, PIPELINE_CONTAINER};
use homepage_etl::tasks::{homepage_graphs, housekeeping};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "homepage_etl=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;

    // Connect to database
    let db = match Database::new(&config.database_url, config.db_max_connections).await {
        Ok(db) => db,
        Err(e) => {
            error!(error = %e, "Failed to connect to database");
            std::process::exit(1);
        }
    };

    let downloads = Arc::new(ObjectBlobStore::azure_from_env(DOWNLOADS_CONTAINER)?);
    let pipeline = Arc::new(ObjectBlobStore::azure_from_env(PIPELINE_CONTAINER)?);

    let state = AppState::new(db);

    // 1. Homepage graphs - thumbnails and vaccination waffles
    let graphs_ctx = homepage_graphs::GraphsContext {
        source: state.db.clone(),
        store: downloads,
        renderer: Arc::new(SvgRenderer::new()),
        metrics: Arc::clone(&state.metrics),
    };
    let graphs_every = config.graphs_interval;
    tokio::spawn(async move {
        homepage_graphs::homepage_graphs_task(graphs_ctx, graphs_every).await;
    });

    // 2. Housekeeping - stale intermediate files
    let hk_metrics = Arc::clone(&state.metrics);
    let hk_config = config.housekeeping;
    let hk_every = config.housekeeping_interval;
    tokio::spawn(async move {
        housekeeping::housekeeping_task(pipeline, hk_config, hk_metrics, hk_every).await;
    });

    let app = routes::router(state);

    info!(
        "Homepage ETL v{} starting on {}",
        env!("CARGO_PKG_VERSION"),
        config.listen_addr
    );
    info!(
        "Database: {}",
        config.database_url.split('@').last().unwrap_or("***")
    );
    info!(
        retention_days = config.housekeeping.retention_days,
        max_candidates = ?config.housekeeping.max_candidates,
        "Housekeeping configured"
    );

    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
