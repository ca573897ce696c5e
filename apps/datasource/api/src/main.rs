use axum_helpers::server::{create_router, health_router, serve};
use core_config::tracing::{init_tracing, install_color_eyre};
use database::common::RetryConfig;
use domain_analyzers::{
    ANALYZER_CHAR_FILTER_TABLE, ANALYZER_TOKEN_FILTER_TABLE, AnalyzerService, PgAnalyzerRepository,
};
use domain_buckets::{BUCKET_CATEGORY_TABLE, BucketService, PgBucketRepository};
use domain_enrich::{EnrichService, PIPELINE_ITEM_TABLE, PgEnrichRepository};
use entity_events::EventBus;
use migration::Migrator;
use ordered_relation::PgOrderedRelation;
use std::sync::Arc;
use tracing::info;

mod api;
mod config;
mod openapi;
mod state;

use config::Config;
use state::AppState;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    install_color_eyre();

    let config = Config::from_env()?;
    init_tracing(&config.environment);

    let retry = RetryConfig::new().with_max_retries(5);
    let db = database::postgres::connect_with_retry(config.database.clone(), retry)
        .await
        .map_err(|e| eyre::eyre!("PostgreSQL connection failed: {}", e))?;

    if config.run_migrations {
        database::postgres::run_migrations::<Migrator>(&db, config.app.name).await?;
    }

    let events = EventBus::new(config.event_bus_capacity);
    let relation = |table| Arc::new(PgOrderedRelation::new(db.clone(), table));

    let services = api::Services {
        enrich: EnrichService::new(
            PgEnrichRepository::new(db.clone()),
            relation(PIPELINE_ITEM_TABLE),
            events.clone(),
        ),
        buckets: BucketService::new(
            PgBucketRepository::new(db.clone()),
            relation(BUCKET_CATEGORY_TABLE),
            events.clone(),
        ),
        analyzers: AnalyzerService::new(
            PgAnalyzerRepository::new(db.clone()),
            relation(ANALYZER_TOKEN_FILTER_TABLE),
            relation(ANALYZER_CHAR_FILTER_TABLE),
            events.clone(),
        ),
        events: events.clone(),
    };

    let state = AppState {
        config,
        db,
        events,
    };

    let app = create_router::<openapi::ApiDoc>(api::routes(services), &state.config.server)?
        .merge(health_router(state.config.app.clone()))
        .merge(api::ready_router(state.clone()));

    info!(
        app = state.config.app.name,
        version = state.config.app.version,
        "Starting datasource API"
    );
    serve(app, &state.config.server).await?;

    info!("Shutting down: closing database connections");
    if let Err(e) = state.db.close().await {
        tracing::error!("Error closing PostgreSQL: {}", e);
    }

    info!("Datasource API shutdown complete");
    Ok(())
}
