use axum::Router;
use domain_analyzers::{AnalyzerRepository, AnalyzerService};
use domain_buckets::{BucketRepository, BucketService};
use domain_enrich::{EnrichRepository, EnrichService};
use entity_events::EventBus;

pub mod health;

/// Every domain service, built once in `main`
pub struct Services<E, B, A>
where
    E: EnrichRepository + 'static,
    B: BucketRepository + 'static,
    A: AnalyzerRepository + 'static,
{
    pub enrich: EnrichService<E>,
    pub buckets: BucketService<B>,
    pub analyzers: AnalyzerService<A>,
    pub events: EventBus,
}

/// API routes without the `/api` prefix, which `create_router` adds.
///
/// Domain routers use absolute paths and are merged; the SSE feed is
/// nested under `/events`.
pub fn routes<E, B, A>(services: Services<E, B, A>) -> Router
where
    E: EnrichRepository + 'static,
    B: BucketRepository + 'static,
    A: AnalyzerRepository + 'static,
{
    Router::new()
        .merge(domain_enrich::handlers::router(services.enrich))
        .merge(domain_buckets::handlers::router(services.buckets))
        .merge(domain_analyzers::handlers::router(services.analyzers))
        .nest("/events", entity_events::router(services.events))
}

/// `/ready` with its state applied, mergeable into the stateless app router
pub fn ready_router(state: crate::state::AppState) -> Router {
    use axum::routing::get;

    Router::new()
        .route("/ready", get(health::ready_handler))
        .with_state(state)
}
